use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::ordering::natural_cmp;
use super::slot::KnowledgeSlot;
use super::templates::KnowledgeTemplate;

/// Number of content characters used when a name has to be synthesized.
pub const SYNTHESIZED_NAME_CHARS: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: String,
    pub name: String,
    pub content: String,
}

/// The store could not write its full state back to the slot. The in-memory
/// mutation that triggered the write has already been applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("knowledge base could not be saved: {message}")]
pub struct PersistenceError {
    pub message: String,
}

impl PersistenceError {
    fn from_anyhow(err: &anyhow::Error) -> Self {
        Self {
            message: format!("{err:#}"),
        }
    }
}

/// Expert knowledge corpus, persisted in full after every mutation.
///
/// Items keep insertion order in the slot; `list` returns them sorted by
/// name. Content is unique after trimming.
pub struct KnowledgeStore {
    slot: Box<dyn KnowledgeSlot>,
    items: IndexMap<String, KnowledgeItem>,
}

impl KnowledgeStore {
    /// Loads the slot, degrading to an empty store when it is missing or
    /// unreadable.
    pub fn open(slot: impl KnowledgeSlot + 'static) -> Self {
        let items = match slot.read() {
            Ok(Some(value)) => parse_items(value),
            Ok(None) => IndexMap::new(),
            Err(err) => {
                let message = format!("{err:#}");
                warn!(error = %message, "knowledge base unreadable; starting empty");
                IndexMap::new()
            }
        };
        Self {
            slot: Box::new(slot),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&KnowledgeItem> {
        self.items.get(id)
    }

    /// Items sorted by name (case-insensitive, numeric-aware). Ties keep
    /// insertion order.
    pub fn list(&self) -> Vec<KnowledgeItem> {
        let mut rows = self.items.values().cloned().collect::<Vec<_>>();
        rows.sort_by(|a, b| natural_cmp(&a.name, &b.name));
        rows
    }

    /// Adds an item. Returns `Ok(None)` when the content is blank or already
    /// present.
    pub fn add(
        &mut self,
        name: &str,
        content: &str,
    ) -> Result<Option<KnowledgeItem>, PersistenceError> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }
        if self.contains_content(content, None) {
            debug!("knowledge add skipped: duplicate content");
            return Ok(None);
        }

        let item = KnowledgeItem {
            id: Uuid::new_v4().to_string(),
            name: resolve_name(name, content),
            content: content.to_string(),
        };
        self.items.insert(item.id.clone(), item.clone());
        self.persist()?;
        Ok(Some(item))
    }

    pub fn add_template(
        &mut self,
        template: &KnowledgeTemplate,
    ) -> Result<Option<KnowledgeItem>, PersistenceError> {
        self.add(template.name, template.content)
    }

    /// Replaces name and content of `id` in place. Returns `Ok(false)` when
    /// nothing changed: blank content, unknown id, or content that another
    /// item already holds.
    pub fn update(
        &mut self,
        id: &str,
        name: &str,
        content: &str,
    ) -> Result<bool, PersistenceError> {
        let content = content.trim();
        if content.is_empty() || !self.items.contains_key(id) {
            return Ok(false);
        }
        if self.contains_content(content, Some(id)) {
            debug!(id, "knowledge update skipped: duplicate content");
            return Ok(false);
        }
        let name = resolve_name(name, content);
        if let Some(item) = self.items.get_mut(id) {
            item.name = name;
            item.content = content.to_string();
        }
        self.persist()?;
        Ok(true)
    }

    pub fn remove(&mut self, id: &str) -> Result<bool, PersistenceError> {
        if self.items.shift_remove(id).is_none() {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    fn contains_content(&self, content: &str, except_id: Option<&str>) -> bool {
        self.items
            .values()
            .filter(|item| Some(item.id.as_str()) != except_id)
            .any(|item| item.content.trim() == content)
    }

    fn persist(&self) -> Result<(), PersistenceError> {
        let rows = self.items.values().collect::<Vec<_>>();
        let value = serde_json::to_value(rows).map_err(|err| PersistenceError {
            message: err.to_string(),
        })?;
        self.slot.write(value).map_err(|err| {
            let err = PersistenceError::from_anyhow(&err);
            warn!(error = %err.message, "knowledge base write failed");
            err
        })
    }
}

/// Trimmed `name`, or the first characters of `content` plus `...` when the
/// name is blank.
pub fn resolve_name(name: &str, content: &str) -> String {
    let name = name.trim();
    if !name.is_empty() {
        return name.to_string();
    }
    let head = content
        .trim()
        .chars()
        .take(SYNTHESIZED_NAME_CHARS)
        .collect::<String>();
    format!("{head}...")
}

fn parse_items(value: Value) -> IndexMap<String, KnowledgeItem> {
    let rows = match serde_json::from_value::<Vec<KnowledgeItem>>(value) {
        Ok(rows) => rows,
        Err(err) => {
            warn!(error = %err, "knowledge base malformed; starting empty");
            return IndexMap::new();
        }
    };
    let mut items = IndexMap::new();
    let mut seen = HashSet::new();
    for item in rows {
        let content = item.content.trim();
        if content.is_empty() {
            debug!(id = %item.id, "dropping stored knowledge item with blank content");
            continue;
        }
        if !seen.insert(content.to_string()) {
            debug!(id = %item.id, "dropping stored knowledge item with duplicate content");
            continue;
        }
        items.insert(item.id.clone(), item);
    }
    items
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{resolve_name, KnowledgeStore};
    use crate::knowledge::slot::MemorySlot;
    use crate::knowledge::templates::KNOWLEDGE_TEMPLATES;

    fn stored_names(slot: &MemorySlot) -> Vec<String> {
        slot.snapshot()
            .and_then(|value| value.as_array().cloned())
            .unwrap_or_default()
            .iter()
            .filter_map(|row| row.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn add_dedups_on_trimmed_content() -> anyhow::Result<()> {
        let mut store = KnowledgeStore::open(MemorySlot::new());
        assert!(store.add("first", "Check for lytic lesions")?.is_some());
        assert!(store.add("second", "  Check for lytic lesions \n")?.is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(store.list()[0].name, "first");
        Ok(())
    }

    #[test]
    fn add_ignores_blank_content() -> anyhow::Result<()> {
        let mut store = KnowledgeStore::open(MemorySlot::new());
        assert!(store.add("name", "   ")?.is_none());
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn add_synthesizes_name_from_content() -> anyhow::Result<()> {
        let mut store = KnowledgeStore::open(MemorySlot::new());
        let content = "A very long piece of knowledge text exceeding forty characters total";
        let item = store.add("", content)?.unwrap_or_else(|| panic!("item not added"));
        assert_eq!(item.name, "A very long piece of knowledge text exce...");
        assert_eq!(item.content, content);
        Ok(())
    }

    #[test]
    fn resolve_name_counts_characters_not_bytes() {
        let content = "é".repeat(50);
        let name = resolve_name("  ", &content);
        assert_eq!(name, format!("{}...", "é".repeat(40)));
        assert_eq!(resolve_name("  Label ", "anything"), "Label");
    }

    #[test]
    fn list_orders_names_numerically() -> anyhow::Result<()> {
        let mut store = KnowledgeStore::open(MemorySlot::new());
        store.add("Item 10", "ten")?;
        store.add("item 2", "two")?;
        store.add("Item 1", "one")?;
        let names = store
            .list()
            .into_iter()
            .map(|item| item.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Item 1", "item 2", "Item 10"]);
        Ok(())
    }

    #[test]
    fn every_mutation_persists_full_state_in_insertion_order() -> anyhow::Result<()> {
        let slot = MemorySlot::new();
        let mut store = KnowledgeStore::open(slot.clone());
        let b = store
            .add("b", "second note")?
            .unwrap_or_else(|| panic!("item not added"));
        store.add("a", "first note")?;
        assert_eq!(stored_names(&slot), vec!["b", "a"]);

        assert!(store.update(&b.id, "", "renamed note")?);
        assert_eq!(stored_names(&slot), vec!["renamed note...", "a"]);

        assert!(store.remove(&b.id)?);
        assert_eq!(stored_names(&slot), vec!["a"]);

        let reopened = KnowledgeStore::open(slot);
        assert_eq!(reopened.len(), 1);
        Ok(())
    }

    #[test]
    fn update_keeps_id_and_rejects_blank_or_duplicate_content() -> anyhow::Result<()> {
        let mut store = KnowledgeStore::open(MemorySlot::new());
        let first = store
            .add("first", "alpha")?
            .unwrap_or_else(|| panic!("item not added"));
        store.add("second", "beta")?;

        assert!(!store.update(&first.id, "x", "   ")?);
        assert!(!store.update(&first.id, "x", "beta")?);
        assert!(!store.update("missing", "x", "gamma")?);

        assert!(store.update(&first.id, " renamed ", " gamma ")?);
        let updated = store
            .get(&first.id)
            .unwrap_or_else(|| panic!("item missing"));
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.content, "gamma");
        Ok(())
    }

    #[test]
    fn remove_missing_id_is_a_noop() -> anyhow::Result<()> {
        let slot = MemorySlot::new();
        let mut store = KnowledgeStore::open(slot.clone());
        assert!(!store.remove("nope")?);
        assert_eq!(slot.snapshot(), None);
        Ok(())
    }

    #[test]
    fn loading_drops_later_rows_with_duplicate_content() {
        let slot = MemorySlot::with_value(json!([
            {"id": "a", "name": "first", "content": "Check the ribs"},
            {"id": "b", "name": "blank", "content": "   "},
            {"id": "c", "name": "again", "content": "  Check the ribs "},
            {"id": "d", "name": "other", "content": "Check the spine"},
        ]));
        let store = KnowledgeStore::open(slot);
        assert_eq!(store.len(), 2);
        assert!(store.get("a").is_some());
        assert!(store.get("c").is_none());
        assert!(store.get("d").is_some());
    }

    #[test]
    fn malformed_slot_degrades_to_empty() {
        let store = KnowledgeStore::open(MemorySlot::with_value(json!({"not": "a list"})));
        assert!(store.is_empty());
    }

    #[test]
    fn write_failure_keeps_in_memory_state() {
        let slot = MemorySlot::new();
        slot.set_fail_writes(true);
        let mut store = KnowledgeStore::open(slot.clone());

        let err = store.add("", "kept in memory").err();
        assert!(err.is_some());
        assert_eq!(store.len(), 1);
        assert_eq!(slot.snapshot(), None);
    }

    #[test]
    fn template_goes_through_add_rules() -> anyhow::Result<()> {
        let mut store = KnowledgeStore::open(MemorySlot::new());
        let template = &KNOWLEDGE_TEMPLATES[0];
        assert!(store.add_template(template)?.is_some());
        assert!(store.add_template(template)?.is_none());
        assert_eq!(store.list()[0].name, template.name);
        Ok(())
    }
}
