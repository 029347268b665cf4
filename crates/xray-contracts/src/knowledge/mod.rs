mod ordering;
mod slot;
mod store;
mod templates;

pub use ordering::natural_cmp;
pub use slot::{JsonFileSlot, KnowledgeSlot, MemorySlot, KNOWLEDGE_BASE_KEY};
pub use store::{
    resolve_name, KnowledgeItem, KnowledgeStore, PersistenceError, SYNTHESIZED_NAME_CHARS,
};
pub use templates::{find_template, KnowledgeTemplate, KNOWLEDGE_TEMPLATES};
