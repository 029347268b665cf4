/// A predefined knowledge note the user can add with one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnowledgeTemplate {
    pub key: &'static str,
    pub name: &'static str,
    pub content: &'static str,
}

pub const KNOWLEDGE_TEMPLATES: &[KnowledgeTemplate] = &[KnowledgeTemplate {
    key: "multiple_myeloma",
    name: "Radiopaedia Quick-Note: Multiple Myeloma",
    content: "Radiological Signs of Multiple Myeloma: Look for multiple, small, well-defined \
'punched-out' lytic lesions, particularly in the axial skeleton (skull, spine, ribs, pelvis). \
Check for raindrop skull appearance. Be aware of diffuse osteopenia and potential for \
pathological vertebral fractures/collapse. Periosteal reaction is typically absent. A solitary, \
expansile 'soap bubble' lesion may represent a plasmacytoma.",
}];

pub fn find_template(key: &str) -> Option<&'static KnowledgeTemplate> {
    let key = key.trim().to_ascii_lowercase();
    KNOWLEDGE_TEMPLATES
        .iter()
        .find(|template| template.key == key)
}

#[cfg(test)]
mod tests {
    use super::find_template;

    #[test]
    fn find_template_is_case_insensitive() {
        let template = find_template(" Multiple_Myeloma ");
        assert_eq!(template.map(|t| t.key), Some("multiple_myeloma"));
        assert!(find_template("unknown").is_none());
    }

    #[test]
    fn myeloma_note_keeps_source_wording() {
        let template = find_template("multiple_myeloma").map(|t| t.content);
        assert!(template.is_some_and(|content| content.contains("raindrop skull")
            && content.contains("lesions, particularly in the axial skeleton")));
    }
}
