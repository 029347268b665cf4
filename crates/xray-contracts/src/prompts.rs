//! Prompt text for the initial analysis turn and for refinement turns.
//!
//! Both compilers are pure: the same input always yields the same text.

use crate::knowledge::KnowledgeItem;

const EMPTY_KNOWLEDGE_LINE: &str = "(No expert knowledge has been recorded yet.)";

const INITIAL_PROMPT_HEAD: &str = "You are an expert radiologist assisting with the \
interpretation of X-ray images.

Before analyzing the images, carefully review the following expert knowledge base. \
It contains key information and corrections from previous reports. Apply it wherever \
it is relevant to the images provided.

--- EXPERT KNOWLEDGE BASE ---";

const INITIAL_PROMPT_TAIL: &str = "--- END OF KNOWLEDGE BASE ---

Now analyze the attached X-ray image(s) and produce a structured radiology report with \
the following sections:

1. Examination: the body region and projection(s) shown.
2. Findings: a systematic description of bones, joints, soft tissues and any devices.
3. Impression: the most likely diagnosis or diagnoses, in order of likelihood.
4. Recommendations: follow-up imaging or clinical correlation, if warranted.

Be concise and precise. If image quality limits the assessment, say so.";

const REFINEMENT_PROMPT_HEAD: &str = "A radiologist has reviewed your previous report and \
provided the following feedback:

--- RADIOLOGIST FEEDBACK ---";

const REFINEMENT_PROMPT_TAIL: &str = "--- END OF FEEDBACK ---

Treat this feedback as an authoritative correction. Revise your previous report so that it \
fully incorporates the feedback, keeping the same structured sections. Return the complete \
revised report, not only the changes.";

/// Numbered knowledge lines, `Item i: <content>`, one per item in the order given.
pub fn render_knowledge(knowledge: &[KnowledgeItem]) -> String {
    knowledge
        .iter()
        .enumerate()
        .map(|(idx, item)| format!("Item {}: {}", idx + 1, item.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt for the first turn of a session. `knowledge` is expected in the
/// store's listing order.
pub fn compile_initial_prompt(knowledge: &[KnowledgeItem]) -> String {
    let rendered = if knowledge.is_empty() {
        EMPTY_KNOWLEDGE_LINE.to_string()
    } else {
        render_knowledge(knowledge)
    };
    format!("{INITIAL_PROMPT_HEAD}\n{rendered}\n{INITIAL_PROMPT_TAIL}")
}

pub fn compile_refinement_prompt(feedback: &str) -> String {
    format!("{REFINEMENT_PROMPT_HEAD}\n{feedback}\n{REFINEMENT_PROMPT_TAIL}")
}

#[cfg(test)]
mod tests {
    use super::{compile_initial_prompt, compile_refinement_prompt, render_knowledge};
    use crate::knowledge::KnowledgeItem;

    fn item(name: &str, content: &str) -> KnowledgeItem {
        KnowledgeItem {
            id: format!("id-{name}"),
            name: name.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn knowledge_lines_are_numbered_from_one() {
        let rendered = render_knowledge(&[item("a", "first"), item("b", "second")]);
        assert_eq!(rendered, "Item 1: first\nItem 2: second");
    }

    #[test]
    fn initial_prompt_embeds_knowledge_between_markers() {
        let prompt = compile_initial_prompt(&[item("a", "Look for lytic lesions")]);
        let start = prompt.find("--- EXPERT KNOWLEDGE BASE ---");
        let line = prompt.find("Item 1: Look for lytic lesions");
        let end = prompt.find("--- END OF KNOWLEDGE BASE ---");
        assert!(start.is_some() && line.is_some() && end.is_some());
        assert!(start < line && line < end);
        assert!(prompt.contains("structured radiology report"));
    }

    #[test]
    fn initial_prompt_handles_empty_knowledge() {
        let prompt = compile_initial_prompt(&[]);
        assert!(prompt.contains("No expert knowledge has been recorded yet."));
        assert!(!prompt.contains("Item 1:"));
    }

    #[test]
    fn compilers_are_deterministic() {
        let knowledge = vec![item("a", "x"), item("b", "y")];
        assert_eq!(
            compile_initial_prompt(&knowledge),
            compile_initial_prompt(&knowledge)
        );
        assert_eq!(
            compile_refinement_prompt("fix it"),
            compile_refinement_prompt("fix it")
        );
    }

    #[test]
    fn refinement_prompt_embeds_raw_feedback() {
        let prompt = compile_refinement_prompt("  The lesion is in the left femur.  ");
        assert!(prompt.contains("\n  The lesion is in the left femur.  \n"));
        assert!(prompt.contains("authoritative correction"));
    }
}
