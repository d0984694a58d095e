//! Grounded prompts for report sections.

/// System message sent with every section request.
pub const GROUNDING_SYSTEM_PROMPT: &str = r#"You are a public-finance analyst drafting one section of a briefing on government budget documents.

Rules (non-negotiable):
1) Use ONLY the context provided in the user message. Do not invent facts, figures, or dates.
2) If the context does not contain the information a section asks for, say so explicitly in one sentence.
3) Do not add commentary, opinions, or forecasts that are not in the context.
4) Do not repeat the question or write a heading; return the section body only."#;

/// Build the user message for one section.
pub fn section_prompt(query: &str, heading: &str, instruction: &str, list: bool, context: &str) -> String {
    let format_rule = if list {
        "Return a plain list, one item per line, with no numbering or commentary."
    } else {
        "Return plain prose. No Markdown headings."
    };

    format!(
        r#"Section: "{heading}"

Question:
{query}

Task:
{instruction}

Context (excerpts from the budget documents):
---
{context}
---

Output:
- {format_rule}
"#
    )
}
