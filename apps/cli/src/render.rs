//! Terminal presentation of prompts. The detail view runs the section
//! parser over the optimized text so the rewrite and the explanation are
//! shown under their own labels instead of as one raw block.

use crate::models::prompt::Prompt;
use crate::sections::{parse_optimized_prompt, SectionKey};

const EXCERPT_LEN: usize = 60;

/// Full view of a single prompt: original text, then each parsed section.
pub fn prompt_detail(prompt: &Prompt) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Prompt {}{}\n",
        prompt.id,
        if prompt.is_favorite { "  ★" } else { "" }
    ));
    out.push_str(&format!(
        "Created: {}  ·  Tokens: {}\n",
        prompt.created_at.format("%Y-%m-%d %H:%M"),
        prompt.total_tokens
    ));
    out.push_str("\nOriginal:\n");
    out.push_str(prompt.original_prompt.trim());
    out.push('\n');

    let sections = parse_optimized_prompt(Some(&prompt.optimized_prompt));
    for (key, text) in sections.iter() {
        out.push_str(&format!("\n{}:\n{}\n", key.display_label(), text));
    }

    // The parser ate everything (e.g. only an initial-input echo came
    // back); show the dedicated explanation field so nothing useful is lost.
    if sections.get(SectionKey::Explanation).is_none() && !prompt.explanation.trim().is_empty() {
        out.push_str(&format!(
            "\n{}:\n{}\n",
            SectionKey::Explanation.display_label(),
            prompt.explanation.trim()
        ));
    }

    out
}

/// One-line list row: id, favorite marker, date, excerpt of the original.
pub fn prompt_row(prompt: &Prompt) -> String {
    format!(
        "{}  {}  {}  {}",
        prompt.id,
        if prompt.is_favorite { "★" } else { " " },
        prompt.created_at.format("%Y-%m-%d"),
        excerpt(&prompt.original_prompt)
    )
}

fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_LEN {
        flat
    } else {
        let cut: String = flat.chars().take(EXCERPT_LEN - 1).collect();
        format!("{cut}…")
    }
}
