//! Section parser — splits a raw optimized-prompt response into its labeled
//! subsections so the renderer can show "Prompt mejorado" and "Explicación de
//! los cambios" separately instead of one undifferentiated block.
//!
//! The backend formats its response with bold markdown headers
//! (`**Entrada mejorada:**`) followed by free-form text. Header names are
//! matched case-insensitively against a fixed synonym table; anything the
//! table does not know is dropped. This is a total function: malformed input
//! degrades to the whole text under the primary key, it never errors.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// The recognized output keys of a parsed optimized prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKey {
    ImprovedPrompt,
    Explanation,
    DesiredOutput,
}

impl SectionKey {
    /// Human-facing label used by the renderer.
    pub fn display_label(self) -> &'static str {
        match self {
            SectionKey::ImprovedPrompt => "Prompt mejorado",
            SectionKey::Explanation => "Explicación de los cambios",
            SectionKey::DesiredOutput => "Salida deseada",
        }
    }
}

/// Parsed sections of an optimized prompt. Every field is optional; a field
/// is `Some` iff its header appeared in the input (or the fallback fired).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptimizedSections {
    #[serde(rename = "prompt_mejorado", skip_serializing_if = "Option::is_none")]
    pub improved_prompt: Option<String>,
    #[serde(
        rename = "explicación_de_los_cambios",
        skip_serializing_if = "Option::is_none"
    )]
    pub explanation: Option<String>,
    #[serde(rename = "salida_deseada", skip_serializing_if = "Option::is_none")]
    pub desired_output: Option<String>,
}

impl OptimizedSections {
    pub fn is_empty(&self) -> bool {
        self.improved_prompt.is_none() && self.explanation.is_none() && self.desired_output.is_none()
    }

    pub fn get(&self, key: SectionKey) -> Option<&str> {
        match key {
            SectionKey::ImprovedPrompt => self.improved_prompt.as_deref(),
            SectionKey::Explanation => self.explanation.as_deref(),
            SectionKey::DesiredOutput => self.desired_output.as_deref(),
        }
    }

    fn set(&mut self, key: SectionKey, value: String) {
        let slot = match key {
            SectionKey::ImprovedPrompt => &mut self.improved_prompt,
            SectionKey::Explanation => &mut self.explanation,
            SectionKey::DesiredOutput => &mut self.desired_output,
        };
        *slot = Some(value);
    }

    /// Populated sections in render order.
    pub fn iter(&self) -> impl Iterator<Item = (SectionKey, &str)> {
        [
            SectionKey::ImprovedPrompt,
            SectionKey::Explanation,
            SectionKey::DesiredOutput,
        ]
        .into_iter()
        .filter_map(|key| self.get(key).map(|text| (key, text)))
    }
}

/// What a header line resolved to through the synonym table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderKind {
    Section(SectionKey),
    /// "Entrada inicial" — the user's own prompt echoed back. The caller
    /// already has it, so its content is always discarded.
    InitialInput,
    Unrecognized,
}

/// A header occurrence: where the header line starts, where its content
/// begins, and what it resolved to.
#[derive(Debug)]
struct Header {
    start: usize,
    content_start: usize,
    kind: HeaderKind,
}

/// Whole-line bold header: `**Name:**` (colon optional), any surrounding
/// whitespace. Matched against recognized and unrecognized names alike.
static BOLD_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*\*\*\s*([^:*\r\n]+?)\s*:?\s*\*\*[ \t]*\r?$").expect("valid regex")
});

/// Plain `Name:` header line. Only accepted as a header when the name
/// resolves through the synonym table; otherwise the line is content.
static PLAIN_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*([^:*\r\n]+?)\s*:[ \t]*\r?$").expect("valid regex")
});

/// Parses the optimized-prompt text returned by `POST /prompt/improve` into
/// its labeled sections.
///
/// Never fails: empty or absent input yields an empty record, and input in
/// which no recognized header can be found comes back whole under
/// `improved_prompt` so nothing the backend produced is silently lost.
pub fn parse_optimized_prompt(input: Option<&str>) -> OptimizedSections {
    let raw = match input {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return OptimizedSections::default(),
    };

    let headers = scan_headers(raw);
    if headers.is_empty() {
        return whole_text_fallback(raw);
    }

    let mut sections = OptimizedSections::default();
    for (i, header) in headers.iter().enumerate() {
        let key = match header.kind {
            HeaderKind::Section(key) => key,
            // Initial-input echoes and unknown headers are dropped together
            // with their content, not attributed to the previous section.
            HeaderKind::InitialInput | HeaderKind::Unrecognized => continue,
        };
        let end = headers.get(i + 1).map_or(raw.len(), |next| next.start);
        sections.set(key, clean_section_body(&raw[header.content_start..end]));
    }

    // Defensive fallback for malformed backend output: every header was
    // unrecognized, so degrade to the whole text. An initial-input echo
    // suppresses the fallback: its content must never leak into the output.
    let saw_initial_input = headers
        .iter()
        .any(|h| h.kind == HeaderKind::InitialInput);
    if sections.is_empty() && !saw_initial_input {
        return whole_text_fallback(raw);
    }
    sections
}

/// Tokenizes all header occurrences, sorted by position. Bold headers are
/// collected whether recognized or not (they always delimit spans); plain
/// `Name:` lines only count when the synonym table knows the name.
fn scan_headers(raw: &str) -> Vec<Header> {
    let mut headers: Vec<Header> = BOLD_HEADER
        .captures_iter(raw)
        .map(|caps| {
            let whole = caps.get(0).expect("match has group 0");
            Header {
                start: whole.start(),
                content_start: whole.end(),
                kind: resolve_header(&caps[1]),
            }
        })
        .collect();

    for caps in PLAIN_HEADER.captures_iter(raw) {
        let kind = resolve_header(&caps[1]);
        if kind == HeaderKind::Unrecognized {
            continue;
        }
        let whole = caps.get(0).expect("match has group 0");
        headers.push(Header {
            start: whole.start(),
            content_start: whole.end(),
            kind,
        });
    }

    headers.sort_by_key(|h| h.start);
    headers
}

/// Resolves a raw header name through the synonym table.
fn resolve_header(name: &str) -> HeaderKind {
    match normalize_header(name).as_str() {
        "entrada mejorada" | "entrada_mejorada" | "prompt mejorado" | "prompt_mejorado" => {
            HeaderKind::Section(SectionKey::ImprovedPrompt)
        }
        "explicación de los cambios"
        | "explicacion de los cambios"
        | "explicación_de_los_cambios"
        | "explicacion_de_los_cambios" => HeaderKind::Section(SectionKey::Explanation),
        "salida deseada" | "salida_deseada" => HeaderKind::Section(SectionKey::DesiredOutput),
        "entrada inicial" | "entrada_inicial" => HeaderKind::InitialInput,
        _ => HeaderKind::Unrecognized,
    }
}

/// Lowercases, trims, and collapses internal whitespace runs to one space.
fn normalize_header(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Trims leading/trailing blank lines from a section span and drops
/// standalone `---` separator lines; interior blank lines are preserved.
fn clean_section_body(span: &str) -> String {
    let lines: Vec<&str> = span.lines().filter(|line| line.trim() != "---").collect();

    let first = lines.iter().position(|line| !line.trim().is_empty());
    let Some(first) = first else {
        return String::new();
    };
    let last = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .expect("a non-blank line exists");

    lines[first..=last].join("\n").trim().to_string()
}

fn whole_text_fallback(raw: &str) -> OptimizedSections {
    OptimizedSections {
        improved_prompt: Some(raw.trim().to_string()),
        ..OptimizedSections::default()
    }
}
