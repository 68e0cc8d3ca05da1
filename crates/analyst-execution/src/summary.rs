/// Longest summary kept in session memory, in characters.
pub const SUMMARY_MAX_CHARS: usize = 150;

/// Compacts model output into one session-memory line.
///
/// Line breaks become spaces; anything past [`SUMMARY_MAX_CHARS`] is cut and
/// marked with `...`. Returns `None` for output with no visible text.
pub fn summarize(text: &str) -> Option<String> {
    let flat: String = text
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    let flat = flat.trim();
    if flat.is_empty() {
        return None;
    }

    match flat.char_indices().nth(SUMMARY_MAX_CHARS) {
        Some((cut, _)) => Some(format!("{}...", &flat[..cut])),
        None => Some(flat.to_string()),
    }
}
