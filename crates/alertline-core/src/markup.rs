//! Escaping of free text embedded in HTML messages and TwiML documents.

/// Escape the five characters HTML and XML give meaning to.
///
/// The apostrophe uses a numeric reference, which both dialects accept.
pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
