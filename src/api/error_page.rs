//! Message extraction from the backend's HTML error pages.
//!
//! Error responses look like Werkzeug's default pages:
//!
//! ```text
//! <!doctype html>
//! <title>500 Internal Server Error</title>
//! <h1>Internal Server Error</h1>
//! <p>The server encountered an internal error.</p>
//! ```
//!
//! and are shown to the operator as `"[<title>] <paragraph>"`.

/// Build the display message for an error page, or `None` if the body has
/// neither a `<title>` nor a `<p>` element.
#[must_use]
pub fn extract_message(body: &str) -> Option<String> {
    let title = element_text(body, "title");
    let paragraph = element_text(body, "p");

    match (title, paragraph) {
        (Some(t), Some(p)) => Some(format!("[{t}] {p}")),
        (Some(t), None) => Some(format!("[{t}]")),
        (None, Some(p)) => Some(p),
        (None, None) => None,
    }
}

/// Text content of the first `<tag>` element, with nested markup removed.
/// Empty elements count as missing.
fn element_text(body: &str, tag: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets valid for `body`
    let lower = body.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let mut search_from = 0;
    let start = loop {
        let at = search_from + lower[search_from..].find(&open)?;
        let after_name = at + open.len();
        // Reject prefixes of longer tag names (`<param>` for `<p`)
        match lower.as_bytes().get(after_name) {
            Some(b'>' | b' ' | b'\t' | b'\n' | b'\r' | b'/') => {
                break after_name + lower[after_name..].find('>')? + 1;
            }
            _ => search_from = after_name,
        }
    };
    let end = start + lower[start..].find(&close)?;

    let text = collapse_whitespace(&decode_entities(&strip_tags(&body[start..end])));
    (!text.is_empty()).then_some(text)
}

fn strip_tags(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
