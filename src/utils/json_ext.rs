//! JSON payload extraction from model completions.
//!
//! Generation models are instructed to reply with bare JSON, but in practice
//! completions arrive wrapped in markdown fences, prefixed with commentary,
//! or trailed by explanation. This module locates the first JSON object or
//! array inside such text so the structured-output layer can parse it with
//! a plain `serde_json` deserializer.

/// Extract the first JSON object or array embedded in `text`.
///
/// Resolution order:
/// 1. A fenced code block (```` ``` ```` or ```` ```json ````) whose body
///    starts with `{` or `[`.
/// 2. The first balanced `{...}` or `[...]` span in the raw text, honoring
///    string literals and escapes.
///
/// Returns `None` when no balanced payload exists.
///
/// # Examples
///
/// ```
/// use storyloom::utils::json_ext::extract_json_payload;
///
/// let reply = "Sure, here you go:\n```json\n{\"ok\": true}\n```\nDone.";
/// assert_eq!(extract_json_payload(reply), Some("{\"ok\": true}"));
/// ```
pub fn extract_json_payload(text: &str) -> Option<&str> {
    if let Some(fenced) = fenced_block(text) {
        let body = fenced.trim();
        if body.starts_with('{') || body.starts_with('[') {
            return balanced_span(body);
        }
    }
    balanced_span(text)
}

/// Return the body of the first fenced code block, if any.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_open = &text[open + 3..];
    // Skip the optional language tag up to the end of the opening line.
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

/// Find the first balanced JSON object/array span in `text`.
fn balanced_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let bytes = text.as_bytes();
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
