//! Download file names for exported envelopes.

/// Turns a display name into a safe file stem.
///
/// The last extension is dropped, every run of non-ASCII-alphanumeric
/// characters becomes one `-`, edge hyphens are trimmed and the result is
/// lowercased. Returns `fallback` when nothing survives.
pub fn sanitize_file_name(name: &str, fallback: &str) -> String {
    let stem = strip_extension(name.trim());

    let mut cleaned = String::with_capacity(stem.len());
    let mut pending_hyphen = false;
    for ch in stem.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !cleaned.is_empty() {
                cleaned.push('-');
            }
            pending_hyphen = false;
            cleaned.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot > 0 && !name[dot + 1..].is_empty() && !name[dot + 1..].contains('/') => {
            &name[..dot]
        }
        _ => name,
    }
}
