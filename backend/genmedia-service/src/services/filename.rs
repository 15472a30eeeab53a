//! Upload filename sanitizing

const FALLBACK_NAME: &str = "upload";

/// Reduce a client-supplied filename to a safe ASCII object-name component.
///
/// Path separators and whitespace become `_`, anything outside
/// `[A-Za-z0-9._-]` is dropped, and leading/trailing `.`/`_` are stripped.
pub fn secure_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            c if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' => out.push(c),
            '/' | '\\' => out.push('_'),
            c if c.is_whitespace() => out.push('_'),
            _ => {}
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}
