use std::borrow::Cow;

/// Normalize a string for comparison: trim + lowercase.
pub fn normalize_text(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Reduce a phone number to its digits, dropping all formatting.
pub fn normalize_phone(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Borrow a field only when it holds visible content.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Escape LIKE wildcards in user-supplied text so a name containing `%` or
/// `_` matches literally. Returns the input unchanged when nothing needs
/// escaping.
pub fn escape_like(value: &str) -> Cow<'_, str> {
    if value.contains(['%', '_', '\\']) {
        let mut out = String::with_capacity(value.len() + 2);
        for c in value.chars() {
            if matches!(c, '%' | '_' | '\\') {
                out.push('\\');
            }
            out.push(c);
        }
        Cow::Owned(out)
    } else {
        Cow::Borrowed(value)
    }
}
