//! ANSI escape handling

/// Remove terminal escape sequences (colours, cursor movement, hyperlinks)
pub fn strip_ansi(text: &str) -> String {
    strip_ansi_escapes::strip_str(text)
}
