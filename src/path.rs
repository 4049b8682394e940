//! Cache-key construction for field paths.
//!
//! Paths join field names with `.`; structural slots get fixed suffixes.
//! Encoder and decoder must build identical keys.

/// Key of a child field under `parent`.
#[must_use]
pub fn child(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_owned()
    } else {
        format!("{parent}.{name}")
    }
}

/// Key of a list element.
#[must_use]
pub fn list_item(path: &str) -> String {
    format!("{path}[]")
}

/// Key of a map entry's key slot.
#[must_use]
pub fn map_key(path: &str) -> String {
    format!("{path}._key")
}

/// Key of a map entry's value slot.
#[must_use]
pub fn map_value(path: &str) -> String {
    format!("{path}._value")
}

/// Key of a list or map length.
#[must_use]
pub fn length(path: &str) -> String {
    format!("{path}._length")
}

/// Key of a presence probe.
#[must_use]
pub fn presence(name: &str) -> String {
    format!("{name}_presence")
}
