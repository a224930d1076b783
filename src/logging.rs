fn shorten(value: &str, head: usize, tail: usize) -> String {
    if value.len() <= head + tail {
        return value.to_string();
    }
    format!("{}..{}", &value[..head], &value[value.len() - tail..])
}

/// Shortens long hex identifiers (hashes, peer ids) for log fields.
pub fn redact_hex(value: &str) -> String {
    shorten(value, 8, 8)
}
