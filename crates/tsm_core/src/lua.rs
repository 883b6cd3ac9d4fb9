//! Lua literal rendering in the addon's dump style.

/// Quote a string the way the client's SavedVariables serializer does.
///
/// Control bytes other than `\n`, `\r` and NUL are written raw, which keeps the
/// SOH chain separator as a single byte.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\000"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

pub fn key(value: &str) -> String {
    format!("[{}]", quote(value))
}

pub fn boolean(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}
