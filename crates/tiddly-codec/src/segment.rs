//! Percent-encoding for single URL path segments.
//!
//! Everything outside the RFC 3986 unreserved set is escaped, so an encoded
//! segment never contains `/`, `?`, or whitespace.

/// Percent-encode one path segment.
///
/// ```
/// use tiddly_codec::segment::encode;
///
/// assert_eq!(encode("hot soup/2"), "hot%20soup%2F2");
/// ```
pub fn encode(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Reverse [`encode`]. Returns `None` for a truncated or non-hex escape, or
/// when the unescaped bytes are not UTF-8.
pub fn decode(segment: &str) -> Option<String> {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = segment.get(i + 1..i + 3)?;
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
