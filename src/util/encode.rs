use std::borrow::Cow;

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Percent-encodes `value` as per RFC 3986.
///
/// Every byte outside of the unreserved set (`ALPHA / DIGIT / "-" / "." / "_" / "~"`) is escaped
/// as `%XX` with uppercase hex digits. In particular, `~` is kept literal rather than being
/// escaped as `%7E`.
pub fn canonical(value: &str) -> Cow<'_, str> {
    if value.bytes().all(is_unreserved) {
        return Cow::Borrowed(value);
    }

    let mut ret = String::with_capacity(value.len() * 3);
    for b in value.bytes() {
        if is_unreserved(b) {
            ret.push(char::from(b));
        } else {
            ret.push('%');
            ret.push(char::from(HEX_UPPER[usize::from(b >> 4)]));
            ret.push(char::from(HEX_UPPER[usize::from(b & 0xF)]));
        }
    }
    Cow::Owned(ret)
}

/// Decodes `%XX` sequences of a URI component.
///
/// Malformed escapes are left as-is. Returns `None` if the decoded bytes aren't valid UTF-8.
pub fn decode(value: &str) -> Option<Cow<'_, str>> {
    match decode_bytes(value) {
        Cow::Borrowed(_) => Some(Cow::Borrowed(value)),
        Cow::Owned(bytes) => String::from_utf8(bytes).ok().map(Cow::Owned),
    }
}

/// Decodes a name or value of an `application/x-www-form-urlencoded` string, where `+` stands
/// for a space, into raw bytes.
pub fn decode_form(value: &str) -> Cow<'_, [u8]> {
    if memchr::memchr(b'+', value.as_bytes()).is_some() {
        Cow::Owned(decode_bytes(&value.replace('+', " ")).into_owned())
    } else {
        decode_bytes(value)
    }
}

/// Like [`decode`], without requiring the result to be UTF-8.
pub fn decode_bytes(value: &str) -> Cow<'_, [u8]> {
    if memchr::memchr(b'%', value.as_bytes()).is_none() {
        return Cow::Borrowed(value.as_bytes());
    }

    let bytes = value.as_bytes();
    let mut ret = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                ret.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        ret.push(bytes[i]);
        i += 1;
    }

    Cow::Owned(ret)
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
