//! Display formatting for media entries

pub use mmx_common::time::format_time;

/// Shown when a URL cannot be turned into a name
pub const UNKNOWN_NAME: &str = "?";

fn hex_value(byte: u8) -> Option<u8> {
    char::from(byte).to_digit(16).and_then(|d| u8::try_from(d).ok())
}

/// Decode `+` and `%XX` escapes
///
/// Returns `None` for a truncated or non-hex escape and for results that are
/// not valid UTF-8.
pub fn decode_url(url: &str) -> Option<String> {
    let mut bytes = url.bytes();
    let mut decoded = Vec::with_capacity(url.len());

    while let Some(byte) = bytes.next() {
        match byte {
            b'+' => decoded.push(b' '),
            b'%' => {
                let high = hex_value(bytes.next()?)?;
                let low = hex_value(bytes.next()?)?;
                decoded.push(high << 4 | low);
            }
            other => decoded.push(other),
        }
    }

    String::from_utf8(decoded).ok()
}

/// File name part of an encoded URL, for entries without a title
pub fn url_display_name(url: &str) -> String {
    let Some(decoded) = decode_url(url) else {
        return UNKNOWN_NAME.to_string();
    };

    match decoded.rsplit_once('/') {
        Some((_, name)) if !name.is_empty() => name.to_string(),
        _ => decoded,
    }
}
