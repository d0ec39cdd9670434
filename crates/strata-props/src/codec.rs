//! Property record format.
//!
//! A table is a sequence of records separated by `\r`. Each record is
//! `name:value,value,...`. Inside names and values the characters `%`, `:`,
//! `,`, `\r` and `\n` are written as `%25`, `%3A`, `%2C`, `%0D` and `%0A`.
//! Decoding skips empty records and ignores a record with no `:`.

use tracing::warn;

use crate::set::PropertySet;

const RECORD_SEPARATOR: char = '\r';
const NAME_SEPARATOR: char = ':';
const VALUE_SEPARATOR: char = ',';

/// Serialize a property table. Properties with no values never appear.
pub fn encode(set: &PropertySet) -> String {
    let mut out = String::new();
    for (name, values) in set.iter().filter(|(_, v)| !v.is_empty()) {
        if !out.is_empty() {
            out.push(RECORD_SEPARATOR);
        }
        escape_into(name, &mut out);
        out.push(NAME_SEPARATOR);
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                out.push(VALUE_SEPARATOR);
            }
            escape_into(value, &mut out);
        }
    }
    out
}

/// Parse a property table.
pub fn decode(text: &str) -> PropertySet {
    let mut set = PropertySet::new();
    for record in text.split(RECORD_SEPARATOR).filter(|r| !r.trim().is_empty()) {
        let Some((name, values)) = record.split_once(NAME_SEPARATOR) else {
            warn!(record, "property record without name separator ignored");
            continue;
        };
        let name = unescape(name.trim_start_matches('\n'));
        if name.is_empty() {
            warn!(record, "property record with empty name ignored");
            continue;
        }
        set.set(name, values.split(VALUE_SEPARATOR).map(unescape).collect());
    }
    set
}

fn escape_into(raw: &str, out: &mut String) {
    for c in raw.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            ',' => out.push_str("%2C"),
            '\r' => out.push_str("%0D"),
            '\n' => out.push_str("%0A"),
            c => out.push(c),
        }
    }
}

/// Decode `%XX` escapes. Malformed escapes are kept literally.
fn unescape(raw: &str) -> String {
    if !raw.contains('%') {
        return raw.to_string();
    }
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn hex(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
