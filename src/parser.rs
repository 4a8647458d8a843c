//! CSV record parsing for the verse table.
//!
//! The table is scanned character by character so that quoted fields may
//! span several physical lines. The first row is a header and is skipped.

use crate::verse::Verse;

/// Number of leading columns every admitted row must have.
pub const REQUIRED_COLUMNS: usize = 8;

/// Parse the full text of the verse table into records in file order.
///
/// Rows with fewer than [`REQUIRED_COLUMNS`] fields or an empty first field
/// are skipped. A row still inside a quoted field when the input ends is
/// discarded.
pub fn parse_verses(text: &str) -> Vec<Verse> {
    let mut verses = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    for line in text.split('\n').skip(1) {
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '"' if in_quotes && chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = !in_quotes,
                ',' if !in_quotes => {
                    record.push(field.trim().to_string());
                    field.clear();
                }
                _ => field.push(c),
            }
        }

        if in_quotes {
            // Quoted field continues on the next physical line.
            field.push('\n');
            continue;
        }

        record.push(field.trim().to_string());
        field.clear();
        if let Some(verse) = build_verse(&mut record, verses.len() + 1) {
            verses.push(verse);
        }
        record.clear();
    }

    verses
}

fn build_verse(record: &mut Vec<String>, sequence_id: usize) -> Option<Verse> {
    if record.len() < REQUIRED_COLUMNS || record[0].is_empty() {
        return None;
    }

    let mut columns = record.drain(..REQUIRED_COLUMNS);
    let mut next = || columns.next().unwrap_or_default();

    let verse_id = next();
    let chapter = parse_leading_int(&next()).unwrap_or(0);
    let verse_number = parse_leading_int(&next()).unwrap_or(0);

    Some(Verse {
        sequence_id,
        verse_id,
        chapter,
        verse_number,
        original_text: next(),
        transliteration: next(),
        meaning_primary: next(),
        meaning_secondary: next(),
        word_gloss: next(),
    })
}

/// Parse the integer prefix of `input`, the way browsers' `parseInt` does.
///
/// Leading whitespace and a single sign are accepted, then an optional `0x`
/// prefix selecting base 16, then the longest run of digits in that base.
/// Anything after the digits is ignored. Returns `None` when no digit is found
/// or the value does not fit in an `i64`.
pub fn parse_leading_int(input: &str) -> Option<i64> {
    let trimmed = input.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let (radix, rest) = match rest.get(..2) {
        Some("0x") | Some("0X") => (16, &rest[2..]),
        _ => (10, rest),
    };

    let end = rest
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }

    let value = i64::from_str_radix(&rest[..end], radix).ok()?;
    Some(if negative { -value } else { value })
}
