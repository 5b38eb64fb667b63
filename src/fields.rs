//! # fields.rs - Field ranges for match scoping
//!
//! `--nth` restricts matching to selected fields of each record. Fields are
//! 1-based, negative indices count from the end, and `a..b` ranges are
//! inclusive with either side open. Records are tokenized awk-style on
//! whitespace, or on a `--delimiter` regex; each token keeps its trailing
//! delimiter so that concatenating all tokens reproduces the record.
//!
//! The selected ranges become per-item match-scope offsets (in logical
//! characters); reported match offsets are mapped back to whole-record
//! coordinates by the pattern layer.

use regex::Regex;

use crate::item::Offset;

/// One `--nth` component: an inclusive 1-based field range. `0` stands for
/// an open bound (`..3`, `2..`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRange {
    pub begin: i32,
    pub end: i32,
}

impl FieldRange {
    pub fn single(n: i32) -> Self {
        FieldRange { begin: n, end: n }
    }
}

/// Parse an `--nth` specification such as `1,3..5,-2..`.
///
/// Returns an error message naming the offending component; field index
/// zero is rejected.
pub fn parse_ranges(spec: &str) -> Result<Vec<FieldRange>, String> {
    let mut ranges = Vec::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(format!("empty field range in '{}'", spec));
        }
        let range = if let Some((lo, hi)) = part.split_once("..") {
            let begin = parse_bound(lo, part)?;
            let end = parse_bound(hi, part)?;
            FieldRange { begin, end }
        } else {
            let n = parse_bound(part, part)?;
            if n == 0 {
                return Err(format!("field index must not be zero: '{}'", part));
            }
            FieldRange::single(n)
        };
        ranges.push(range);
    }
    Ok(ranges)
}

fn parse_bound(s: &str, context: &str) -> Result<i32, String> {
    if s.is_empty() {
        return Ok(0);
    }
    s.parse::<i32>()
        .map_err(|_| format!("invalid field range: '{}'", context))
}

/// A token's span in logical characters, trailing delimiter included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Token {
    begin: u32,
    end: u32,
}

/// Split `text` into token spans. Without a delimiter, tokens are
/// whitespace-separated words with their trailing (and, for the first
/// token, leading) whitespace attached.
fn tokenize(text: &str, delimiter: Option<&Regex>) -> Vec<Token> {
    match delimiter {
        Some(re) => tokenize_regex(text, re),
        None => tokenize_whitespace(text),
    }
}

fn tokenize_whitespace(text: &str) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    // Leading whitespace belongs to the first token, awk-style.
    let mut begin = 0u32;
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    while i < chars.len() {
        while i < chars.len() && !chars[i].is_whitespace() {
            i += 1;
        }
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        tokens.push(Token { begin, end: i as u32 });
        begin = i as u32;
    }
    tokens
}

fn tokenize_regex(text: &str, re: &Regex) -> Vec<Token> {
    // Char offset for every byte boundary where a char starts.
    let byte_starts: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
    let to_char = |byte: usize| -> u32 {
        byte_starts.partition_point(|&b| b < byte) as u32
    };

    let mut tokens = Vec::new();
    let mut begin = 0usize;
    for m in re.find_iter(text) {
        if m.end() == begin {
            // Zero-width delimiter match; avoid an empty-token loop.
            continue;
        }
        tokens.push(Token { begin: to_char(begin), end: to_char(m.end()) });
        begin = m.end();
    }
    if begin < text.len() {
        tokens.push(Token { begin: to_char(begin), end: text.chars().count() as u32 });
    }
    tokens
}

/// Compute the match-scope offsets of `text` for the given `--nth` ranges.
///
/// Returns `None` when the selection covers the whole record (matching can
/// then skip the scoping machinery entirely), `Some(vec![])` when no field
/// is selected, and the merged, sorted spans otherwise.
pub fn matching_ranges(
    text: &str,
    delimiter: Option<&Regex>,
    ranges: &[FieldRange],
) -> Option<Vec<Offset>> {
    let tokens = tokenize(text, delimiter);
    if tokens.is_empty() {
        return Some(Vec::new());
    }
    let count = tokens.len() as i32;
    let resolve = |bound: i32, default: i32| -> i32 {
        match bound {
            0 => default,
            n if n < 0 => count + n + 1,
            n => n,
        }
    };

    let mut spans: Vec<Offset> = Vec::new();
    for range in ranges {
        let begin = resolve(range.begin, 1).max(1);
        let end = resolve(range.end, count).min(count);
        if begin > end {
            continue;
        }
        let first = &tokens[(begin - 1) as usize];
        let last = &tokens[(end - 1) as usize];
        spans.push(Offset::new(first.begin, last.end));
    }
    if spans.is_empty() {
        return Some(Vec::new());
    }

    spans.sort();
    let mut merged: Vec<Offset> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if span.begin <= last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }

    let whole = merged.len() == 1
        && merged[0].begin == 0
        && merged[0].end == text.chars().count() as u32;
    if whole { None } else { Some(merged) }
}
