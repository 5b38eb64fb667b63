//! # score.rs - Match scoring
//!
//! Scoring for the fuzzy and anchored match kinds. The fuzzy scorer is a
//! Smith-Waterman-style dynamic program over pattern x text: every pattern
//! character must be matched, gaps are allowed only in the text, and a
//! per-position bonus table rewards matches at word boundaries, camelCase
//! humps, digit transitions and after path separators. O(|N|*|T|) time,
//! O(|T|) space, with a cheap subsequence prefilter in front so the DP only
//! runs on candidates.
//!
//! All positions are logical character indices, matching the offset
//! convention used across the pipeline.

use crate::flag::Flag;
use crate::item::Offset;

/// Score contributed by one matched character pair.
pub const SCORE_MATCH: i32 = 16;
/// Penalty for opening a gap between matched positions.
pub const SCORE_GAP_START: i32 = -3;
/// Penalty for each further character of an open gap.
pub const SCORE_GAP_EXTENSION: i32 = -1;
/// Bonus for a match at a word boundary (after whitespace, a non-word
/// character, or a path separator).
pub const BONUS_BOUNDARY: i32 = SCORE_MATCH / 2;
/// Bonus for matching a non-word character itself.
pub const BONUS_NON_WORD: i32 = SCORE_MATCH / 2;
/// Bonus for camelCase humps and letter-to-digit transitions.
pub const BONUS_CAMEL123: i32 = BONUS_BOUNDARY + SCORE_GAP_EXTENSION;
/// Bonus for extending a run of consecutive matches; chosen so that an
/// unbroken run always beats re-opening a gap.
pub const BONUS_CONSECUTIVE: i32 = -(SCORE_GAP_START + SCORE_GAP_EXTENSION);
/// The bonus on the first matched pattern character counts double, so
/// anchored matches win over mid-word matches of the same shape.
pub const BONUS_FIRST_CHAR_MULTIPLIER: i32 = 2;

/// Texts at least this long poll the stop flag once per DP row.
const LONG_TEXT: usize = 4096;

const SCORE_NEG: i32 = i32::MIN / 2;

/// Outcome of one term match: a score and the covering offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub score: i32,
    pub offset: Offset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    White,
    NonWord,
    Delimiter,
    Lower,
    Upper,
    Number,
}

fn char_class(c: char) -> CharClass {
    if c.is_whitespace() {
        CharClass::White
    } else if c == '/' {
        CharClass::Delimiter
    } else if c.is_lowercase() {
        CharClass::Lower
    } else if c.is_uppercase() {
        CharClass::Upper
    } else if c.is_numeric() {
        CharClass::Number
    } else if c.is_alphabetic() {
        // Uncased scripts count as word characters
        CharClass::Lower
    } else {
        CharClass::NonWord
    }
}

fn bonus_for(prev: CharClass, cur: CharClass) -> i32 {
    use CharClass::*;
    match cur {
        Lower | Upper | Number => match prev {
            White | NonWord | Delimiter => BONUS_BOUNDARY,
            Lower if cur == Upper => BONUS_CAMEL123,
            Lower | Upper if cur == Number => BONUS_CAMEL123,
            _ => 0,
        },
        NonWord | White | Delimiter => BONUS_NON_WORD,
    }
}

fn chars_eq(t: char, p: char, case_sensitive: bool) -> bool {
    t == p || (!case_sensitive && t.to_lowercase().eq(p.to_lowercase()))
}

/// Fuzzy-match `pattern` against `text`.
///
/// Returns the highest-scoring alignment as a score plus a single covering
/// offset; ties are broken towards the earliest start, then the earliest
/// end. `stop` is polled once per pattern row for long texts so a
/// cancelled search terminates within bounded work.
pub fn fuzzy_match(
    text: &[char],
    pattern: &[char],
    case_sensitive: bool,
    stop: Option<&Flag>,
) -> Option<MatchSpan> {
    if pattern.is_empty() {
        return Some(MatchSpan { score: 0, offset: Offset::new(0, 0) });
    }
    if pattern.len() > text.len() {
        return None;
    }

    // Subsequence prefilter. Also records the earliest position the first
    // pattern character can match: no alignment starts before it.
    let mut first = 0usize;
    let mut pi = 0usize;
    for (j, &c) in text.iter().enumerate() {
        if pi < pattern.len() && chars_eq(c, pattern[pi], case_sensitive) {
            if pi == 0 {
                first = j;
            }
            pi += 1;
        }
    }
    if pi < pattern.len() {
        return None;
    }

    let offset = first;
    let window = &text[offset..];
    let m = window.len();
    let n = pattern.len();
    let long = m >= LONG_TEXT;

    // Per-position bonus, using the class of the preceding character (the
    // start of input counts as whitespace, so position 0 is a boundary).
    let mut bonus = vec![0i32; m];
    let mut prev_class = if offset == 0 {
        CharClass::White
    } else {
        char_class(text[offset - 1])
    };
    for (j, &c) in window.iter().enumerate() {
        let class = char_class(c);
        bonus[j] = bonus_for(prev_class, class);
        prev_class = class;
    }

    // Rolling DP rows. M[j]: best score with pattern[..=i] matched and
    // pattern[i] at window[j]. H[j]: best score with pattern[..=i] matched
    // at or before window[j], gap penalties applied. Begins ride along so
    // the covering offset needs no backtracking.
    let mut prev_m = vec![SCORE_NEG; m];
    let mut prev_m_begin = vec![0u32; m];
    let mut prev_h = vec![SCORE_NEG; m];
    let mut prev_h_begin = vec![0u32; m];
    let mut cur_m = vec![SCORE_NEG; m];
    let mut cur_m_begin = vec![0u32; m];
    let mut cur_h = vec![SCORE_NEG; m];
    let mut cur_h_begin = vec![0u32; m];

    for i in 0..n {
        if long && stop.is_some_and(Flag::get) {
            return None;
        }

        let mut h_left = SCORE_NEG;
        let mut h_left_begin = 0u32;
        let mut in_gap = false;

        for j in 0..m {
            let mut m_val = SCORE_NEG;
            let mut m_begin = 0u32;
            if chars_eq(window[j], pattern[i], case_sensitive) {
                if i == 0 {
                    m_val = SCORE_MATCH + bonus[j] * BONUS_FIRST_CHAR_MULTIPLIER;
                    m_begin = j as u32;
                } else if j > 0 {
                    let cont = if prev_m[j - 1] > SCORE_NEG {
                        prev_m[j - 1] + SCORE_MATCH + BONUS_CONSECUTIVE.max(bonus[j])
                    } else {
                        SCORE_NEG
                    };
                    let fresh = if prev_h[j - 1] > SCORE_NEG {
                        prev_h[j - 1] + SCORE_MATCH + bonus[j]
                    } else {
                        SCORE_NEG
                    };
                    if cont > fresh || (cont == fresh && prev_m_begin[j - 1] <= prev_h_begin[j - 1])
                    {
                        m_val = cont;
                        m_begin = prev_m_begin[j - 1];
                    } else {
                        m_val = fresh;
                        m_begin = prev_h_begin[j - 1];
                    }
                }
            }

            let gap = if in_gap { SCORE_GAP_EXTENSION } else { SCORE_GAP_START };
            let h_gap = if h_left > SCORE_NEG { h_left + gap } else { SCORE_NEG };
            if m_val >= h_gap {
                cur_h[j] = m_val;
                cur_h_begin[j] = m_begin;
                in_gap = false;
            } else {
                cur_h[j] = h_gap;
                cur_h_begin[j] = h_left_begin;
                in_gap = true;
            }
            h_left = cur_h[j];
            h_left_begin = cur_h_begin[j];

            cur_m[j] = m_val;
            cur_m_begin[j] = m_begin;
        }

        std::mem::swap(&mut prev_m, &mut cur_m);
        std::mem::swap(&mut prev_m_begin, &mut cur_m_begin);
        std::mem::swap(&mut prev_h, &mut cur_h);
        std::mem::swap(&mut prev_h_begin, &mut cur_h_begin);
    }

    // The alignment must end on a match of the last pattern character.
    let mut best: Option<(i32, u32, usize)> = None;
    for j in 0..m {
        if prev_m[j] <= SCORE_NEG {
            continue;
        }
        let candidate = (prev_m[j], prev_m_begin[j], j);
        best = match best {
            None => Some(candidate),
            Some(b) if candidate.0 > b.0 || (candidate.0 == b.0 && candidate.1 < b.1) => {
                Some(candidate)
            }
            keep => keep,
        };
    }

    best.map(|(score, begin, end)| MatchSpan {
        score,
        offset: Offset::new(offset as u32 + begin, offset as u32 + end as u32 + 1),
    })
}

/// Exact substring match. Among all occurrences the one with the best
/// start-boundary bonus wins; ties go to the earliest occurrence.
pub fn exact_match(text: &[char], pattern: &[char], case_sensitive: bool) -> Option<MatchSpan> {
    if pattern.is_empty() {
        return Some(MatchSpan { score: 0, offset: Offset::new(0, 0) });
    }
    let n = pattern.len();
    if n > text.len() {
        return None;
    }

    let mut best: Option<MatchSpan> = None;
    for j in 0..=text.len() - n {
        if !window_eq(&text[j..j + n], pattern, case_sensitive) {
            continue;
        }
        let prev = if j == 0 { CharClass::White } else { char_class(text[j - 1]) };
        let bonus = bonus_for(prev, char_class(text[j]));
        let span = MatchSpan {
            score: SCORE_MATCH * n as i32 + bonus * BONUS_FIRST_CHAR_MULTIPLIER,
            offset: Offset::new(j as u32, (j + n) as u32),
        };
        if best.is_none_or(|b| span.score > b.score) {
            best = Some(span);
        }
    }
    best
}

/// Anchored match at the start of the text.
pub fn prefix_match(text: &[char], pattern: &[char], case_sensitive: bool) -> Option<MatchSpan> {
    if pattern.is_empty() {
        return Some(MatchSpan { score: 0, offset: Offset::new(0, 0) });
    }
    if pattern.len() > text.len() || !window_eq(&text[..pattern.len()], pattern, case_sensitive) {
        return None;
    }
    let bonus = bonus_for(CharClass::White, char_class(text[0]));
    Some(MatchSpan {
        score: SCORE_MATCH * pattern.len() as i32 + bonus * BONUS_FIRST_CHAR_MULTIPLIER,
        offset: Offset::new(0, pattern.len() as u32),
    })
}

/// Anchored match at the end of the text, trailing whitespace excluded.
pub fn suffix_match(
    text: &[char],
    trimmed_len: usize,
    pattern: &[char],
    case_sensitive: bool,
) -> Option<MatchSpan> {
    if pattern.is_empty() {
        return Some(MatchSpan { score: 0, offset: Offset::new(0, 0) });
    }
    let n = pattern.len();
    if n > trimmed_len || trimmed_len > text.len() {
        return None;
    }
    let begin = trimmed_len - n;
    if !window_eq(&text[begin..trimmed_len], pattern, case_sensitive) {
        return None;
    }
    let prev = if begin == 0 { CharClass::White } else { char_class(text[begin - 1]) };
    let bonus = bonus_for(prev, char_class(text[begin]));
    Some(MatchSpan {
        score: SCORE_MATCH * n as i32 + bonus * BONUS_FIRST_CHAR_MULTIPLIER,
        offset: Offset::new(begin as u32, trimmed_len as u32),
    })
}

/// Whole-text equality match.
pub fn equal_match(text: &[char], pattern: &[char], case_sensitive: bool) -> Option<MatchSpan> {
    if pattern.is_empty() {
        return if text.is_empty() {
            Some(MatchSpan { score: 0, offset: Offset::new(0, 0) })
        } else {
            None
        };
    }
    if text.len() != pattern.len() || !window_eq(text, pattern, case_sensitive) {
        return None;
    }
    let bonus = bonus_for(CharClass::White, char_class(text[0]));
    Some(MatchSpan {
        score: SCORE_MATCH * pattern.len() as i32 + bonus * BONUS_FIRST_CHAR_MULTIPLIER,
        offset: Offset::new(0, pattern.len() as u32),
    })
}

fn window_eq(window: &[char], pattern: &[char], case_sensitive: bool) -> bool {
    window
        .iter()
        .zip(pattern.iter())
        .all(|(&t, &p)| chars_eq(t, p, case_sensitive))
}
