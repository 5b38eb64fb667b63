//! # pattern.rs - Query parsing and per-item matching
//!
//! A query is a conjunction of terms separated by spaces (backslash-escaped
//! spaces stay literal). Each term carries a kind and an optional
//! inversion:
//!
//! | syntax      | kind                        |
//! |-------------|-----------------------------|
//! | `abc`       | fuzzy (exact in exact mode) |
//! | `'abc`      | exact (fuzzy in exact mode) |
//! | `^abc`      | prefix                      |
//! | `abc$`      | suffix                      |
//! | `^abc$`     | equal                       |
//! | `!abc`      | inverted exact              |
//! | `!^abc`     | inverted prefix             |
//!
//! In regex mode the whole query is a single regex term. An item qualifies
//! iff every plain term matches and no inverted term does; the total score
//! is the sum of the per-term scores and the covering offsets accumulate.
//!
//! The pattern's **fingerprint** is its canonical text, used as the result
//! cache key; fingerprint containment drives the cache extension rule.

use std::str::FromStr;

use regex::Regex;

use crate::error::SiftError;
use crate::flag::Flag;
use crate::item::{Item, Offset};
use crate::score::{self, MatchSpan};

/// How term case relates to item case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseMatching {
    /// Case-sensitive only when the term contains an uppercase character
    #[default]
    Smart,
    /// Always case-sensitive
    Respect,
    /// Never case-sensitive
    Ignore,
}

impl FromStr for CaseMatching {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "smart" => Ok(CaseMatching::Smart),
            "respect" => Ok(CaseMatching::Respect),
            "ignore" => Ok(CaseMatching::Ignore),
            _ => Err(format!("invalid case mode: '{}' (smart|respect|ignore)", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    Fuzzy,
    Exact,
    Prefix,
    Suffix,
    Equal,
    Regex,
}

/// One atomic query component.
#[derive(Debug)]
pub struct Term {
    kind: TermKind,
    inverted: bool,
    needle: Box<[char]>,
    case_sensitive: bool,
    regex: Option<Regex>,
}

impl Term {
    pub fn kind(&self) -> TermKind {
        self.kind
    }

    pub fn inverted(&self) -> bool {
        self.inverted
    }

    /// Match this term against a slice of item characters. `trimmed` is the
    /// length with trailing whitespace excluded, used by the suffix anchor.
    fn match_chars(&self, chars: &[char], trimmed: usize, stop: Option<&Flag>) -> Option<MatchSpan> {
        match self.kind {
            TermKind::Fuzzy => score::fuzzy_match(chars, &self.needle, self.case_sensitive, stop),
            TermKind::Exact => score::exact_match(chars, &self.needle, self.case_sensitive),
            TermKind::Prefix => score::prefix_match(chars, &self.needle, self.case_sensitive),
            TermKind::Suffix => score::suffix_match(chars, trimmed, &self.needle, self.case_sensitive),
            TermKind::Equal => score::equal_match(chars, &self.needle, self.case_sensitive),
            TermKind::Regex => None,
        }
    }

    /// Regex terms run on the string form; byte positions are translated to
    /// character offsets and the whole match is the covering offset.
    fn match_regex(&self, text: &str) -> Option<MatchSpan> {
        let re = self.regex.as_ref()?;
        let m = re.find(text)?;
        let begin = text[..m.start()].chars().count() as u32;
        let len = m.as_str().chars().count() as u32;
        Some(MatchSpan {
            score: score::SCORE_MATCH * len as i32,
            offset: Offset::new(begin, begin + len),
        })
    }

    /// Canonical rendering for the fingerprint: the user syntax with the
    /// needle case-folded when matching insensitively.
    fn canonical(&self) -> String {
        let needle: String = if self.case_sensitive {
            self.needle.iter().collect()
        } else {
            self.needle.iter().flat_map(|c| c.to_lowercase()).collect()
        };
        let mut out = String::new();
        if self.inverted {
            out.push('!');
        }
        match self.kind {
            TermKind::Fuzzy => out.push_str(&needle),
            TermKind::Exact => {
                out.push('\'');
                out.push_str(&needle);
            }
            TermKind::Prefix => {
                out.push('^');
                out.push_str(&needle);
            }
            TermKind::Suffix => {
                out.push_str(&needle);
                out.push('$');
            }
            TermKind::Equal => {
                out.push('^');
                out.push_str(&needle);
                out.push('$');
            }
            TermKind::Regex => {
                out.push_str("re:");
                out.push_str(&needle);
            }
        }
        out
    }
}

/// Options fixed at startup that shape pattern construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternOptions {
    /// Treat the whole query as one regex term
    pub regex: bool,
    /// Flip the default term kind to exact
    pub exact: bool,
    pub case: CaseMatching,
}

/// A parsed query: a conjunction of terms plus its cache fingerprint.
#[derive(Debug, Default)]
pub struct Pattern {
    terms: Vec<Term>,
    fingerprint: String,
}

impl Pattern {
    /// The empty pattern: matches everything with score zero.
    pub fn empty() -> Self {
        Pattern::default()
    }

    /// Parse a query under the given options. An ill-formed regex is
    /// rejected here so the search can be skipped up front.
    pub fn parse(query: &str, options: &PatternOptions) -> Result<Self, SiftError> {
        if options.regex {
            return Self::parse_regex(query, options);
        }

        let mut terms = Vec::new();
        for token in split_terms(query) {
            let mut rest = token.as_str();
            let inverted = rest.starts_with('!');
            if inverted {
                rest = &rest[1..];
            }

            let mut kind = if options.exact { TermKind::Exact } else { TermKind::Fuzzy };
            if let Some(stripped) = rest.strip_prefix('\'') {
                // The quote flips between fuzzy and exact
                kind = if options.exact { TermKind::Fuzzy } else { TermKind::Exact };
                rest = stripped;
            } else {
                let prefixed = rest.starts_with('^');
                let suffixed = rest.len() > 1 && rest.ends_with('$');
                match (prefixed, suffixed) {
                    (true, true) => {
                        kind = TermKind::Equal;
                        rest = &rest[1..rest.len() - 1];
                    }
                    (true, false) => {
                        kind = TermKind::Prefix;
                        rest = &rest[1..];
                    }
                    (false, true) => {
                        kind = TermKind::Suffix;
                        rest = &rest[..rest.len() - 1];
                    }
                    (false, false) if inverted => {
                        // A bare inverted term excludes substrings
                        kind = TermKind::Exact;
                    }
                    _ => {}
                }
            }

            if rest.is_empty() {
                continue;
            }
            let case_sensitive = term_case(rest, options.case);
            terms.push(Term {
                kind,
                inverted,
                needle: rest.chars().collect(),
                case_sensitive,
                regex: None,
            });
        }

        Ok(Self::from_terms(terms))
    }

    fn parse_regex(query: &str, options: &PatternOptions) -> Result<Self, SiftError> {
        if query.is_empty() {
            return Ok(Pattern::empty());
        }
        let case_sensitive = term_case(query, options.case);
        let source = if case_sensitive {
            query.to_string()
        } else {
            format!("(?i){}", query)
        };
        let regex = Regex::new(&source)?;
        let terms = vec![Term {
            kind: TermKind::Regex,
            inverted: false,
            needle: query.chars().collect(),
            case_sensitive,
            regex: Some(regex),
        }];
        Ok(Self::from_terms(terms))
    }

    fn from_terms(terms: Vec<Term>) -> Self {
        let fingerprint = terms.iter().map(Term::canonical).collect::<Vec<_>>().join(" ");
        Pattern { terms, fingerprint }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Canonical text, the cache key.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Whether cached results for this pattern may seed other searches.
    /// Inverted terms break the subset property; equal and regex terms do
    /// not restrict monotonically under text extension.
    pub fn cacheable(&self) -> bool {
        !self.terms.is_empty()
            && self.terms.iter().all(|t| {
                !t.inverted && !matches!(t.kind, TermKind::Equal | TermKind::Regex)
            })
    }

    /// Match every term against one item. Returns the summed score and the
    /// accumulated covering offsets, or `None` if the item does not
    /// qualify. `scratch` is a reusable character buffer owned by the
    /// calling worker.
    pub fn match_item(
        &self,
        item: &Item,
        scratch: &mut Vec<char>,
        stop: Option<&Flag>,
    ) -> Option<(i32, Vec<Offset>)> {
        scratch.clear();
        scratch.extend(item.text().chars());

        let mut total: i32 = 0;
        let mut offsets: Vec<Offset> = Vec::new();
        for term in &self.terms {
            let span = match term.kind {
                TermKind::Regex => self.match_regex_scoped(term, item),
                _ => match item.matching_ranges() {
                    None => term.match_chars(scratch, item.trimmed_len() as usize, stop),
                    Some(ranges) => ranges.iter().find_map(|range| {
                        let slice = &scratch[range.begin as usize..range.end as usize];
                        term.match_chars(slice, slice.len(), stop).map(|mut span| {
                            span.offset.begin += range.begin;
                            span.offset.end += range.begin;
                            span
                        })
                    }),
                },
            };

            match (span, term.inverted) {
                (Some(_), true) => return None,
                (None, true) => {}
                (None, false) => return None,
                (Some(span), false) => {
                    total += span.score;
                    if !span.offset.is_empty() {
                        offsets.push(span.offset);
                    }
                }
            }
        }

        offsets.sort();
        Some((total, offsets))
    }

    fn match_regex_scoped(&self, term: &Term, item: &Item) -> Option<MatchSpan> {
        match item.matching_ranges() {
            None => term.match_regex(item.text()),
            Some(ranges) => {
                let span = term.match_regex(item.text())?;
                // The whole match must fall inside one scoped range
                ranges
                    .iter()
                    .any(|r| span.offset.begin >= r.begin && span.offset.end <= r.end)
                    .then_some(span)
            }
        }
    }
}

fn term_case(needle: &str, case: CaseMatching) -> bool {
    match case {
        CaseMatching::Respect => true,
        CaseMatching::Ignore => false,
        CaseMatching::Smart => needle.chars().any(char::is_uppercase),
    }
}

/// Split a query on unescaped spaces; `\ ` stays a literal space inside a
/// term.
fn split_terms(query: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in query.chars() {
        match c {
            _ if escaped => {
                if c != ' ' {
                    current.push('\\');
                }
                current.push(c);
                escaped = false;
            }
            '\\' => escaped = true,
            ' ' => {
                if !current.is_empty() {
                    terms.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if escaped {
        current.push('\\');
    }
    if !current.is_empty() {
        terms.push(current);
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(text: &str) -> Item {
        Item::new(0, text.as_bytes().to_vec(), text.to_string(), None, None)
    }

    fn parse(query: &str) -> Pattern {
        Pattern::parse(query, &PatternOptions::default()).expect("parse should succeed")
    }

    #[test]
    fn test_parse_term_kinds() {
        let p = parse("abc 'def ^ghi jkl$ ^mno$ !pqr !^stu");
        let kinds: Vec<(TermKind, bool)> =
            p.terms().iter().map(|t| (t.kind(), t.inverted())).collect();
        assert_eq!(
            kinds,
            vec![
                (TermKind::Fuzzy, false),
                (TermKind::Exact, false),
                (TermKind::Prefix, false),
                (TermKind::Suffix, false),
                (TermKind::Equal, false),
                (TermKind::Exact, true),
                (TermKind::Prefix, true),
            ]
        );
    }

    #[test]
    fn test_exact_mode_flips_quote() {
        let options = PatternOptions { exact: true, ..PatternOptions::default() };
        let p = Pattern::parse("abc 'def", &options).unwrap();
        assert_eq!(p.terms()[0].kind(), TermKind::Exact);
        assert_eq!(p.terms()[1].kind(), TermKind::Fuzzy);
    }

    #[test]
    fn test_escaped_space_stays_in_term() {
        let p = parse("foo\\ bar baz");
        assert_eq!(p.terms().len(), 2);
        assert_eq!(p.terms()[0].needle.iter().collect::<String>(), "foo bar");
    }

    #[test]
    fn test_empty_and_marker_only_queries() {
        assert!(parse("").is_empty());
        assert!(parse("   ").is_empty());
        assert!(parse("!").is_empty(), "markers without a needle drop the term");
        assert!(parse("^").is_empty());
    }

    #[test]
    fn test_smart_case() {
        let p = parse("abc Abc");
        assert!(!p.terms()[0].case_sensitive, "all-lowercase term folds case");
        assert!(p.terms()[1].case_sensitive, "uppercase in the term respects case");

        let ignore = PatternOptions { case: CaseMatching::Ignore, ..PatternOptions::default() };
        let p = Pattern::parse("Abc", &ignore).unwrap();
        assert!(!p.terms()[0].case_sensitive);
    }

    #[test]
    fn test_fingerprint_case_folds_insensitive_terms() {
        let p = parse("ABC");
        // Smart case: uppercase needle is case-sensitive, kept verbatim
        assert_eq!(p.fingerprint(), "ABC");
        let ignore = PatternOptions { case: CaseMatching::Ignore, ..PatternOptions::default() };
        let p = Pattern::parse("ABC", &ignore).unwrap();
        assert_eq!(p.fingerprint(), "abc");
    }

    #[test]
    fn test_fingerprint_containment_for_extension() {
        let short = parse("fo");
        let long = parse("foo");
        assert!(
            long.fingerprint().contains(short.fingerprint()),
            "growing a query must keep the old fingerprint as a substring"
        );
    }

    #[test]
    fn test_cacheable_rules() {
        assert!(parse("foo 'bar ^baz").cacheable());
        assert!(!parse("!foo").cacheable(), "inverted terms are not cacheable");
        assert!(!parse("^foo$").cacheable(), "equal terms are not cacheable");
        assert!(!parse("").cacheable(), "the empty pattern is not cacheable");
        let re = PatternOptions { regex: true, ..PatternOptions::default() };
        assert!(!Pattern::parse("fo+", &re).unwrap().cacheable());
    }

    #[test]
    fn test_match_item_and_of_terms() {
        let mut scratch = Vec::new();
        let p = parse("foo bar");
        assert!(
            p.match_item(&item("foo and bar"), &mut scratch, None).is_some(),
            "both terms present"
        );
        assert!(
            p.match_item(&item("foo only"), &mut scratch, None).is_none(),
            "missing term disqualifies"
        );
    }

    #[test]
    fn test_match_item_inverted_terms() {
        let mut scratch = Vec::new();
        let p = parse("foo !bar");
        let (score, offsets) = p
            .match_item(&item("foo baz"), &mut scratch, None)
            .expect("inverted term absent, item qualifies");
        assert!(score > 0);
        assert_eq!(offsets.len(), 1, "inverted terms contribute no offsets");

        assert!(
            p.match_item(&item("foo bar"), &mut scratch, None).is_none(),
            "present inverted term disqualifies"
        );
    }

    #[test]
    fn test_match_item_accumulates_offsets_sorted() {
        let mut scratch = Vec::new();
        let p = parse("bar foo");
        let (_, offsets) = p.match_item(&item("foo bar"), &mut scratch, None).unwrap();
        assert_eq!(offsets, vec![Offset::new(0, 3), Offset::new(4, 7)]);
    }

    #[test]
    fn test_empty_pattern_matches_everything() {
        let mut scratch = Vec::new();
        let p = Pattern::empty();
        let (score, offsets) = p.match_item(&item("anything"), &mut scratch, None).unwrap();
        assert_eq!(score, 0);
        assert!(offsets.is_empty());
    }

    #[test]
    fn test_regex_pattern() {
        let options = PatternOptions { regex: true, ..PatternOptions::default() };
        let p = Pattern::parse(r"ba+r", &options).unwrap();
        let mut scratch = Vec::new();
        let (score, offsets) = p.match_item(&item("a baaar!"), &mut scratch, None).unwrap();
        assert_eq!(offsets, vec![Offset::new(2, 7)]);
        assert_eq!(score, score::SCORE_MATCH * 5);

        assert!(
            Pattern::parse("(unclosed", &options).is_err(),
            "bad regex is rejected at construction"
        );
    }

    #[test]
    fn test_regex_offsets_are_chars() {
        let options = PatternOptions { regex: true, ..PatternOptions::default() };
        let p = Pattern::parse("ok", &options).unwrap();
        let mut scratch = Vec::new();
        let (_, offsets) = p.match_item(&item("héé ok"), &mut scratch, None).unwrap();
        assert_eq!(offsets, vec![Offset::new(4, 6)], "regex offsets must be characters");
    }

    #[test]
    fn test_match_scoped_to_nth_ranges() {
        let mut scratch = Vec::new();
        let it = Item::new(
            0,
            b"alpha beta".to_vec(),
            "alpha beta".to_string(),
            None,
            Some(vec![Offset::new(6, 10)]),
        );
        let p = parse("bet");
        let (_, offsets) = p
            .match_item(&it, &mut scratch, None)
            .expect("pattern matches inside the scoped field");
        assert_eq!(offsets, vec![Offset::new(6, 9)], "offsets map back to the whole line");

        let p = parse("alpha");
        assert!(
            p.match_item(&it, &mut scratch, None).is_none(),
            "text outside the scope must not match"
        );
    }

    #[test]
    fn test_case_matching_from_str() {
        assert_eq!(CaseMatching::from_str("smart"), Ok(CaseMatching::Smart));
        assert_eq!(CaseMatching::from_str("respect"), Ok(CaseMatching::Respect));
        assert_eq!(CaseMatching::from_str("ignore"), Ok(CaseMatching::Ignore));
        assert!(CaseMatching::from_str("loose").is_err());
    }
}
