//! # result.rs - Ranked results and display colour composition
//!
//! A [`MatchResult`] ties an item handle (shared chunk + slot) to the rank
//! points computed from the sort criteria and to the covering match
//! offsets. Points are four 16-bit fields, most significant criterion
//! first, stored so that plain lexicographic `<` means "ranks better";
//! the item index is the final tiebreak, reversed under `tac`.
//!
//! The colour composer merges three layers over one item - source-side
//! ANSI ranges, match offsets, and nth match-scope ranges - into disjoint
//! [`ColorOffset`] runs for the display contract. It builds per-character
//! cell metadata, then walks the cells emitting a new run whenever the
//! cell signature changes, the same per-character map then run-length
//! merge the colorizer applies to regex capture styles.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::ansi::{AnsiState, COLOR_DEFAULT};
use crate::item::{Chunk, Item, Offset};

/// A sort criterion for one of the rank point slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    /// Match score (higher is better)
    Score,
    /// Length of the whitespace token containing the match (shorter wins)
    Chunk,
    /// Trimmed item length (shorter wins)
    Length,
    /// Distance from the match to the final path component (basename wins)
    Pathname,
    /// Match begin column (earlier wins)
    Begin,
    /// Match end column (earlier wins)
    End,
}

impl std::str::FromStr for Criterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "score" => Ok(Criterion::Score),
            "chunk" => Ok(Criterion::Chunk),
            "length" => Ok(Criterion::Length),
            "pathname" => Ok(Criterion::Pathname),
            "begin" => Ok(Criterion::Begin),
            "end" => Ok(Criterion::End),
            _ => Err(format!(
                "invalid sort criterion: '{}' (score|chunk|length|pathname|begin|end)",
                s
            )),
        }
    }
}

/// Parse a `--tiebreak` list into the fixed criteria vector.
///
/// `score` always occupies the first slot; at most four criteria fit the
/// points array and duplicates are rejected.
pub fn parse_criteria(spec: &str) -> Result<Vec<Criterion>, String> {
    let mut criteria = vec![Criterion::Score];
    for part in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let criterion: Criterion = part.parse()?;
        if criteria.contains(&criterion) {
            if criterion == Criterion::Score {
                continue;
            }
            return Err(format!("duplicate sort criterion: '{}'", part));
        }
        criteria.push(criterion);
    }
    if criteria.len() > 4 {
        return Err("at most 4 sort criteria are supported".to_string());
    }
    Ok(criteria)
}

/// One ranked match: an item handle plus points and covering offsets.
#[derive(Debug, Clone)]
pub struct MatchResult {
    chunk: Arc<Chunk>,
    slot: u32,
    index: u32,
    points: [u16; 4],
    offsets: Box<[Offset]>,
}

impl MatchResult {
    pub fn new(
        chunk: Arc<Chunk>,
        slot: u32,
        criteria: &[Criterion],
        score: i32,
        offsets: Vec<Offset>,
    ) -> Self {
        let item = chunk
            .get(slot as usize)
            .expect("result slot must lie within its chunk");
        let index = item.index();
        let points = build_points(criteria, item, score, &offsets);
        MatchResult {
            chunk,
            slot,
            index,
            points,
            offsets: offsets.into_boxed_slice(),
        }
    }

    pub fn item(&self) -> &Item {
        self.chunk
            .get(self.slot as usize)
            .expect("result slot must lie within its chunk")
    }

    /// The item's ingestion ordinal, the final tiebreak.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Slot of the item within its chunk; lets a cached result seed a
    /// rescoring pass without searching for the item again.
    pub(crate) fn slot(&self) -> u32 {
        self.slot
    }

    pub fn points(&self) -> &[u16; 4] {
        &self.points
    }

    pub fn offsets(&self) -> &[Offset] {
        &self.offsets
    }
}

/// Encode the criteria into the points array. Every field is stored so
/// that a smaller value ranks better; `Score` is inverted for that reason.
fn build_points(criteria: &[Criterion], item: &Item, score: i32, offsets: &[Offset]) -> [u16; 4] {
    let begin = offsets.first().map(|o| o.begin).unwrap_or(0);
    let end = offsets.last().map(|o| o.end).unwrap_or(0);

    let mut points = [0u16; 4];
    for (slot, criterion) in criteria.iter().take(4).enumerate() {
        let value: u16 = match criterion {
            Criterion::Score => u16::MAX - clamp_u16(score),
            Criterion::Length => clamp_u16(item.trimmed_len() as i32),
            Criterion::Begin => clamp_u16(begin as i32),
            Criterion::End => clamp_u16(end as i32),
            Criterion::Chunk => clamp_u16(token_len_at(item.text(), begin) as i32),
            Criterion::Pathname => clamp_u16(basename_distance(item.text(), begin) as i32),
        };
        points[slot] = value;
    }
    points
}

fn clamp_u16(value: i32) -> u16 {
    value.clamp(0, u16::MAX as i32) as u16
}

/// Length of the whitespace-delimited token containing column `begin`.
fn token_len_at(text: &str, begin: u32) -> u32 {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return 0;
    }
    let pos = (begin as usize).min(chars.len() - 1);
    let mut start = pos;
    while start > 0 && !chars[start - 1].is_whitespace() {
        start -= 1;
    }
    let mut end = pos;
    while end < chars.len() && !chars[end].is_whitespace() {
        end += 1;
    }
    (end - start) as u32
}

/// Distance from the match begin to the start of the final path component;
/// zero when the match lies in the basename (or the text has no separator).
fn basename_distance(text: &str, begin: u32) -> u32 {
    let mut base_start = 0u32;
    for (i, c) in text.chars().enumerate() {
        if c == '/' {
            base_start = i as u32 + 1;
        }
    }
    base_start.saturating_sub(begin)
}

/// Rank comparison: lexicographic over the points, then the ingestion
/// index, reversed when `tac` is set.
pub fn compare_ranks(a: &MatchResult, b: &MatchResult, tac: bool) -> Ordering {
    match a.points.cmp(&b.points) {
        Ordering::Equal => {
            let by_index = a.index.cmp(&b.index);
            if tac { by_index.reverse() } else { by_index }
        }
        unequal => unequal,
    }
}

//==============================================================================
// Colour composition

/// A foreground/background/attribute triple from the display theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorPair {
    pub fg: i32,
    pub bg: i32,
    pub attrs: u16,
}

impl ColorPair {
    pub const DEFAULT: ColorPair = ColorPair { fg: COLOR_DEFAULT, bg: COLOR_DEFAULT, attrs: 0 };

    pub fn new(fg: i32, bg: i32, attrs: u16) -> Self {
        ColorPair { fg, bg, attrs }
    }

    /// Lift the pair into an SGR state for re-emission on the output path.
    pub fn to_ansi_state(self) -> AnsiState {
        AnsiState { fg: self.fg, bg: self.bg, attrs: self.attrs, ..AnsiState::default() }
    }
}

/// One disjoint display run; together they cover `[0, max_col)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorOffset {
    pub offset: Offset,
    pub color: ColorPair,
    pub is_match: bool,
    pub url: Option<Arc<str>>,
}

/// Per-character cell signature used during composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Cell {
    /// Index into the item's ANSI ranges, when one covers this column
    ansi: Option<u32>,
    is_match: bool,
    is_nth: bool,
}

impl MatchResult {
    /// Compose the display runs for this result.
    ///
    /// Layers, in paint order: the item's source-side ANSI ranges (unless
    /// `strip_colors`), the nth match-scope ranges (merging `nth_attrs`),
    /// and the match offsets (overlaying `matched` on whatever colour the
    /// cell already has - an ANSI truecolor background survives under a
    /// match whose pair leaves that channel default).
    pub fn color_offsets(
        &self,
        base: ColorPair,
        matched: ColorPair,
        nth_attrs: u16,
        max_col: u32,
        strip_colors: bool,
    ) -> Vec<ColorOffset> {
        let item = self.item();
        let colors = item.colors();
        let text_cols = item.char_len().min(max_col);

        let mut cells = vec![Cell::default(); text_cols as usize];
        let mut full_bg: Option<&AnsiState> = None;

        if !strip_colors {
            for (i, range) in colors.iter().enumerate() {
                if range.is_full_bg() {
                    full_bg = Some(&range.state);
                    continue;
                }
                for col in range.begin..range.end.min(text_cols) {
                    cells[col as usize].ansi = Some(i as u32);
                }
            }
        }
        if let Some(ranges) = item.matching_ranges() {
            for range in ranges {
                for col in range.begin..range.end.min(text_cols) {
                    cells[col as usize].is_nth = true;
                }
            }
        }
        for offset in self.offsets.iter() {
            for col in offset.begin..offset.end.min(text_cols) {
                cells[col as usize].is_match = true;
            }
        }

        let mut runs: Vec<ColorOffset> = Vec::new();
        let mut run_start = 0u32;
        for col in 1..=text_cols {
            if col == text_cols || cells[col as usize] != cells[run_start as usize] {
                let cell = cells[run_start as usize];
                runs.push(self.compose_run(
                    Offset::new(run_start, col),
                    cell,
                    colors,
                    base,
                    matched,
                    nth_attrs,
                ));
                run_start = col;
            }
        }

        // A full-background marker paints the tail of the row.
        if max_col > text_cols {
            let color = match full_bg {
                Some(state) if !strip_colors => ColorPair::new(base.fg, state.bg, base.attrs),
                _ => base,
            };
            runs.push(ColorOffset {
                offset: Offset::new(text_cols, max_col),
                color,
                is_match: false,
                url: None,
            });
        }
        runs
    }

    fn compose_run(
        &self,
        offset: Offset,
        cell: Cell,
        colors: &[crate::ansi::AnsiOffset],
        base: ColorPair,
        matched: ColorPair,
        nth_attrs: u16,
    ) -> ColorOffset {
        let mut color = base;
        let mut url = None;
        if let Some(idx) = cell.ansi {
            let state = &colors[idx as usize].state;
            if state.fg != COLOR_DEFAULT {
                color.fg = state.fg;
            }
            if state.bg != COLOR_DEFAULT {
                color.bg = state.bg;
            }
            color.attrs |= state.attrs;
            url = state.url.clone();
        }
        if cell.is_nth {
            color.attrs |= nth_attrs;
        }
        if cell.is_match {
            if matched.fg != COLOR_DEFAULT {
                color.fg = matched.fg;
            }
            if matched.bg != COLOR_DEFAULT {
                color.bg = matched.bg;
            }
            color.attrs |= matched.attrs;
        }
        ColorOffset { offset, color, is_match: cell.is_match, url }
    }
}
