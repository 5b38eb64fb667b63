//! # ansi.rs - ANSI escape extraction and re-emission
//!
//! This module turns a raw producer line into plain text plus a list of
//! styled ranges. The extractor scans byte-by-byte for escape sequences
//! (CSI SGR, OSC, SO/SI, single-character escapes and backspace
//! overstrike), keeps a running [`AnsiState`], and emits an [`AnsiOffset`]
//! whenever a colourful run of characters ends.
//!
//! ## Supported sequences
//!
//! - `ESC [ ... m` (SGR): colours, attributes, `38/48/58` extended colours
//!   (256-colour and truecolor), attribute clears, `4:n` underline styles
//! - `ESC [ K`: consumed; emits a zero-width full-background marker when a
//!   background colour is active
//! - OSC `8` hyperlinks, OSC `133` shell-integration marks (consumed)
//! - `SO`/`SI`, charset designators, two-character escapes (consumed)
//! - Backspace overstrike `X\bY` (`X\bX` = bold, `_\bX` = underline)
//!
//! Malformed sequences are never an error: the escape byte is consumed and
//! scanning continues, so extraction is total over arbitrary input.
//!
//! All offsets are in logical characters of the plain output, matching the
//! offset convention used by the matcher and the colour composer.

use std::sync::Arc;

/// Sentinel for "no colour set".
pub const COLOR_DEFAULT: i32 = -1;

/// Bit 24 marks a packed 24-bit RGB value in a colour field.
pub const TRUECOLOR_FLAG: i32 = 1 << 24;

pub const ATTR_BOLD: u16 = 1;
pub const ATTR_DIM: u16 = 1 << 1;
pub const ATTR_ITALIC: u16 = 1 << 2;
pub const ATTR_UNDERLINE: u16 = 1 << 3;
pub const ATTR_BLINK: u16 = 1 << 4;
pub const ATTR_REVERSE: u16 = 1 << 5;
pub const ATTR_CONCEAL: u16 = 1 << 6;
pub const ATTR_STRIKE: u16 = 1 << 7;
pub const ATTR_UNDERLINE_DOUBLE: u16 = 1 << 8;
pub const ATTR_UNDERLINE_CURLY: u16 = 1 << 9;
pub const ATTR_UNDERLINE_DOTTED: u16 = 1 << 10;
pub const ATTR_UNDERLINE_DASHED: u16 = 1 << 11;

const ATTR_UNDERLINE_ANY: u16 = ATTR_UNDERLINE
    | ATTR_UNDERLINE_DOUBLE
    | ATTR_UNDERLINE_CURLY
    | ATTR_UNDERLINE_DOTTED
    | ATTR_UNDERLINE_DASHED;

/// Running SGR state: foreground, background, attribute bits, underline
/// colour and the active OSC 8 hyperlink.
///
/// Colour fields hold `COLOR_DEFAULT`, an ANSI-256 index in `0..=255`, or a
/// packed RGB value with [`TRUECOLOR_FLAG`] set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnsiState {
    pub fg: i32,
    pub bg: i32,
    pub attrs: u16,
    pub underline_color: i32,
    pub url: Option<Arc<str>>,
}

impl Default for AnsiState {
    fn default() -> Self {
        AnsiState {
            fg: COLOR_DEFAULT,
            bg: COLOR_DEFAULT,
            attrs: 0,
            underline_color: COLOR_DEFAULT,
            url: None,
        }
    }
}

impl AnsiState {
    /// True when the state would visibly change rendered text. Only
    /// colourful runs produce [`AnsiOffset`] entries.
    pub fn is_colorful(&self) -> bool {
        self.fg != COLOR_DEFAULT || self.bg != COLOR_DEFAULT || self.attrs != 0 || self.url.is_some()
    }

    /// Render this state as an SGR escape sequence, or an empty string for
    /// the default state.
    pub fn to_sgr(&self) -> String {
        if !self.is_colorful() && self.underline_color == COLOR_DEFAULT {
            return String::new();
        }

        let mut codes: Vec<String> = Vec::new();
        if self.attrs & ATTR_BOLD != 0 {
            codes.push("1".into());
        }
        if self.attrs & ATTR_DIM != 0 {
            codes.push("2".into());
        }
        if self.attrs & ATTR_ITALIC != 0 {
            codes.push("3".into());
        }
        if self.attrs & ATTR_UNDERLINE != 0 {
            codes.push("4".into());
        }
        if self.attrs & ATTR_UNDERLINE_DOUBLE != 0 {
            codes.push("4:2".into());
        }
        if self.attrs & ATTR_UNDERLINE_CURLY != 0 {
            codes.push("4:3".into());
        }
        if self.attrs & ATTR_UNDERLINE_DOTTED != 0 {
            codes.push("4:4".into());
        }
        if self.attrs & ATTR_UNDERLINE_DASHED != 0 {
            codes.push("4:5".into());
        }
        if self.attrs & ATTR_BLINK != 0 {
            codes.push("5".into());
        }
        if self.attrs & ATTR_REVERSE != 0 {
            codes.push("7".into());
        }
        if self.attrs & ATTR_CONCEAL != 0 {
            codes.push("8".into());
        }
        if self.attrs & ATTR_STRIKE != 0 {
            codes.push("9".into());
        }

        push_color_codes(&mut codes, self.fg, 30, 90, 38);
        push_color_codes(&mut codes, self.bg, 40, 100, 48);
        if self.underline_color != COLOR_DEFAULT {
            if self.underline_color & TRUECOLOR_FLAG != 0 {
                let c = self.underline_color;
                codes.push(format!("58;2;{};{};{}", (c >> 16) & 0xff, (c >> 8) & 0xff, c & 0xff));
            } else {
                codes.push(format!("58;5;{}", self.underline_color));
            }
        }

        if codes.is_empty() {
            String::new()
        } else {
            format!("\x1b[{}m", codes.join(";"))
        }
    }
}

fn push_color_codes(codes: &mut Vec<String>, color: i32, base: i32, bright: i32, extended: i32) {
    if color == COLOR_DEFAULT {
        return;
    }
    if color & TRUECOLOR_FLAG != 0 {
        codes.push(format!(
            "{};2;{};{};{}",
            extended,
            (color >> 16) & 0xff,
            (color >> 8) & 0xff,
            color & 0xff
        ));
    } else if (0..8).contains(&color) {
        codes.push((base + color).to_string());
    } else if (8..16).contains(&color) {
        codes.push((bright + color - 8).to_string());
    } else {
        codes.push(format!("{};5;{}", extended, color));
    }
}

/// A half-open character range of the plain text carrying one SGR state.
///
/// Ranges are pairwise non-overlapping and non-empty, except zero-width
/// full-background markers (`begin == end`) which signal that the active
/// background fills the rest of the row from that column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnsiOffset {
    pub begin: u32,
    pub end: u32,
    pub state: AnsiState,
}

impl AnsiOffset {
    /// A zero-width marker signalling background fill from `begin` on.
    pub fn is_full_bg(&self) -> bool {
        self.begin == self.end
    }
}

/// Result of extraction: stripped text, styled ranges, and the state the
/// line ended in (threaded into the next record of a stream).
#[derive(Debug, Default)]
pub struct Extracted {
    pub text: String,
    pub ranges: Vec<AnsiOffset>,
    pub state: AnsiState,
}

/// One SGR parameter with a flag telling whether it was attached to the
/// previous parameter by a colon. The earliest separator on a run decides
/// how sub-parameters group, so `4:3` selects an underline style while
/// `4;3` sets two independent attributes.
#[derive(Debug, Clone, Copy)]
struct SgrParam {
    value: i32,
    colon: bool,
}

/// Strip ANSI sequences from `raw`, starting from `state` (the final state
/// of the previous record, or default at stream start).
pub fn extract_color(raw: &str, state: AnsiState) -> Extracted {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = Extractor {
        state,
        text: String::with_capacity(raw.len()),
        ranges: Vec::new(),
        col: 0,
        run_start: None,
    };
    if out.state.is_colorful() {
        out.run_start = Some(0);
    }

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\x1b' => i = out.escape(&chars, i),
            '\x0e' | '\x0f' => i += 1,
            '\x08' => i = out.overstrike(&chars, i),
            ch => {
                out.push(ch);
                i += 1;
            }
        }
    }

    out.close_run();
    Extracted {
        text: out.text,
        ranges: out.ranges,
        state: out.state,
    }
}

struct Extractor {
    state: AnsiState,
    text: String,
    ranges: Vec<AnsiOffset>,
    col: u32,
    run_start: Option<u32>,
}

impl Extractor {
    fn push(&mut self, ch: char) {
        self.text.push(ch);
        self.col += 1;
    }

    /// Close the open run, if any, emitting a range for the current state.
    fn close_run(&mut self) {
        if let Some(begin) = self.run_start.take()
            && self.col > begin
        {
            self.emit(AnsiOffset {
                begin,
                end: self.col,
                state: self.state.clone(),
            });
        }
    }

    fn emit(&mut self, range: AnsiOffset) {
        // Merge with the previous range when they touch and carry the same
        // state. Zero-width markers are kept as-is.
        if !range.is_full_bg()
            && let Some(last) = self.ranges.last_mut()
            && !last.is_full_bg()
            && last.end == range.begin
            && last.state == range.state
        {
            last.end = range.end;
            return;
        }
        self.ranges.push(range);
    }

    /// The state is about to change: close the active run and reopen one if
    /// the new state is still colourful.
    fn state_change<F: FnOnce(&mut AnsiState)>(&mut self, mutate: F) {
        self.close_run();
        mutate(&mut self.state);
        if self.state.is_colorful() {
            self.run_start = Some(self.col);
        }
    }

    /// Parse one escape sequence starting at `chars[i] == ESC`. Returns the
    /// index of the first unconsumed character. A malformed sequence
    /// consumes only the escape byte.
    fn escape(&mut self, chars: &[char], i: usize) -> usize {
        match chars.get(i + 1) {
            Some('[') => self.csi(chars, i),
            Some(']') => self.osc(chars, i),
            // Charset designators consume one more character
            Some('(') | Some(')') => (i + 3).min(chars.len()),
            // Any other two-character escape
            Some(_) => i + 2,
            // Lone ESC at end of input
            None => i + 1,
        }
    }

    fn csi(&mut self, chars: &[char], i: usize) -> usize {
        // Parameter bytes run up to the final byte in 0x40..=0x7e.
        let mut j = i + 2;
        while j < chars.len() {
            let ch = chars[j];
            if ('\x40'..='\x7e').contains(&ch) {
                let params: String = chars[i + 2..j].iter().collect();
                match ch {
                    'm' => {
                        let parsed = parse_sgr_params(&params);
                        self.state_change(|state| apply_sgr(state, &parsed));
                    }
                    'K' => {
                        // Erase-to-EOL with an active background paints the
                        // rest of the row; record a full-bg marker.
                        if self.state.bg != COLOR_DEFAULT {
                            self.close_run();
                            let marker = AnsiOffset {
                                begin: self.col,
                                end: self.col,
                                state: self.state.clone(),
                            };
                            self.emit(marker);
                            if self.state.is_colorful() {
                                self.run_start = Some(self.col);
                            }
                        }
                    }
                    // Cursor motion and friends: consumed, no state effect
                    _ => {}
                }
                return j + 1;
            }
            if !(ch.is_ascii_digit() || ch == ';' || ch == ':' || ch == '?' || ch == '>' || ch == '<' || ch == '=')
            {
                // Not a CSI parameter byte: malformed, drop the ESC only
                return i + 1;
            }
            j += 1;
        }
        // Ran off the end without a final byte
        i + 1
    }

    fn osc(&mut self, chars: &[char], i: usize) -> usize {
        // Terminated by BEL or ST (ESC \); unterminated is malformed.
        let mut j = i + 2;
        while j < chars.len() {
            match chars[j] {
                '\x07' => {
                    let body: String = chars[i + 2..j].iter().collect();
                    self.osc_body(&body);
                    return j + 1;
                }
                '\x1b' if chars.get(j + 1) == Some(&'\\') => {
                    let body: String = chars[i + 2..j].iter().collect();
                    self.osc_body(&body);
                    return j + 2;
                }
                _ => j += 1,
            }
        }
        i + 1
    }

    fn osc_body(&mut self, body: &str) {
        // OSC 8 ; params ; URI  - hyperlink open/close. Everything else
        // (including OSC 133 shell-integration marks) is consumed.
        let mut parts = body.splitn(3, ';');
        if parts.next() != Some("8") {
            return;
        }
        let _params = parts.next();
        let uri = parts.next().unwrap_or("");
        let url: Option<Arc<str>> = if uri.is_empty() { None } else { Some(uri.into()) };
        self.state_change(|state| state.url = url);
    }

    /// Backspace overstrike: `X\bX` renders bold X, `_\bX` (either order)
    /// renders underlined X, anything else keeps the latter character.
    fn overstrike(&mut self, chars: &[char], i: usize) -> usize {
        if self.text.is_empty() {
            // Nothing to strike over; drop the backspace.
            return i + 1;
        }
        let Some(&next) = chars.get(i + 1) else {
            return i + 1;
        };

        let prev = self.text.pop().unwrap_or(' ');
        self.col -= 1;
        if let Some(last) = self.ranges.last_mut()
            && last.end == self.col + 1
            && !last.is_full_bg()
        {
            last.end = self.col;
            if last.begin == last.end {
                self.ranges.pop();
            }
        }

        let (ch, extra) = if prev == next {
            (next, ATTR_BOLD)
        } else if prev == '_' {
            (next, ATTR_UNDERLINE)
        } else if next == '_' {
            (prev, ATTR_UNDERLINE)
        } else {
            (next, 0)
        };

        if extra == 0 {
            self.push(ch);
        } else {
            // One character with a synthetic attribute layered on the
            // current state.
            self.close_run();
            let begin = self.col;
            self.push(ch);
            let mut state = self.state.clone();
            state.attrs |= extra;
            self.emit(AnsiOffset {
                begin,
                end: self.col,
                state,
            });
            if self.state.is_colorful() {
                self.run_start = Some(self.col);
            }
        }
        i + 2
    }
}

fn parse_sgr_params(params: &str) -> Vec<SgrParam> {
    if params.is_empty() {
        return vec![SgrParam { value: 0, colon: false }];
    }
    let mut out = Vec::new();
    let mut value: i32 = 0;
    let mut colon = false;
    let mut has_digit = false;
    for ch in params.chars() {
        match ch {
            '0'..='9' => {
                value = value.saturating_mul(10) + (ch as i32 - '0' as i32);
                has_digit = true;
            }
            ';' | ':' => {
                out.push(SgrParam { value, colon });
                value = 0;
                has_digit = false;
                colon = ch == ':';
            }
            // Private-mode markers carry no SGR meaning
            _ => {}
        }
    }
    if has_digit || !out.is_empty() {
        out.push(SgrParam { value, colon });
    }
    out
}

fn apply_sgr(state: &mut AnsiState, params: &[SgrParam]) {
    let mut i = 0;
    while i < params.len() {
        let code = params[i].value;
        match code {
            0 => {
                // Full reset; the OSC 8 hyperlink is not SGR state.
                let url = state.url.take();
                *state = AnsiState { url, ..AnsiState::default() };
            }
            1 => state.attrs |= ATTR_BOLD,
            2 => state.attrs |= ATTR_DIM,
            3 => state.attrs |= ATTR_ITALIC,
            4 => {
                if let Some(sub) = params.get(i + 1).filter(|p| p.colon) {
                    state.attrs &= !ATTR_UNDERLINE_ANY;
                    state.attrs |= match sub.value {
                        0 => 0,
                        2 => ATTR_UNDERLINE_DOUBLE,
                        3 => ATTR_UNDERLINE_CURLY,
                        4 => ATTR_UNDERLINE_DOTTED,
                        5 => ATTR_UNDERLINE_DASHED,
                        _ => ATTR_UNDERLINE,
                    };
                    i += 1;
                } else {
                    state.attrs |= ATTR_UNDERLINE;
                }
            }
            5 | 6 => state.attrs |= ATTR_BLINK,
            7 => state.attrs |= ATTR_REVERSE,
            8 => state.attrs |= ATTR_CONCEAL,
            9 => state.attrs |= ATTR_STRIKE,
            21 => state.attrs |= ATTR_UNDERLINE_DOUBLE,
            22 => state.attrs &= !(ATTR_BOLD | ATTR_DIM),
            23 => state.attrs &= !ATTR_ITALIC,
            24 => state.attrs &= !ATTR_UNDERLINE_ANY,
            25 => state.attrs &= !ATTR_BLINK,
            27 => state.attrs &= !ATTR_REVERSE,
            28 => state.attrs &= !ATTR_CONCEAL,
            29 => state.attrs &= !ATTR_STRIKE,
            30..=37 => state.fg = code - 30,
            38 => state.fg = extended_color(params, &mut i).unwrap_or(state.fg),
            39 => state.fg = COLOR_DEFAULT,
            40..=47 => state.bg = code - 40,
            48 => state.bg = extended_color(params, &mut i).unwrap_or(state.bg),
            49 => state.bg = COLOR_DEFAULT,
            58 => {
                state.underline_color = extended_color(params, &mut i).unwrap_or(state.underline_color)
            }
            59 => state.underline_color = COLOR_DEFAULT,
            90..=97 => state.fg = code - 90 + 8,
            100..=107 => state.bg = code - 100 + 8,
            // Unknown SGR codes are consumed without effect
            _ => {}
        }
        i += 1;
    }
}

/// Parse the `5;n` / `2;r;g;b` tail of a 38/48/58 parameter, advancing `i`
/// past the consumed sub-parameters. Truncated forms have no effect.
fn extended_color(params: &[SgrParam], i: &mut usize) -> Option<i32> {
    match params.get(*i + 1).map(|p| p.value) {
        Some(5) => {
            let n = params.get(*i + 2)?.value;
            *i += 2;
            Some(n.clamp(0, 255))
        }
        Some(2) => {
            let r = params.get(*i + 2)?.value.clamp(0, 255);
            let g = params.get(*i + 3)?.value.clamp(0, 255);
            let b = params.get(*i + 4)?.value.clamp(0, 255);
            *i += 4;
            Some(TRUECOLOR_FLAG | (r << 16) | (g << 8) | b)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(raw: &str) -> Extracted {
        extract_color(raw, AnsiState::default())
    }

    #[test]
    fn test_plain_text_passthrough() {
        let out = extract("no escapes here");
        assert_eq!(out.text, "no escapes here");
        assert!(out.ranges.is_empty(), "plain text must produce no ranges");
        assert_eq!(out.state, AnsiState::default());
    }

    #[test]
    fn test_basic_sgr_range() {
        // Colour + attribute over a middle span
        let out = extract("hello \x1b[34;45;1mwor\x1b[0mld");
        assert_eq!(out.text, "hello world");
        assert_eq!(out.ranges.len(), 1, "one styled run expected");
        let range = &out.ranges[0];
        assert_eq!((range.begin, range.end), (6, 9));
        assert_eq!(range.state.fg, 4, "34 is blue");
        assert_eq!(range.state.bg, 5, "45 is magenta background");
        assert_eq!(range.state.attrs, ATTR_BOLD);
        assert_eq!(out.state, AnsiState::default(), "reset must clear the final state");
    }

    #[test]
    fn test_256_and_truecolor() {
        let out = extract("\x1b[38;5;196mx\x1b[48;2;1;2;3my\x1b[m");
        assert_eq!(out.text, "xy");
        assert_eq!(out.ranges.len(), 2);
        assert_eq!(out.ranges[0].state.fg, 196);
        let bg = out.ranges[1].state.bg;
        assert_ne!(bg & TRUECOLOR_FLAG, 0, "truecolor must carry the marker bit");
        assert_eq!(bg & 0xffffff, (1 << 16) | (2 << 8) | 3);
    }

    #[test]
    fn test_colon_subparameters() {
        // 38:5:n with colon separators, and 4:3 curly underline
        let out = extract("\x1b[38:5:99ma\x1b[0m\x1b[4:3mb\x1b[0m");
        assert_eq!(out.text, "ab");
        assert_eq!(out.ranges[0].state.fg, 99);
        assert_eq!(out.ranges[1].state.attrs, ATTR_UNDERLINE_CURLY);
    }

    #[test]
    fn test_semicolon_after_4_is_separate_code() {
        // `4;3` means underline + italic, unlike `4:3`
        let out = extract("\x1b[4;3mz\x1b[0m");
        assert_eq!(out.ranges[0].state.attrs, ATTR_UNDERLINE | ATTR_ITALIC);
    }

    #[test]
    fn test_attribute_clears() {
        let out = extract("\x1b[1;4ma\x1b[22mb\x1b[24mc");
        assert_eq!(out.text, "abc");
        assert_eq!(out.ranges.len(), 2, "unstyled tail must not be a range");
        assert_eq!(out.ranges[0].state.attrs, ATTR_BOLD | ATTR_UNDERLINE);
        assert_eq!(out.ranges[1].state.attrs, ATTR_UNDERLINE);
    }

    #[test]
    fn test_bright_colors() {
        let out = extract("\x1b[91;107mc\x1b[39;49m");
        assert_eq!(out.ranges[0].state.fg, 9);
        assert_eq!(out.ranges[0].state.bg, 15);
        assert_eq!(out.state, AnsiState::default(), "39/49 reset both colours");
    }

    #[test]
    fn test_adjacent_identical_runs_merge() {
        let out = extract("\x1b[31mab\x1b[31mcd\x1b[0m");
        assert_eq!(out.text, "abcd");
        assert_eq!(out.ranges.len(), 1, "identical adjacent runs must merge");
        assert_eq!((out.ranges[0].begin, out.ranges[0].end), (0, 4));
    }

    #[test]
    fn test_state_carries_across_records() {
        let first = extract("\x1b[32mgreen");
        assert_eq!(first.ranges.len(), 1);
        assert_eq!(first.state.fg, 2, "unclosed colour must survive the record");

        let second = extract_color("still green\x1b[0m", first.state);
        assert_eq!(second.text, "still green");
        assert_eq!(second.ranges.len(), 1);
        assert_eq!(
            (second.ranges[0].begin, second.ranges[0].end),
            (0, 11),
            "carried state opens a run at column zero"
        );
    }

    #[test]
    fn test_osc8_hyperlink() {
        let out = extract("\x1b]8;;https://example.com\x07link\x1b]8;;\x07 text");
        assert_eq!(out.text, "link text");
        assert_eq!(out.ranges.len(), 1);
        assert_eq!(
            out.ranges[0].state.url.as_deref(),
            Some("https://example.com"),
            "OSC 8 must open a hyperlink run"
        );
        assert_eq!((out.ranges[0].begin, out.ranges[0].end), (0, 4));
        assert!(out.state.url.is_none(), "empty URI closes the link");
    }

    #[test]
    fn test_osc_133_consumed() {
        let out = extract("\x1b]133;A\x07prompt");
        assert_eq!(out.text, "prompt");
        assert!(out.ranges.is_empty());
    }

    #[test]
    fn test_erase_line_full_bg_marker() {
        let out = extract("\x1b[44mtail\x1b[K");
        assert_eq!(out.text, "tail");
        let markers: Vec<_> = out.ranges.iter().filter(|r| r.is_full_bg()).collect();
        assert_eq!(markers.len(), 1, "EL with background must leave a marker");
        assert_eq!(markers[0].begin, 4);
        assert_eq!(markers[0].state.bg, 4);
    }

    #[test]
    fn test_erase_line_without_bg_is_silent() {
        let out = extract("a\x1b[Kb");
        assert_eq!(out.text, "ab");
        assert!(out.ranges.is_empty());
    }

    #[test]
    fn test_overstrike_bold_and_underline() {
        let bold = extract("a\x08a");
        assert_eq!(bold.text, "a");
        assert_eq!(bold.ranges.len(), 1);
        assert_eq!(bold.ranges[0].state.attrs, ATTR_BOLD);

        let underline = extract("_\x08x");
        assert_eq!(underline.text, "x");
        assert_eq!(underline.ranges[0].state.attrs, ATTR_UNDERLINE);

        let replace = extract("a\x08b");
        assert_eq!(replace.text, "b", "mismatched overstrike keeps the latter char");
        assert!(replace.ranges.is_empty());
    }

    #[test]
    fn test_malformed_escape_consumes_one_byte() {
        // ESC followed by a non-sequence byte, and a lone trailing ESC
        let out = extract("a\x1b[12<3mb\x1b");
        assert!(out.text.starts_with('a'), "scanning must continue after malformed CSI");
        let out = extract("ab\x1b");
        assert_eq!(out.text, "ab");
    }

    #[test]
    fn test_idempotence() {
        // Extracting an already-stripped string yields no ranges
        let noisy = "x \x1b[31;1mred\x1b[0m \x1b]8;;u\x07l\x1b]8;;\x07 \x1b[38;5;10mg\x1b[m";
        let once = extract(noisy);
        let twice = extract(&once.text);
        assert_eq!(once.text, twice.text, "extraction must be idempotent on text");
        assert!(twice.ranges.is_empty(), "no ranges on second extraction");
    }

    #[test]
    fn test_ranges_within_text_bounds() {
        let out = extract("\x1b[35mwide 文字 here\x1b[0m!");
        let len = out.text.chars().count() as u32;
        for range in &out.ranges {
            assert!(range.begin <= range.end, "ranges must be well-formed");
            assert!(range.end <= len, "ranges must lie within the text");
        }
    }

    #[test]
    fn test_sgr_reemission_roundtrip() {
        let mut state = AnsiState::default();
        state.fg = 1;
        state.bg = 12;
        state.attrs = ATTR_BOLD | ATTR_UNDERLINE;
        let sgr = state.to_sgr();
        let out = extract_color(&format!("{}x", sgr), AnsiState::default());
        assert_eq!(out.ranges.len(), 1);
        assert_eq!(out.ranges[0].state, state, "to_sgr output must parse back to itself");
    }

    #[test]
    fn test_empty_and_reset_only() {
        assert_eq!(extract("").text, "");
        let out = extract("\x1b[0m\x1b[m");
        assert_eq!(out.text, "");
        assert!(out.ranges.is_empty());
    }
}
