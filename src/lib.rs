//! # lib.rs - Core library for sift
//!
//! sift is a streaming terminal fuzzy finder core: it ingests a record
//! stream from a producer, ranks the records against a query by fuzzy
//! similarity, and serves a stable sorted view of the results while both
//! the data and the query keep changing.
//!
//! ## Architecture
//!
//! The pipeline is reader -> coordinator -> matcher workers, stitched
//! together by a coalescing event box:
//!
//! - `item`: the chunked append-only store that owns every record
//! - `reader`: producer ingestion on a background thread
//! - `ansi`: SGR extraction so styled producers stay styled
//! - `pattern` / `score`: query terms and the fuzzy scorer
//! - `matcher`: per-chunk parallel ranking with cooperative cancellation
//! - `merger`: lazy k-way sorted view over per-chunk results
//! - `cache`: fingerprint-keyed memoization of result lists
//! - `coordinator`: the event loop gluing it all together
//! - `result`: rank points and display colour composition
//!
//! [`Session`] wires the threads up and is the embedding surface: feed it
//! a source, change the query with [`Session::set_query`], observe
//! completed searches on the notify box, and read ranked results from the
//! installed [`merger::Merger`].

pub mod ansi;
pub mod args;
pub mod buffer;
pub mod cache;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod fields;
pub mod flag;
pub mod item;
pub mod matcher;
pub mod merger;
pub mod pattern;
pub mod reader;
pub mod result;
pub mod score;

pub use error::SiftError;

use std::io::Read;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use regex::Regex;

use crate::coordinator::{Coordinator, MergerSlot};
use crate::event::{EventBox, EventType, Value};
use crate::fields::FieldRange;
use crate::item::ChunkList;
use crate::matcher::Matcher;
use crate::merger::Merger;
use crate::pattern::{CaseMatching, Pattern, PatternOptions};
use crate::reader::ReaderOptions;
use crate::result::Criterion;

/// Exit status on successful selection.
pub const EXIT_OK: i32 = 0;
/// Exit status when nothing matched.
pub const EXIT_NO_MATCH: i32 = 1;
/// Exit status on usage or runtime errors.
pub const EXIT_ERROR: i32 = 2;
/// Status the process reports when interrupted (128 + SIGINT).
pub const EXIT_INTERRUPT: i32 = 130;

/// Control whether colored output should be enabled for this run.
///
/// - **On**: always emit colours
/// - **Off**: plain output
/// - **Auto**: colours only when the output stream is a terminal
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ColorMode {
    On,
    Off,
    #[default]
    Auto,
}

impl FromStr for ColorMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(ColorMode::On),
            "off" => Ok(ColorMode::Off),
            "auto" => Ok(ColorMode::Auto),
            _ => Err(()),
        }
    }
}

/// Runtime configuration, captured once at startup and passed down
/// explicitly (there is no mutable global configuration).
#[derive(Debug)]
pub struct Options {
    /// Query to run in filter mode
    pub query: String,
    /// Whole query is one regex term
    pub regex: bool,
    /// Flip the default term kind to exact
    pub exact: bool,
    /// Reverse the index tiebreak (last-in-first-out)
    pub tac: bool,
    /// Serve results in ingestion order instead of ranking them
    pub no_sort: bool,
    pub case: CaseMatching,
    /// Sort criteria; the first is always the score
    pub tiebreak: Vec<Criterion>,
    /// Match-scope field ranges (empty = whole record)
    pub nth: Vec<FieldRange>,
    /// Field delimiter regex source for `--nth`
    pub delimiter: Option<String>,
    /// Parse ANSI escapes in the input
    pub ansi: bool,
    /// NUL-separated input records
    pub read0: bool,
    /// NUL-separated output records
    pub print0: bool,
    /// Divert the first N records to the Header event
    pub header_lines: usize,
    pub color: ColorMode,
    /// Matcher worker count; zero selects the hardware parallelism
    pub threads: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            query: String::new(),
            regex: false,
            exact: false,
            tac: false,
            no_sort: false,
            case: CaseMatching::Smart,
            tiebreak: vec![Criterion::Score],
            nth: Vec::new(),
            delimiter: None,
            ansi: false,
            read0: false,
            print0: false,
            header_lines: 0,
            color: ColorMode::Auto,
            threads: 0,
        }
    }
}

/// A running pipeline: reader and coordinator threads over one producer.
///
/// The input-side event box accepts query changes; the notify box carries
/// `SearchProgress`, `SearchFin`, `Header` and lifecycle events towards
/// the display; the merger slot always holds the latest installed view.
pub struct Session {
    events: Arc<EventBox>,
    notify: Arc<EventBox>,
    chunks: Arc<ChunkList>,
    merger: MergerSlot,
    pattern_options: PatternOptions,
    coordinator: Option<JoinHandle<()>>,
    // The reader may be blocked on producer I/O at close time; it is
    // detached rather than joined.
    _reader: JoinHandle<()>,
}

impl Session {
    /// Spawn the pipeline over `source` and, when the options carry an
    /// initial query, kick off the first search.
    pub fn start<R>(options: &Options, source: R) -> Result<Session, SiftError>
    where
        R: Read + Send + 'static,
    {
        let delimiter = match options.delimiter.as_deref() {
            Some(src) => Some(Regex::new(src)?),
            None => None,
        };
        let pattern_options = PatternOptions {
            regex: options.regex,
            exact: options.exact,
            case: options.case,
        };
        // The startup query is parsed before any thread runs, so even the
        // very first search uses it (a fast producer can otherwise drain
        // completely before a queued query event is seen).
        let initial = Arc::new(Pattern::parse(&options.query, &pattern_options)?);

        let chunks = Arc::new(ChunkList::new());
        let events = Arc::new(EventBox::new());
        let notify = Arc::new(EventBox::new());
        let merger: MergerSlot = Arc::new(Mutex::new(Arc::new(Merger::none())));

        let reader = reader::start(
            source,
            ReaderOptions {
                ansi: options.ansi,
                read0: options.read0,
                header_lines: options.header_lines,
                delimiter,
                nth: options.nth.clone(),
            },
            Arc::clone(&chunks),
            Arc::clone(&events),
        );

        let coordinator = coordinator::start(Coordinator {
            chunks: Arc::clone(&chunks),
            events: Arc::clone(&events),
            notify: Arc::clone(&notify),
            merger: Arc::clone(&merger),
            matcher: Matcher::new(options.threads, options.tiebreak.clone(), options.tac),
            no_sort: options.no_sort,
            pattern: initial,
        });

        Ok(Session {
            events,
            notify,
            chunks,
            merger,
            pattern_options,
            coordinator: Some(coordinator),
            _reader: reader,
        })
    }

    /// Replace the query. A running search is superseded; an ill-formed
    /// regex skips the search and publishes an empty merger (user
    /// policy: user input never brings the pipeline down).
    pub fn set_query(&self, query: &str) -> Result<(), SiftError> {
        match Pattern::parse(query, &self.pattern_options) {
            Ok(pattern) => {
                self.events
                    .set(EventType::SearchNew, Value::Pattern(Arc::new(pattern)));
                Ok(())
            }
            Err(err) => {
                let empty = Arc::new(Merger::none());
                if let Ok(mut slot) = self.merger.lock() {
                    *slot = Arc::clone(&empty);
                }
                self.notify.set(EventType::SearchFin, Value::Merger(empty));
                Err(err)
            }
        }
    }

    /// Display-side event box (`SearchProgress`, `SearchFin`, `ReadFin`,
    /// `Header`, `Close`).
    pub fn notify_box(&self) -> &Arc<EventBox> {
        &self.notify
    }

    /// The latest installed merger.
    pub fn merger(&self) -> Arc<Merger> {
        self.merger
            .lock()
            .map(|slot| Arc::clone(&slot))
            .unwrap_or_else(|_| Arc::new(Merger::none()))
    }

    /// Items ingested so far.
    pub fn item_count(&self) -> usize {
        self.chunks.len()
    }

    /// Shut the pipeline down and wait for the coordinator to exit.
    pub fn close(mut self) {
        self.events.set(EventType::Close, Value::None);
        if let Some(handle) = self.coordinator.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn wait_for<F: Fn(&Session) -> bool>(session: &Session, pred: F) {
        // Bounded spin; notify-driven tests live in the integration suite
        for _ in 0..500 {
            if pred(session) {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        panic!("condition not reached within the deadline");
    }

    #[test]
    fn test_session_filter_roundtrip() {
        let options = Options { query: "ba".to_string(), ..Options::default() };
        let session =
            Session::start(&options, Cursor::new(b"foo\nbar\nbaz\n".to_vec())).unwrap();

        wait_for(&session, |s| s.item_count() == 3 && s.merger().len() == 2);
        let merger = session.merger();
        assert_eq!(merger.get(0).item().text(), "bar");
        assert_eq!(merger.get(1).item().text(), "baz");
        session.close();
    }

    #[test]
    fn test_session_rejects_bad_regex() {
        let options = Options { regex: true, ..Options::default() };
        let session = Session::start(&options, Cursor::new(b"x\n".to_vec())).unwrap();
        let err = session.set_query("(oops").expect_err("bad regex must be rejected");
        assert!(matches!(err, SiftError::RegexCompile(_)));
        assert_eq!(session.merger().len(), 0, "skipped search publishes an empty merger");
        session.close();
    }

    #[test]
    fn test_session_bad_delimiter_fails_startup() {
        let options = Options { delimiter: Some("(".to_string()), ..Options::default() };
        let outcome = Session::start(&options, Cursor::new(Vec::new()));
        assert!(matches!(outcome, Err(SiftError::RegexCompile(_))));
    }

    #[test]
    fn test_color_mode_from_str() {
        assert_eq!(ColorMode::from_str("on"), Ok(ColorMode::On));
        assert_eq!(ColorMode::from_str("off"), Ok(ColorMode::Off));
        assert_eq!(ColorMode::from_str("auto"), Ok(ColorMode::Auto));
        assert!(ColorMode::from_str("sometimes").is_err());
    }
}
