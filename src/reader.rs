//! # reader.rs - Producer ingestion
//!
//! The reader runs on its own thread, blocking on the producer stream. It
//! splits the byte stream into records on the configured separator
//! (newline or NUL), turns each record into an immutable item, and
//! appends it to the chunk store. Appends are batched towards the
//! coordinator: a `ReadNew` event is posted at most once per notification
//! interval, so a fast producer wakes the pipeline at a bounded rate
//! instead of per record.
//!
//! On EOF a final `ReadNew` flushes any unreported items, then `ReadFin`
//! is posted; a read error posts `ReadFin` with the error annotation and
//! the coordinator enters drain mode. The chunk store itself never blocks
//! an append.

use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, warn};
use regex::Regex;

use crate::ansi::{AnsiState, extract_color};
use crate::event::{EventBox, EventType, Value};
use crate::fields::{self, FieldRange};
use crate::item::{ChunkList, Item};

/// Minimum interval between `ReadNew` notifications.
const NOTIFY_INTERVAL: Duration = Duration::from_millis(10);

/// Reader configuration captured at startup.
#[derive(Debug, Default)]
pub struct ReaderOptions {
    /// Parse ANSI escapes into colour ranges (otherwise records pass
    /// through untouched)
    pub ansi: bool,
    /// Records are NUL-separated instead of newline-separated
    pub read0: bool,
    /// Divert the first N records to the `Header` event
    pub header_lines: usize,
    /// Field delimiter for `--nth` scoping
    pub delimiter: Option<Regex>,
    /// Match-scope field ranges; empty means the whole record
    pub nth: Vec<FieldRange>,
}

/// Spawn the reader thread over `source`.
pub fn start<R>(
    source: R,
    options: ReaderOptions,
    chunks: Arc<ChunkList>,
    events: Arc<EventBox>,
) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || run(source, options, &chunks, &events))
}

fn run<R: Read>(source: R, options: ReaderOptions, chunks: &ChunkList, events: &EventBox) {
    // A large input buffer keeps syscall overhead down on fast producers.
    let mut reader = BufReader::with_capacity(64 * 1024, source);
    let separator = if options.read0 { b'\0' } else { b'\n' };

    let mut buf: Vec<u8> = Vec::new();
    let mut ansi_state = AnsiState::default();
    let mut headers: Vec<String> = Vec::new();
    let mut headers_sent = options.header_lines == 0;
    let mut index: u32 = 0;
    let mut pending = false;
    // Backdated so the very first record notifies immediately.
    let mut last_notify = Instant::now() - NOTIFY_INTERVAL;

    loop {
        buf.clear();
        match reader.read_until(separator, &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                trim_record(&mut buf, separator, options.read0);
                let decoded = String::from_utf8_lossy(&buf).into_owned();

                if !headers_sent {
                    // Header records bypass the store; strip escapes so the
                    // display gets plain text.
                    let extracted = extract_color(&decoded, AnsiState::default());
                    headers.push(extracted.text);
                    if headers.len() == options.header_lines {
                        events.set(EventType::Header, Value::Header(std::mem::take(&mut headers)));
                        headers_sent = true;
                    }
                    continue;
                }

                let (text, colors) = if options.ansi {
                    let extracted = extract_color(&decoded, std::mem::take(&mut ansi_state));
                    ansi_state = extracted.state;
                    let colors = if extracted.ranges.is_empty() {
                        None
                    } else {
                        Some(extracted.ranges)
                    };
                    (extracted.text, colors)
                } else {
                    (decoded, None)
                };

                let matching = if options.nth.is_empty() {
                    None
                } else {
                    fields::matching_ranges(&text, options.delimiter.as_ref(), &options.nth)
                };

                chunks.push(Item::new(index, std::mem::take(&mut buf), text, colors, matching));
                index = index.wrapping_add(1);
                pending = true;

                if last_notify.elapsed() >= NOTIFY_INTERVAL {
                    events.set(EventType::ReadNew, Value::None);
                    pending = false;
                    last_notify = Instant::now();
                }
            }
            Err(err) => {
                warn!("producer read failed: {}", err);
                if pending {
                    events.set(EventType::ReadNew, Value::None);
                }
                events.set(EventType::ReadFin, Value::Error(err.to_string()));
                return;
            }
        }
    }

    if !headers_sent && !headers.is_empty() {
        events.set(EventType::Header, Value::Header(headers));
    }
    if pending {
        events.set(EventType::ReadNew, Value::None);
    }
    debug!("reader finished after {} records", index);
    events.set(EventType::ReadFin, Value::None);
}

/// Drop the trailing separator (and a carriage return in newline mode).
fn trim_record(buf: &mut Vec<u8>, separator: u8, read0: bool) {
    if buf.last() == Some(&separator) {
        buf.pop();
        if !read0 && buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
}
