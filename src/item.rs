//! # item.rs - Items, chunks and the chunk store
//!
//! The chunk store owns every candidate in the system. Items are immutable
//! after creation; they are grouped into fixed-capacity chunks, and sealed
//! chunks are shared between threads as `Arc<Chunk>` and never touched
//! again. The single writer is the reader thread; matcher workers only
//! ever observe immutable snapshots.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use unicode_width::UnicodeWidthChar;

use crate::ansi::AnsiOffset;

/// Number of items per chunk. Appending the 101st item seals the current
/// chunk and opens a new one.
pub const CHUNK_SIZE: usize = 100;

/// A half-open `[begin, end)` range in logical characters.
///
/// Offsets order by `begin`, then `end`, which is the order match offsets
/// and nth ranges are kept in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Offset {
    pub begin: u32,
    pub end: u32,
}

impl Offset {
    pub fn new(begin: u32, end: u32) -> Self {
        Offset { begin, end }
    }

    pub fn len(&self) -> u32 {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }
}

/// One input record, immutable after creation.
///
/// `orig` holds the raw producer bytes exactly as delivered (these are what
/// selection emits); `text` holds the decoded, ANSI-stripped characters the
/// matcher scores. Colour ranges and nth match-scope ranges are expressed
/// in characters of `text`.
#[derive(Debug, Clone)]
pub struct Item {
    index: u32,
    /// Raw bytes, or `None` when they equal `text`'s bytes
    orig: Option<Box<[u8]>>,
    text: Box<str>,
    char_len: u32,
    colors: Option<Box<[AnsiOffset]>>,
    /// Match-scope ranges from `--nth`, whole text when absent
    matching: Option<Box<[Offset]>>,
    /// Trimmed length (trailing whitespace excluded), computed on demand
    trimmed: OnceLock<u32>,
}

impl Item {
    pub fn new(
        index: u32,
        orig: Vec<u8>,
        text: String,
        colors: Option<Vec<AnsiOffset>>,
        matching: Option<Vec<Offset>>,
    ) -> Self {
        let char_len = text.chars().count() as u32;
        debug_assert!(
            colors
                .as_deref()
                .unwrap_or_default()
                .iter()
                .all(|c| c.begin <= c.end && c.end <= char_len),
            "colour ranges must lie within the text"
        );
        let orig = if orig.as_slice() == text.as_bytes() {
            None
        } else {
            Some(orig.into_boxed_slice())
        };
        Item {
            index,
            orig,
            text: text.into_boxed_str(),
            char_len,
            colors: colors.map(Vec::into_boxed_slice),
            matching: matching.map(Vec::into_boxed_slice),
            trimmed: OnceLock::new(),
        }
    }

    /// Ingestion-order ordinal assigned by the reader.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The matchable text (decoded, ANSI-stripped).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The raw bytes as delivered by the producer; what selection emits.
    pub fn orig_bytes(&self) -> &[u8] {
        self.orig.as_deref().unwrap_or_else(|| self.text.as_bytes())
    }

    /// Length of `text` in logical characters.
    pub fn char_len(&self) -> u32 {
        self.char_len
    }

    /// Length with trailing whitespace excluded; cached after first use.
    pub fn trimmed_len(&self) -> u32 {
        *self.trimmed.get_or_init(|| {
            let trailing = self.text.chars().rev().take_while(|c| c.is_whitespace()).count();
            self.char_len - trailing as u32
        })
    }

    /// Display width in terminal columns (wide characters count two).
    pub fn display_width(&self) -> u32 {
        self.text
            .chars()
            .map(|c| c.width().unwrap_or(0) as u32)
            .sum()
    }

    /// Source-side colour ranges, if the reader parsed ANSI.
    pub fn colors(&self) -> &[AnsiOffset] {
        self.colors.as_deref().unwrap_or_default()
    }

    /// Ranges the matcher is restricted to, or `None` for the whole text.
    pub fn matching_ranges(&self) -> Option<&[Offset]> {
        self.matching.as_deref()
    }
}

/// A sealed, immutable group of up to [`CHUNK_SIZE`] items.
#[derive(Debug)]
pub struct Chunk {
    items: Vec<Item>,
}

impl Chunk {
    fn new(items: Vec<Item>) -> Self {
        debug_assert!(items.len() <= CHUNK_SIZE);
        Chunk { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&Item> {
        self.items.get(slot)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }
}

/// An immutable view of the store at one moment: every sealed chunk plus a
/// frozen copy of the partial tail. Matcher workers only ever see these.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub chunks: Vec<Arc<Chunk>>,
    /// Total items across `chunks`
    pub item_count: usize,
    /// How many of `chunks` were sealed (the trailing one may be a frozen
    /// partial tail, which a later snapshot will supersede)
    pub sealed_count: usize,
}

/// Append-only store of all items. Appends are serialized through the
/// reader thread; any number of threads may snapshot concurrently.
#[derive(Default)]
pub struct ChunkList {
    // Lock order: tail before sealed, on both the append and snapshot paths.
    tail: Mutex<Vec<Item>>,
    sealed: RwLock<Vec<Arc<Chunk>>>,
    count: AtomicUsize,
}

impl ChunkList {
    pub fn new() -> Self {
        ChunkList::default()
    }

    /// Total number of items appended so far.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one item, sealing the tail chunk when it reaches capacity.
    /// Called only from the reader thread.
    pub fn push(&self, item: Item) {
        let Ok(mut tail) = self.tail.lock() else {
            return;
        };
        tail.push(item);
        if tail.len() == CHUNK_SIZE {
            let full = std::mem::take(&mut *tail);
            if let Ok(mut sealed) = self.sealed.write() {
                sealed.push(Arc::new(Chunk::new(full)));
            }
        }
        self.count.fetch_add(1, Ordering::Release);
    }

    /// Freeze the current contents. Sealed chunks are shared; the partial
    /// tail, if any, is copied into a chunk of its own.
    pub fn snapshot(&self) -> Snapshot {
        let Ok(tail) = self.tail.lock() else {
            return Snapshot { chunks: Vec::new(), item_count: 0, sealed_count: 0 };
        };
        let mut chunks = match self.sealed.read() {
            Ok(sealed) => sealed.clone(),
            Err(_) => Vec::new(),
        };
        let sealed_count = chunks.len();
        if !tail.is_empty() {
            chunks.push(Arc::new(Chunk::new(tail.clone())));
        }
        let item_count = sealed_count * CHUNK_SIZE + tail.len();
        Snapshot { chunks, item_count, sealed_count }
    }
}
