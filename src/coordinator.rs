//! # coordinator.rs - Pipeline orchestration
//!
//! One long-lived thread drives the pipeline off the event box: reader
//! notifications trigger (re)searches, query changes supersede running
//! searches, finished searches install their merger and are announced on
//! the display-side box.
//!
//! Two policies shape its behaviour:
//!
//! - **Debounce**: after a `ReadNew` or `SearchNew`, the coordinator naps
//!   in short steps while further events keep arriving (bounded by a
//!   maximum), absorbing bursts without starving interactive typing.
//! - **Dirty follow-up**: events that arrive while a search runs stay in
//!   the box; the next `wait` picks them up and triggers the follow-up
//!   search. A search superseded mid-flight ends `Cancelled` and its
//!   results are discarded.
//!
//! The pattern cache lives here and is touched by no other thread;
//! matcher workers receive entries as immutable snapshots.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, trace};

use crate::cache::{CacheEntry, MERGER_CACHE_MAX, PatternCache, QUERY_CACHE_MIN};
use crate::error::SiftError;
use crate::event::{EventBox, EventType, Value};
use crate::flag::Flag;
use crate::item::ChunkList;
use crate::matcher::Matcher;
use crate::merger::Merger;
use crate::pattern::Pattern;

/// Debounce nap increment.
pub const COORDINATOR_DELAY_STEP: Duration = Duration::from_millis(10);
/// Upper bound on one debounce nap.
pub const COORDINATOR_DELAY_MAX: Duration = Duration::from_millis(100);

/// Shared slot holding the latest installed merger.
pub type MergerSlot = Arc<Mutex<Arc<Merger>>>;

/// Everything the coordinator thread needs, captured at startup.
pub struct Coordinator {
    pub chunks: Arc<ChunkList>,
    /// Input side: reader notifications and query changes
    pub events: Arc<EventBox>,
    /// Display side: progress, finished searches, forwarded lifecycle
    pub notify: Arc<EventBox>,
    pub merger: MergerSlot,
    pub matcher: Matcher,
    /// Serve results in chunk order instead of ranking them
    pub no_sort: bool,
    /// Pattern in effect before the first `SearchNew`; set up front so the
    /// first reader notification already searches the startup query
    pub pattern: Arc<Pattern>,
}

/// Spawn the coordinator thread.
pub fn start(coordinator: Coordinator) -> JoinHandle<()> {
    thread::spawn(move || coordinator.run())
}

impl Coordinator {
    fn run(self) {
        let mut pattern = Arc::clone(&self.pattern);
        let mut cache = PatternCache::new();

        loop {
            let mut need_search = false;
            let mut new_pattern: Option<Arc<Pattern>> = None;
            let mut closing = false;

            self.events.wait(|events| {
                for (event, value) in events.drain() {
                    match event {
                        EventType::ReadNew => need_search = true,
                        EventType::SearchNew => {
                            if let Value::Pattern(p) = value {
                                new_pattern = Some(p);
                            }
                        }
                        EventType::ReadFin => {
                            // Forward as-is; an error annotation puts the
                            // display into drain mode too.
                            self.notify.set(EventType::ReadFin, value);
                        }
                        EventType::Header => self.notify.set(EventType::Header, value),
                        EventType::Close => closing = true,
                        // Not produced on the input side
                        EventType::SearchProgress | EventType::SearchFin => {}
                    }
                }
            });

            if closing {
                info!("coordinator closing");
                self.notify.set(EventType::Close, Value::None);
                return;
            }

            if new_pattern.is_none() && !need_search {
                continue;
            }

            if self.debounce() {
                // A close request arrived mid-nap
                self.notify.set(EventType::Close, Value::None);
                return;
            }

            // Pick up anything that arrived during the nap so the search
            // runs against the latest query and data.
            if let Some(Value::Pattern(p)) = self.events.take(EventType::SearchNew) {
                new_pattern = Some(p);
            }
            let _ = self.events.take(EventType::ReadNew);
            if let Some(p) = new_pattern {
                pattern = p;
            }

            self.search(&pattern, &mut cache);
        }
    }

    /// Nap while burst events keep arriving. Returns true on a pending
    /// close request.
    fn debounce(&self) -> bool {
        let deadline = Instant::now() + COORDINATOR_DELAY_MAX;
        loop {
            thread::sleep(COORDINATOR_DELAY_STEP);
            if self.events.peek(EventType::Close) {
                return true;
            }
            let burst = self.events.peek(EventType::ReadNew)
                || self.events.peek(EventType::SearchNew);
            if !burst || Instant::now() >= deadline {
                return false;
            }
            // Consume the read marker so only genuinely new arrivals extend
            // the nap; SearchNew stays put, it carries the newest pattern.
            let _ = self.events.take(EventType::ReadNew);
        }
    }

    /// Run one search to completion (or supersession) and install the
    /// resulting merger.
    fn search(&self, pattern: &Arc<Pattern>, cache: &mut PatternCache) {
        let snapshot = self.chunks.snapshot();

        if pattern.is_empty() {
            let merger = Arc::new(Merger::pass_through(
                snapshot.chunks,
                self.matcher.criteria().to_vec(),
                self.matcher.tac(),
            ));
            self.install(merger);
            return;
        }

        let fingerprint = pattern.fingerprint().to_string();
        let seed: Option<CacheEntry> = if pattern.cacheable() {
            cache
                .get_exact(&fingerprint)
                .or_else(|| cache.get_extension(&fingerprint))
        } else {
            None
        };
        if seed.is_some() {
            trace!("search '{}' seeded from cache", fingerprint);
        }

        let stop = Flag::new(false);
        let cancel =
            || self.events.peek(EventType::SearchNew) || self.events.peek(EventType::Close);
        let started = Instant::now();
        match self
            .matcher
            .scan(pattern, &snapshot, seed.as_ref(), &stop, cancel, &self.notify)
        {
            Ok(lists) => {
                debug!(
                    "search '{}' finished over {} items in {:?}",
                    fingerprint,
                    snapshot.item_count,
                    started.elapsed()
                );
                self.store_in_cache(cache, pattern, fingerprint, snapshot.sealed_count, &lists, snapshot.item_count);
                let merger = Arc::new(if self.no_sort {
                    Merger::unsorted(lists, self.matcher.tac(), snapshot.item_count)
                } else {
                    Merger::sorted(lists, self.matcher.tac(), snapshot.item_count)
                });
                self.install(merger);
            }
            Err(SiftError::Cancelled) => {
                trace!("search '{}' superseded, results discarded", fingerprint);
            }
            Err(err) => {
                debug!("search '{}' failed: {}", fingerprint, err);
            }
        }
    }

    fn store_in_cache(
        &self,
        cache: &mut PatternCache,
        pattern: &Pattern,
        fingerprint: String,
        sealed_count: usize,
        lists: &[Vec<crate::result::MatchResult>],
        item_count: usize,
    ) {
        if !pattern.cacheable() {
            return;
        }
        let total: usize = lists.iter().map(Vec::len).sum();
        if total > MERGER_CACHE_MAX {
            return;
        }
        let sealed = sealed_count.min(lists.len());
        let cached: Vec<Option<Arc<Vec<crate::result::MatchResult>>>> = lists[..sealed]
            .iter()
            .map(|list| (list.len() >= QUERY_CACHE_MIN).then(|| Arc::new(list.clone())))
            .collect();
        if cached.iter().any(Option::is_some) {
            cache.store(
                fingerprint,
                CacheEntry { sealed_chunks: sealed, item_count, lists: Arc::new(cached) },
            );
        }
    }

    /// Publish a finished merger: replace the shared slot and announce it.
    fn install(&self, merger: Arc<Merger>) {
        if let Ok(mut slot) = self.merger.lock() {
            *slot = Arc::clone(&merger);
        }
        self.notify.set(EventType::SearchFin, Value::Merger(merger));
    }
}
