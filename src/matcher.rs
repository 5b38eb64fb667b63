//! # matcher.rs - Per-chunk parallel matching
//!
//! A scan ranks every chunk of a snapshot against one pattern. Chunks are
//! handed out to a pool of worker threads through a shared work counter;
//! each worker claims one chunk at a time, scores it into a local result
//! list, and never shares mutable state with its peers. The calling
//! thread doubles as a worker and, between its own chunks, emits progress
//! events and checks whether the search has been superseded.
//!
//! Cancellation is cooperative: the stop flag is polled at the top of
//! every chunk (and inside the scorer's DP loop for long texts), so after
//! the flag is set the remaining work is bounded by one chunk per worker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::cache::CacheEntry;
use crate::error::SiftError;
use crate::event::{EventBox, EventType, Value};
use crate::flag::Flag;
use crate::item::{Chunk, Snapshot};
use crate::pattern::Pattern;
use crate::result::{Criterion, MatchResult, compare_ranks};

/// Minimum interval between `SearchProgress` events.
pub const PROGRESS_MIN_DURATION: Duration = Duration::from_millis(200);

/// Scores chunk snapshots against patterns with a fixed worker pool size
/// and sort configuration, both captured at startup.
pub struct Matcher {
    parallelism: usize,
    criteria: Vec<Criterion>,
    tac: bool,
}

impl Matcher {
    /// `parallelism` of zero selects the hardware parallelism.
    pub fn new(parallelism: usize, criteria: Vec<Criterion>, tac: bool) -> Self {
        let parallelism = if parallelism == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        } else {
            parallelism
        };
        Matcher { parallelism, criteria, tac }
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn tac(&self) -> bool {
        self.tac
    }

    /// Rank all chunks of `snapshot` against `pattern`.
    ///
    /// Returns one sorted result list per chunk, index-aligned with the
    /// snapshot. `seed` restricts scoring of covered chunks to a cached
    /// candidate set (the extension rule). `cancel` is consulted between
    /// chunks on the calling thread; when it reports true the stop flag is
    /// raised and the scan ends with `SiftError::Cancelled`.
    pub fn scan(
        &self,
        pattern: &Pattern,
        snapshot: &Snapshot,
        seed: Option<&CacheEntry>,
        stop: &Flag,
        cancel: impl Fn() -> bool,
        notify: &EventBox,
    ) -> Result<Vec<Vec<MatchResult>>, SiftError> {
        let total = snapshot.chunks.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let counter = AtomicUsize::new(0);
        let done = AtomicUsize::new(0);
        let workers = self.parallelism.clamp(1, total);
        debug!(
            "scan: {} chunks, {} workers, pattern '{}'",
            total,
            workers,
            pattern.fingerprint()
        );

        let mut outputs: Vec<Vec<(usize, Vec<MatchResult>)>> = Vec::new();
        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers - 1);
            for _ in 1..workers {
                handles.push(scope.spawn(|| {
                    self.worker_loop(pattern, snapshot, seed, stop, &counter, &done, &mut |_| {})
                }));
            }

            // The scan thread is a worker too; between its chunks it
            // forwards progress and watches for supersession.
            let mut last_progress = Instant::now();
            let local = self.worker_loop(pattern, snapshot, seed, stop, &counter, &done, &mut |done_now| {
                if cancel() {
                    trace!("scan superseded, raising stop flag");
                    stop.set(true);
                    return;
                }
                if last_progress.elapsed() >= PROGRESS_MIN_DURATION {
                    let percent = (done_now * 100 / total) as u8;
                    notify.set(EventType::SearchProgress, Value::Progress(percent));
                    last_progress = Instant::now();
                }
            });

            outputs.push(local);
            for handle in handles {
                match handle.join() {
                    Ok(list) => outputs.push(list),
                    Err(_) => stop.set(true),
                }
            }
        });

        if stop.get() {
            return Err(SiftError::Cancelled);
        }

        let mut lists: Vec<Vec<MatchResult>> = (0..total).map(|_| Vec::new()).collect();
        for (idx, results) in outputs.into_iter().flatten() {
            lists[idx] = results;
        }
        Ok(lists)
    }

    /// Claim and score chunks until the counter runs out or the stop flag
    /// is raised. `tick` runs between chunks with the current done count.
    fn worker_loop(
        &self,
        pattern: &Pattern,
        snapshot: &Snapshot,
        seed: Option<&CacheEntry>,
        stop: &Flag,
        counter: &AtomicUsize,
        done: &AtomicUsize,
        tick: &mut dyn FnMut(usize),
    ) -> Vec<(usize, Vec<MatchResult>)> {
        let mut scratch: Vec<char> = Vec::new();
        let mut local = Vec::new();
        loop {
            if stop.get() {
                break;
            }
            let idx = counter.fetch_add(1, Ordering::Relaxed);
            if idx >= snapshot.chunks.len() {
                break;
            }

            let seed_list: Option<&[MatchResult]> = seed.and_then(|entry| {
                if idx < entry.sealed_chunks {
                    entry.lists.get(idx).and_then(|slot| slot.as_ref().map(|list| list.as_slice()))
                } else {
                    None
                }
            });
            let results =
                self.score_chunk(pattern, &snapshot.chunks[idx], seed_list, stop, &mut scratch);
            local.push((idx, results));

            let done_now = done.fetch_add(1, Ordering::AcqRel) + 1;
            tick(done_now);
        }
        local
    }

    /// Score one chunk, either in full or restricted to a cached candidate
    /// set, and sort the survivors by the configured criteria.
    fn score_chunk(
        &self,
        pattern: &Pattern,
        chunk: &std::sync::Arc<Chunk>,
        seed: Option<&[MatchResult]>,
        stop: &Flag,
        scratch: &mut Vec<char>,
    ) -> Vec<MatchResult> {
        let mut results = Vec::new();
        match seed {
            Some(candidates) => {
                for candidate in candidates {
                    let slot = candidate.slot();
                    let Some(item) = chunk.get(slot as usize) else {
                        continue;
                    };
                    if let Some((score, offsets)) = pattern.match_item(item, scratch, Some(stop)) {
                        results.push(MatchResult::new(
                            std::sync::Arc::clone(chunk),
                            slot,
                            &self.criteria,
                            score,
                            offsets,
                        ));
                    }
                }
            }
            None => {
                for (slot, item) in chunk.items().iter().enumerate() {
                    if let Some((score, offsets)) = pattern.match_item(item, scratch, Some(stop)) {
                        results.push(MatchResult::new(
                            std::sync::Arc::clone(chunk),
                            slot as u32,
                            &self.criteria,
                            score,
                            offsets,
                        ));
                    }
                }
            }
        }
        results.sort_by(|a, b| compare_ranks(a, b, self.tac));
        results
    }
}
