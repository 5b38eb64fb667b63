//! # merger.rs - Lazy k-way merged view of per-chunk results
//!
//! A search produces one sorted result list per chunk. The merger exposes
//! them as a single ranked sequence without merging eagerly: `get(i)`
//! advances per-list cursors just far enough to buffer the i-th best
//! result, and already-merged prefixes are never recomputed. Two `get`
//! calls with the same index on the same merger always return the same
//! result.
//!
//! Unsorted mergers (empty pattern, `--no-sort`) skip the merge and index
//! the concatenated lists in chunk order, last-in-first-out under `tac`.

use std::sync::{Arc, Mutex};

use crate::item::Chunk;
use crate::result::{Criterion, MatchResult, compare_ranks};

#[derive(Debug)]
enum Inner {
    /// Per-chunk sorted lists, merged on demand
    Sorted { lists: Vec<Vec<MatchResult>>, state: Mutex<MergeState> },
    /// Concatenated lists in chunk order, no merge
    Unsorted { lists: Vec<Vec<MatchResult>> },
    /// Every item of the snapshot, score zero: the empty-pattern view
    Pass { chunks: Vec<Arc<Chunk>>, criteria: Vec<Criterion> },
}

#[derive(Debug, Default)]
struct MergeState {
    merged: Vec<MatchResult>,
    cursors: Vec<usize>,
}

/// A stable, on-demand sorted view over the results of one search.
#[derive(Debug)]
pub struct Merger {
    inner: Inner,
    tac: bool,
    count: usize,
    snapshot_len: usize,
}

impl Merger {
    /// Sorted view over per-chunk result lists (each already ordered by
    /// `compare_ranks`). Empty lists are dropped.
    pub fn sorted(lists: Vec<Vec<MatchResult>>, tac: bool, snapshot_len: usize) -> Self {
        let lists: Vec<Vec<MatchResult>> = lists.into_iter().filter(|l| !l.is_empty()).collect();
        let count = lists.iter().map(Vec::len).sum();
        let cursors = vec![0; lists.len()];
        Merger {
            inner: Inner::Sorted {
                lists,
                state: Mutex::new(MergeState { merged: Vec::new(), cursors }),
            },
            tac,
            count,
            snapshot_len,
        }
    }

    /// Chunk-ordered view with no ranking (`--no-sort`).
    pub fn unsorted(lists: Vec<Vec<MatchResult>>, tac: bool, snapshot_len: usize) -> Self {
        let lists: Vec<Vec<MatchResult>> = lists.into_iter().filter(|l| !l.is_empty()).collect();
        let count = lists.iter().map(Vec::len).sum();
        Merger { inner: Inner::Unsorted { lists }, tac, count, snapshot_len }
    }

    /// The empty-pattern view: every item is a result with score zero and
    /// no offsets, in ingestion order.
    pub fn pass_through(chunks: Vec<Arc<Chunk>>, criteria: Vec<Criterion>, tac: bool) -> Self {
        let count = chunks.iter().map(|c| c.len()).sum();
        Merger {
            inner: Inner::Pass { chunks, criteria },
            tac,
            count,
            snapshot_len: count,
        }
    }

    /// A view with no results (skipped search).
    pub fn none() -> Self {
        Merger::sorted(Vec::new(), false, 0)
    }

    /// Number of results in the view.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Item count of the chunk snapshot this merger was built from; used
    /// by the coordinator to discard stale mergers.
    pub fn snapshot_len(&self) -> usize {
        self.snapshot_len
    }

    /// The i-th best result.
    ///
    /// # Panics
    ///
    /// Out-of-bounds access is an internal invariant violation (the
    /// display is expected to stay within `len()`), so it panics.
    pub fn get(&self, index: usize) -> MatchResult {
        assert!(index < self.count, "merger index {} out of bounds ({})", index, self.count);
        match &self.inner {
            Inner::Sorted { lists, state } => self.get_sorted(lists, state, index),
            Inner::Unsorted { lists } => {
                let index = if self.tac { self.count - 1 - index } else { index };
                let mut remaining = index;
                for list in lists {
                    if remaining < list.len() {
                        return list[remaining].clone();
                    }
                    remaining -= list.len();
                }
                unreachable!("count covers all lists");
            }
            Inner::Pass { chunks, criteria } => {
                let index = if self.tac { self.count - 1 - index } else { index };
                let mut remaining = index;
                for chunk in chunks {
                    if remaining < chunk.len() {
                        return MatchResult::new(
                            Arc::clone(chunk),
                            remaining as u32,
                            criteria,
                            0,
                            Vec::new(),
                        );
                    }
                    remaining -= chunk.len();
                }
                unreachable!("count covers all chunks");
            }
        }
    }

    fn get_sorted(
        &self,
        lists: &[Vec<MatchResult>],
        state: &Mutex<MergeState>,
        index: usize,
    ) -> MatchResult {
        let mut state = state.lock().expect("merge state lock");
        while state.merged.len() <= index {
            // Pick the list whose front result ranks best; earlier lists
            // win exact ties, which keeps the merge stable.
            let mut best: Option<usize> = None;
            for (k, list) in lists.iter().enumerate() {
                let cursor = state.cursors[k];
                if cursor >= list.len() {
                    continue;
                }
                match best {
                    None => best = Some(k),
                    Some(b) => {
                        let current = &lists[b][state.cursors[b]];
                        if compare_ranks(&list[cursor], current, self.tac).is_lt() {
                            best = Some(k);
                        }
                    }
                }
            }
            let k = best.expect("cursors exhausted before reaching index");
            let cursor = state.cursors[k];
            state.merged.push(lists[k][cursor].clone());
            state.cursors[k] += 1;
        }
        state.merged[index].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ChunkList, Item};
    use crate::pattern::{Pattern, PatternOptions};
    use crate::result::Criterion;

    /// Build one sorted result list per chunk of `texts`, matching `query`
    /// fuzzily against every item.
    fn build_lists(texts: &[&str], query: &str) -> (Vec<Vec<MatchResult>>, usize) {
        let list = ChunkList::new();
        for (i, text) in texts.iter().enumerate() {
            list.push(Item::new(i as u32, text.as_bytes().to_vec(), text.to_string(), None, None));
        }
        let snap = list.snapshot();
        let pattern = Pattern::parse(query, &PatternOptions::default()).unwrap();
        let criteria = [Criterion::Score];
        let mut scratch = Vec::new();
        let lists = snap
            .chunks
            .iter()
            .map(|chunk| {
                let mut results: Vec<MatchResult> = chunk
                    .items()
                    .iter()
                    .enumerate()
                    .filter_map(|(slot, item)| {
                        pattern.match_item(item, &mut scratch, None).map(|(score, offsets)| {
                            MatchResult::new(Arc::clone(chunk), slot as u32, &criteria, score, offsets)
                        })
                    })
                    .collect();
                results.sort_by(|a, b| compare_ranks(a, b, false));
                results
            })
            .collect();
        (lists, snap.item_count)
    }

    #[test]
    fn test_sorted_merge_is_globally_ordered() {
        let texts = ["alpha", "beta", "a", "ba", "aa"];
        let (lists, len) = build_lists(&texts, "a");
        let merger = Merger::sorted(lists, false, len);
        assert_eq!(merger.len(), 5, "every text contains an 'a'");

        // Ranks must be non-decreasing along the view
        for i in 1..merger.len() {
            let prev = merger.get(i - 1);
            let cur = merger.get(i);
            assert!(
                compare_ranks(&prev, &cur, false).is_le(),
                "merger order must be non-decreasing at {}",
                i
            );
        }
    }

    #[test]
    fn test_get_is_stable_across_calls() {
        let texts: Vec<String> = (0..250).map(|i| format!("line-{:03}", i)).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let (lists, len) = build_lists(&refs, "line");
        let merger = Merger::sorted(lists, false, len);

        // Read out of order, then verify repeated gets agree
        let late = merger.get(200);
        let early = merger.get(3);
        assert_eq!(merger.get(200).index(), late.index(), "gets must be repeatable");
        assert_eq!(merger.get(3).index(), early.index());
    }

    #[test]
    fn test_sorted_merge_matches_full_sort() {
        let texts = ["bb", "ab", "ba", "aa", "abab", "baba"];
        let (lists, len) = build_lists(&texts, "ab");
        let mut flat: Vec<MatchResult> = lists.iter().flatten().cloned().collect();
        flat.sort_by(|a, b| compare_ranks(a, b, false));

        let merger = Merger::sorted(lists, false, len);
        assert_eq!(merger.len(), flat.len());
        for (i, expected) in flat.iter().enumerate() {
            assert_eq!(
                merger.get(i).index(),
                expected.index(),
                "lazy merge must agree with a full sort at {}",
                i
            );
        }
    }

    #[test]
    fn test_unsorted_concatenates_in_chunk_order() {
        let texts = ["xc", "xa", "xb"];
        let (lists, len) = build_lists(&texts, "x");
        let merger = Merger::unsorted(lists, false, len);
        let order: Vec<u32> = (0..merger.len()).map(|i| merger.get(i).index()).collect();
        assert_eq!(order, vec![0, 1, 2], "unsorted view preserves ingestion order");
    }

    #[test]
    fn test_unsorted_tac_reverses() {
        let texts = ["xa", "xb", "xc"];
        let (lists, len) = build_lists(&texts, "x");
        let merger = Merger::unsorted(lists, true, len);
        let order: Vec<u32> = (0..merger.len()).map(|i| merger.get(i).index()).collect();
        assert_eq!(order, vec![2, 1, 0], "tac serves the newest items first");
    }

    #[test]
    fn test_sorted_tac_breaks_ties_backwards() {
        // Identical items; tac puts the later index first
        let texts = ["foo", "foo"];
        let (lists, len) = build_lists(&texts, "foo");
        let merger = Merger::sorted(lists, true, len);
        assert_eq!(merger.get(0).index(), 1);
        assert_eq!(merger.get(1).index(), 0);
    }

    #[test]
    fn test_pass_through_serves_every_item() {
        let list = ChunkList::new();
        for i in 0..7u32 {
            let text = format!("item{}", i);
            list.push(Item::new(i, text.as_bytes().to_vec(), text, None, None));
        }
        let snap = list.snapshot();
        let merger = Merger::pass_through(snap.chunks, vec![Criterion::Score], false);
        assert_eq!(merger.len(), 7);
        for i in 0..7 {
            let result = merger.get(i);
            assert_eq!(result.index(), i as u32, "pass-through preserves ingestion order");
            assert!(result.offsets().is_empty(), "empty pattern carries no offsets");
        }
    }

    #[test]
    fn test_empty_merger() {
        let merger = Merger::none();
        assert_eq!(merger.len(), 0);
        assert!(merger.is_empty());
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_out_of_bounds_panics() {
        Merger::none().get(0);
    }
}
