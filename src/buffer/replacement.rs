/*
 * Copyright (c) 2020 - 2021.  Shoyo Inokuchi.
 * Please refer to github.com/shoyo/jin for more information about this project and its license.
 */

/// Pluggable strategies for choosing which unpinned frame to evict.
use std::collections::HashMap;

use crate::constants::FrameIdT;

pub trait ReplacementPolicy {
    /// Called when a frame transitions from unpinned to pinned (its first pin).
    fn use_page(&mut self, frame_id: FrameIdT);

    /// Called when a frame transitions from pinned to unpinned (pin count reaches zero).
    fn release_page(&mut self, frame_id: FrameIdT);

    /// Return and forget an evictable frame, or `None` if nothing is currently evictable.
    fn pick_candidate(&mut self) -> Option<FrameIdT>;
}

/// Evicts the least-recently-released frame first. Maintains an ordered candidate list
/// alongside a sparse index from frame id to list position, so `use_page` can remove an
/// entry in constant time without a linear scan.
#[derive(Default)]
pub struct LruPolicy {
    candidates: Vec<FrameIdT>,
    position: HashMap<FrameIdT, usize>,
}

impl LruPolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplacementPolicy for LruPolicy {
    fn use_page(&mut self, frame_id: FrameIdT) {
        if let Some(&pos) = self.position.get(&frame_id) {
            self.candidates.remove(pos);
            self.position.remove(&frame_id);
            for slot in self.position.values_mut() {
                if *slot > pos {
                    *slot -= 1;
                }
            }
        }
    }

    fn release_page(&mut self, frame_id: FrameIdT) {
        debug_assert!(!self.position.contains_key(&frame_id));
        self.position.insert(frame_id, self.candidates.len());
        self.candidates.push(frame_id);
    }

    fn pick_candidate(&mut self) -> Option<FrameIdT> {
        if self.candidates.is_empty() {
            return None;
        }
        let frame_id = self.candidates.remove(0);
        self.position.remove(&frame_id);
        for slot in self.position.values_mut() {
            *slot -= 1;
        }
        Some(frame_id)
    }
}

/// A simpler, deterministic, non-recency-based policy: picks the lowest-numbered released
/// frame first, useful in tests that want eviction order independent of access recency.
#[derive(Default)]
pub struct SlowPolicy {
    candidates: Vec<FrameIdT>,
}

impl SlowPolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplacementPolicy for SlowPolicy {
    fn use_page(&mut self, frame_id: FrameIdT) {
        self.candidates.retain(|&id| id != frame_id);
    }

    fn release_page(&mut self, frame_id: FrameIdT) {
        if !self.candidates.contains(&frame_id) {
            self.candidates.push(frame_id);
        }
    }

    fn pick_candidate(&mut self) -> Option<FrameIdT> {
        if self.candidates.is_empty() {
            return None;
        }
        self.candidates.sort_unstable();
        Some(self.candidates.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_evicts_earliest_release_first() {
        let mut policy = LruPolicy::new();
        policy.release_page(1);
        policy.release_page(2);
        policy.release_page(3);

        assert_eq!(policy.pick_candidate(), Some(1));
        assert_eq!(policy.pick_candidate(), Some(2));
        assert_eq!(policy.pick_candidate(), Some(3));
        assert_eq!(policy.pick_candidate(), None);
    }

    #[test]
    fn test_lru_use_removes_from_candidates() {
        let mut policy = LruPolicy::new();
        policy.release_page(1);
        policy.release_page(2);
        policy.use_page(1);

        assert_eq!(policy.pick_candidate(), Some(2));
        assert_eq!(policy.pick_candidate(), None);
    }

    #[test]
    fn test_lru_re_release_after_use_goes_to_back() {
        let mut policy = LruPolicy::new();
        policy.release_page(1);
        policy.release_page(2);
        policy.use_page(1);
        policy.release_page(1);

        assert_eq!(policy.pick_candidate(), Some(2));
        assert_eq!(policy.pick_candidate(), Some(1));
    }

    #[test]
    fn test_slow_policy_picks_lowest_id() {
        let mut policy = SlowPolicy::new();
        policy.release_page(5);
        policy.release_page(1);
        policy.release_page(3);

        assert_eq!(policy.pick_candidate(), Some(1));
        assert_eq!(policy.pick_candidate(), Some(3));
        assert_eq!(policy.pick_candidate(), Some(5));
    }
}
