use std::collections::{HashMap, VecDeque};

pub type FrameId = i32;

pub const INVALID_FRAME_ID: FrameId = -1;

/// Advisory hint describing the access pattern behind a page request.
/// Currently unused by the eviction policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessType {
    #[default]
    Unknown,
    Lookup,
    Scan,
    Index,
}

pub trait Replacer {
    fn evict(&mut self) -> Option<FrameId>;
    fn record_access(&mut self, frame_id: FrameId);
    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool);
    fn remove(&mut self, frame_id: FrameId);
    fn size(&self) -> usize;
}

/// Per-frame access history. Up to `k` timestamps, oldest at the front.
#[derive(Default)]
struct LRUKNode {
    history: VecDeque<u64>,
    is_evictable: bool,
}

/// Eviction policy by backward k-distance: the victim is the evictable
/// frame whose k-th most recent access lies furthest in the past. Frames
/// with fewer than k recorded accesses have infinite distance and are
/// preferred; ties among those fall back to plain LRU on the oldest
/// recorded access.
pub struct LRUKReplacer {
    node_store: HashMap<FrameId, LRUKNode>,
    current_timestamp: u64,
    curr_size: usize,
    replacer_size: usize,
    k: usize,
}

impl LRUKReplacer {
    pub fn new(replacer_size: usize, k: usize) -> Self {
        assert!(k >= 1, "history window must hold at least one access");
        LRUKReplacer {
            node_store: HashMap::new(),
            current_timestamp: 0,
            curr_size: 0,
            replacer_size,
            k,
        }
    }

    fn check_frame_id(&self, frame_id: FrameId) {
        assert!(
            frame_id >= 0 && (frame_id as usize) < self.replacer_size,
            "frame id {} out of range for replacer of size {}",
            frame_id,
            self.replacer_size
        );
    }
}

impl Replacer for LRUKReplacer {
    fn evict(&mut self) -> Option<FrameId> {
        if self.curr_size == 0 {
            return None;
        }

        // (frame, k-distance with None as +inf, oldest recorded access)
        let mut victim: Option<(FrameId, Option<u64>, u64)> = None;
        for (&frame_id, node) in &self.node_store {
            if !node.is_evictable {
                continue;
            }
            let oldest = *node.history.front().expect("recorded frame has history");
            let distance =
                (node.history.len() == self.k).then(|| self.current_timestamp - oldest);

            let better = match &victim {
                None => true,
                Some((_, best_distance, best_oldest)) => match (distance, best_distance) {
                    (None, Some(_)) => true,
                    (Some(_), None) => false,
                    (None, None) => oldest < *best_oldest,
                    (Some(d), Some(best)) => d > *best,
                },
            };
            if better {
                victim = Some((frame_id, distance, oldest));
            }
        }

        let (frame_id, _, _) = victim?;
        self.node_store.remove(&frame_id);
        self.curr_size -= 1;
        Some(frame_id)
    }

    fn record_access(&mut self, frame_id: FrameId) {
        self.check_frame_id(frame_id);

        let node = self.node_store.entry(frame_id).or_default();
        if node.history.len() == self.k {
            node.history.pop_front();
        }
        node.history.push_back(self.current_timestamp);
        self.current_timestamp += 1;
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        let node = self
            .node_store
            .get_mut(&frame_id)
            .expect("set_evictable on a frame that was never recorded");

        match (node.is_evictable, evictable) {
            (false, true) => self.curr_size += 1,
            (true, false) => self.curr_size -= 1,
            _ => {}
        }
        node.is_evictable = evictable;
    }

    fn remove(&mut self, frame_id: FrameId) {
        let Some(node) = self.node_store.get(&frame_id) else {
            return;
        };
        assert!(
            node.is_evictable,
            "remove called on pinned frame {}",
            frame_id
        );
        self.node_store.remove(&frame_id);
        self.curr_size -= 1;
    }

    fn size(&self) -> usize {
        self.curr_size
    }
}
