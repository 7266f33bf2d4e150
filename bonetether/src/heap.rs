use crate::{BoneId, Blocklist, CandidateKey, Evaluation, Rejection, Slot};
use glam::Vec3;
use std::cmp::Ordering;

const ABSENT: usize = usize::MAX;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RankedCandidate {
    pub key: CandidateKey,
    pub adjusted_distance: f32,
    pub true_distance: f32,
    pub local_child_offset: Vec3,
    pub nearest: Vec3,
    /// False only for a locked key kept while out of range.
    pub valid: bool,
}

impl RankedCandidate {
    pub fn from_evaluation(key: CandidateKey, evaluation: &Evaluation, valid: bool) -> Self {
        Self {
            key,
            adjusted_distance: evaluation.adjusted_distance,
            true_distance: evaluation.true_distance,
            local_child_offset: evaluation.local_child_offset,
            nearest: evaluation.nearest,
            valid,
        }
    }

    fn rank(&self) -> f32 {
        if self.valid {
            self.adjusted_distance
        } else {
            f32::INFINITY
        }
    }
}

/// One measured key streamed into the heap.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BatchEntry {
    pub key: CandidateKey,
    pub outcome: Result<Evaluation, Rejection>,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BatchReport {
    pub upserted: usize,
    pub suppressed: usize,
    pub removed: usize,
    pub pruned: usize,
    pub retained_invalid: usize,
}

/// Indexed binary min-heap over (subject slot x bone) keys, ordered by
/// adjusted distance. Keys on the blocklist are never present.
#[derive(Clone, Debug, Default)]
pub struct CandidateHeap {
    order: Vec<usize>,
    position: Vec<usize>,
    entries: Vec<Option<RankedCandidate>>,
    valid_count: usize,
    blocklist: Blocklist,
}

impl CandidateHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slots(slots: usize) -> Self {
        let mut heap = Self::new();
        heap.grow(slots * BoneId::COUNT);
        heap
    }

    fn grow(&mut self, dense_len: usize) {
        if self.entries.len() < dense_len {
            self.entries.resize(dense_len, None);
            self.position.resize(dense_len, ABSENT);
        }
    }

    fn rank_at(&self, heap_pos: usize) -> (f32, usize) {
        let dense = self.order[heap_pos];
        let rank = self.entries[dense].as_ref().map_or(f32::INFINITY, RankedCandidate::rank);
        (rank, dense)
    }

    fn less(&self, a: usize, b: usize) -> bool {
        let (ra, da) = self.rank_at(a);
        let (rb, db) = self.rank_at(b);
        match ra.total_cmp(&rb) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => da < db,
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.order.swap(a, b);
        self.position[self.order[a]] = a;
        self.position[self.order[b]] = b;
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.less(pos, parent) {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.order.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut smallest = left;
            if right < len && self.less(right, left) {
                smallest = right;
            }
            if !self.less(smallest, pos) {
                break;
            }
            self.swap(pos, smallest);
            pos = smallest;
        }
    }

    fn repair(&mut self, pos: usize) {
        self.sift_up(pos);
        self.sift_down(pos);
    }

    /// Inserts or updates in place. Returns false if the key is blocked.
    pub fn upsert(&mut self, candidate: RankedCandidate) -> bool {
        if self.blocklist.contains(candidate.key) {
            return false;
        }
        let dense = candidate.key.dense_index();
        self.grow(dense + 1);

        let previous = self.entries[dense].replace(candidate);
        if previous.is_some_and(|p| p.valid) {
            self.valid_count -= 1;
        }
        if candidate.valid {
            self.valid_count += 1;
        }

        match self.position[dense] {
            ABSENT => {
                let pos = self.order.len();
                self.order.push(dense);
                self.position[dense] = pos;
                self.sift_up(pos);
            }
            pos => self.repair(pos),
        }
        true
    }

    pub fn delete(&mut self, key: CandidateKey) -> Option<RankedCandidate> {
        let dense = key.dense_index();
        let pos = *self.position.get(dense)?;
        if pos == ABSENT {
            return None;
        }

        let last = self.order.len() - 1;
        if pos != last {
            self.swap(pos, last);
        }
        self.order.pop();
        self.position[dense] = ABSENT;
        let removed = self.entries[dense].take();
        if removed.is_some_and(|r| r.valid) {
            self.valid_count -= 1;
        }
        if pos < self.order.len() {
            self.repair(pos);
        }
        removed
    }

    pub fn forbid_bone(&mut self, key: CandidateKey, now: f64) {
        self.delete(key);
        self.blocklist.insert(key, now);
    }

    pub fn forbid_subject(&mut self, slot: Slot, now: f64) {
        for bone in BoneId::ALL {
            self.delete(CandidateKey::new(slot, bone));
        }
        self.blocklist.insert_subject(slot, now);
    }

    /// Drops every key of `slot` and unblocks it, so a subject reusing the
    /// slot starts clean.
    pub fn clear_subject(&mut self, slot: Slot) {
        for bone in BoneId::ALL {
            self.delete(CandidateKey::new(slot, bone));
        }
        self.blocklist.clear_subject(slot);
    }

    pub fn clear(&mut self) {
        for dense in self.order.drain(..) {
            self.entries[dense] = None;
            self.position[dense] = ABSENT;
        }
        self.valid_count = 0;
        self.blocklist.clear();
    }

    pub fn clear_blocklist(&mut self) {
        self.blocklist.clear();
    }

    pub fn blocklist(&self) -> &Blocklist {
        &self.blocklist
    }

    pub fn best_candidate(&self) -> Option<CandidateKey> {
        self.best().map(|c| c.key)
    }

    pub fn best(&self) -> Option<&RankedCandidate> {
        let dense = *self.order.first()?;
        self.entries[dense].as_ref()
    }

    pub fn get(&self, key: CandidateKey) -> Option<&RankedCandidate> {
        self.entries.get(key.dense_index())?.as_ref()
    }

    pub fn contains(&self, key: CandidateKey) -> bool {
        self.get(key).is_some()
    }

    pub fn is_blocked(&self, key: CandidateKey) -> bool {
        self.blocklist.contains(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entries within range (excludes a retained out-of-range locked key).
    pub fn valid_len(&self) -> usize {
        self.valid_count
    }

    /// Entries in heap-array order.
    pub fn iter(&self) -> impl Iterator<Item = &RankedCandidate> + '_ {
        self.order
            .iter()
            .filter_map(|&dense| self.entries[dense].as_ref())
    }

    /// Applies one streamed batch, then drops every candidate farther than
    /// `best * multiplier`. `locked` survives both range and the filter.
    pub fn apply_batch(
        &mut self,
        batch: &[BatchEntry],
        locked: Option<CandidateKey>,
        multiplier: f32,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for entry in batch {
            match &entry.outcome {
                Ok(evaluation) => {
                    let candidate = RankedCandidate::from_evaluation(entry.key, evaluation, true);
                    if self.upsert(candidate) {
                        report.upserted += 1;
                    } else {
                        report.suppressed += 1;
                    }
                }
                Err(Rejection::OutOfRange(evaluation)) if locked == Some(entry.key) => {
                    let candidate = RankedCandidate::from_evaluation(entry.key, evaluation, false);
                    if self.upsert(candidate) {
                        report.retained_invalid += 1;
                    } else {
                        report.suppressed += 1;
                    }
                }
                Err(_) => {
                    if self.delete(entry.key).is_some() {
                        report.removed += 1;
                    }
                }
            }
        }

        let best = self.best().filter(|c| c.valid).map(|c| c.adjusted_distance);
        if let Some(best) = best {
            let limit = best * multiplier;
            let doomed: Vec<CandidateKey> = self
                .iter()
                .filter(|c| c.valid && Some(c.key) != locked && c.adjusted_distance > limit)
                .map(|c| c.key)
                .collect();
            for key in doomed {
                self.delete(key);
                report.pruned += 1;
            }
        }

        log::trace!("candidate batch applied: {report:?}, {} entries", self.len());
        report
    }

    #[cfg(test)]
    pub(crate) fn heap_order_holds(&self) -> bool {
        (1..self.order.len()).all(|pos| !self.less(pos, (pos - 1) / 2))
            && self
                .order
                .iter()
                .enumerate()
                .all(|(pos, &dense)| self.position[dense] == pos)
    }
}
