use crate::{BoneId, CandidateKey, Slot};

const WORD_BITS: usize = 64;

fn get_bit(words: &[u64], index: usize) -> bool {
    words
        .get(index / WORD_BITS)
        .is_some_and(|w| w & (1u64 << (index % WORD_BITS)) != 0)
}

/// Sets the bit, growing `words` as needed. Returns true if it was newly set.
fn set_bit(words: &mut Vec<u64>, index: usize) -> bool {
    let word = index / WORD_BITS;
    if word >= words.len() {
        words.resize(word + 1, 0);
    }
    let mask = 1u64 << (index % WORD_BITS);
    let was_set = words[word] & mask != 0;
    words[word] |= mask;
    !was_set
}

fn clear_bit(words: &mut [u64], index: usize) -> bool {
    let Some(w) = words.get_mut(index / WORD_BITS) else {
        return false;
    };
    let mask = 1u64 << (index % WORD_BITS);
    let was_set = *w & mask != 0;
    *w &= !mask;
    was_set
}

/// Candidate keys the user cycled past, plus whole subjects.
#[derive(Clone, Debug, Default)]
pub struct Blocklist {
    keys: Vec<u64>,
    subjects: Vec<u64>,
    len: usize,
    touched_at: Option<f64>,
}

impl Blocklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: CandidateKey, now: f64) {
        if set_bit(&mut self.keys, key.dense_index()) {
            self.len += 1;
        }
        self.touched_at = Some(now);
    }

    pub fn insert_subject(&mut self, slot: Slot, now: f64) {
        if set_bit(&mut self.subjects, slot.index()) {
            self.len += 1;
        }
        self.touched_at = Some(now);
    }

    pub fn contains(&self, key: CandidateKey) -> bool {
        get_bit(&self.subjects, key.slot.index()) || get_bit(&self.keys, key.dense_index())
    }

    pub fn contains_subject(&self, slot: Slot) -> bool {
        get_bit(&self.subjects, slot.index())
    }

    /// Unblocks every key of `slot` and the subject itself.
    pub fn clear_subject(&mut self, slot: Slot) {
        if clear_bit(&mut self.subjects, slot.index()) {
            self.len -= 1;
        }
        for bone in BoneId::ALL {
            if clear_bit(&mut self.keys, CandidateKey::new(slot, bone).dense_index()) {
                self.len -= 1;
            }
        }
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.subjects.clear();
        self.len = 0;
        self.touched_at = None;
    }

    /// Number of blocked keys plus blocked subjects.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Time of the last insertion, for the inactivity timeout.
    pub fn touched_at(&self) -> Option<f64> {
        self.touched_at
    }
}
