use crate::{Slot, SubjectId};
use std::collections::HashMap;

/// Dense slot allocation for subjects. Reclaimed slots are reused lowest-first
/// so heap storage stays proportional to concurrently seen subjects.
#[derive(Clone, Debug, Default)]
pub struct SlotMap {
    by_subject: HashMap<SubjectId, Slot>,
    by_slot: Vec<Option<SubjectId>>,
    free_list: Vec<Slot>,
}

impl SlotMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `subject`, allocating one on first sight. `None` once every
    /// slot index is in use.
    pub fn acquire(&mut self, subject: SubjectId) -> Option<Slot> {
        if let Some(&slot) = self.by_subject.get(&subject) {
            return Some(slot);
        }

        let slot = match self.free_list.pop() {
            Some(slot) => slot,
            None => {
                let Ok(index) = u16::try_from(self.by_slot.len()) else {
                    log::warn!("subject slots exhausted; ignoring {subject:?}");
                    return None;
                };
                self.by_slot.push(None);
                Slot(index)
            }
        };
        self.by_slot[slot.index()] = Some(subject);
        self.by_subject.insert(subject, slot);
        Some(slot)
    }

    /// Frees the subject's slot for reuse. The caller clears heap state for it.
    pub fn release(&mut self, subject: SubjectId) -> Option<Slot> {
        let slot = self.by_subject.remove(&subject)?;
        self.by_slot[slot.index()] = None;
        self.free_list.push(slot);
        // Highest first, so `pop` hands out the lowest slot.
        self.free_list.sort_unstable_by(|a, b| b.cmp(a));
        Some(slot)
    }

    pub fn get(&self, subject: SubjectId) -> Option<Slot> {
        self.by_subject.get(&subject).copied()
    }

    pub fn subject(&self, slot: Slot) -> Option<SubjectId> {
        self.by_slot.get(slot.index()).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_subject.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_subject.is_empty()
    }

    /// Number of slots ever allocated (the heap's slot dimension).
    pub fn capacity(&self) -> usize {
        self.by_slot.len()
    }

    pub fn subjects(&self) -> impl Iterator<Item = (SubjectId, Slot)> + '_ {
        self.by_subject.iter().map(|(s, slot)| (*s, *slot))
    }
}
