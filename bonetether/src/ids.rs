use crate::BoneId;

/// Host-assigned identity of a tracked subject. Values are volatile and may be
/// large; they are never used to size arrays.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SubjectId(pub u32);

/// Dense alias for a subject, allocated on first sight and reclaimed on departure.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Slot(pub u16);

impl Slot {
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct CandidateKey {
    pub slot: Slot,
    pub bone: BoneId,
}

impl CandidateKey {
    pub fn new(slot: Slot, bone: BoneId) -> Self {
        Self { slot, bone }
    }

    pub(crate) fn dense_index(self) -> usize {
        self.slot.index() * BoneId::COUNT + self.bone.index()
    }
}

/// A committed (subject, bone) pair. Subject and bone are always set together.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BoneTarget {
    pub subject: SubjectId,
    pub bone: BoneId,
}
