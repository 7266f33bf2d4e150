//! Narrow contracts the host engine supplies.

use crate::{BoneId, BoneSample, SubjectId};
use glam::Vec3;
use thiserror::Error;

/// The bone reader stopped answering (the host faulted internally).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
#[error("bone reader faulted while reading subject {subject:?}")]
pub struct ReaderFault {
    pub subject: SubjectId,
}

/// Per-bone world pose queries. `Ok(None)` means the rig lacks the bone.
pub trait BoneReader {
    fn read(&mut self, subject: SubjectId, bone: BoneId) -> Result<Option<BoneSample>, ReaderFault>;

    /// Token advanced by the reader every time it completes a query. A reader
    /// whose token stalls is considered dead.
    fn watchdog(&self) -> u64;
}

/// Spawns fresh readers when the supervisor discards a faulted one.
pub trait ReaderFactory {
    fn spawn(&mut self) -> Box<dyn BoneReader>;
}

pub trait SubjectDirectory {
    fn nearby_subjects(&self) -> Vec<SubjectId>;
    fn is_valid(&self, subject: SubjectId) -> bool;
    fn world_position(&self, subject: SubjectId) -> Option<Vec3>;
    fn local_subject(&self) -> SubjectId;
}

/// Replication authority over the attachable's state record.
pub trait Authority {
    fn is_owner(&self) -> bool;
    fn request_ownership(&mut self);
    /// Asks the host to snapshot and send the replicated record.
    fn request_serialization(&mut self);
}

pub trait Host: SubjectDirectory + Authority {}

impl<T: SubjectDirectory + Authority> Host for T {}
