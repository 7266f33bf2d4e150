use crate::{BoneId, BoneReader, BoneSample, ReaderFactory, ReaderFault, SubjectId, SubjectPose};
use std::collections::HashMap;

/// Owns the isolated bone reader and replaces it when it stops responding.
///
/// A reader is considered dead when it returns [`crate::ReaderFault`], or when
/// queries were issued during the previous tick but its watchdog token did not
/// move. The subject being read at the time is suppressed for a cooldown so a
/// rig that reliably faults the host cannot trap the reader in a respawn loop.
pub struct ReaderSupervisor {
    factory: Box<dyn ReaderFactory>,
    reader: Box<dyn BoneReader>,
    cooldown: f64,
    last_token: u64,
    queried: bool,
    last_subject: Option<SubjectId>,
    suppressed: HashMap<SubjectId, f64>,
    respawns: u32,
}

impl std::fmt::Debug for ReaderSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderSupervisor")
            .field("cooldown", &self.cooldown)
            .field("last_token", &self.last_token)
            .field("suppressed", &self.suppressed)
            .field("respawns", &self.respawns)
            .finish_non_exhaustive()
    }
}

impl ReaderSupervisor {
    pub fn new(mut factory: Box<dyn ReaderFactory>, cooldown: f64) -> Self {
        let reader = factory.spawn();
        let last_token = reader.watchdog();
        Self {
            factory,
            reader,
            cooldown,
            last_token,
            queried: false,
            last_subject: None,
            suppressed: HashMap::new(),
            respawns: 0,
        }
    }

    /// Runs the watchdog. Returns true if the reader was replaced.
    pub fn begin_tick(&mut self, now: f64) -> bool {
        self.suppressed.retain(|_, until| *until > now);

        let stalled = self.queried && self.reader.watchdog() == self.last_token;
        if stalled {
            self.respawn(self.last_subject, now);
        }
        self.queried = false;
        self.last_token = self.reader.watchdog();
        stalled
    }

    fn respawn(&mut self, faulting: Option<SubjectId>, now: f64) {
        log::warn!("bone reader stopped responding (subject {faulting:?}); respawning");
        self.reader = self.factory.spawn();
        self.last_token = self.reader.watchdog();
        self.queried = false;
        self.respawns += 1;
        if let Some(subject) = faulting {
            self.suppressed.insert(subject, now + self.cooldown);
        }
    }

    pub fn is_suppressed(&self, subject: SubjectId, now: f64) -> bool {
        self.suppressed.get(&subject).is_some_and(|until| *until > now)
    }

    pub fn respawns(&self) -> u32 {
        self.respawns
    }

    /// Full pose capture; `None` if suppressed or the reader faulted.
    pub fn read_pose(&mut self, subject: SubjectId, now: f64) -> Option<SubjectPose> {
        if self.is_suppressed(subject, now) {
            return None;
        }
        self.queried = true;
        self.last_subject = Some(subject);
        match SubjectPose::capture(self.reader.as_mut(), subject, now) {
            Ok(pose) => Some(pose),
            Err(fault) => {
                self.respawn(Some(fault.subject), now);
                None
            }
        }
    }

    /// Single bone read. `Ok(None)` means the rig lacks the bone; a fault, or
    /// a subject still cooling down after one, is reported as [`ReaderFault`].
    pub fn read_bone(
        &mut self,
        subject: SubjectId,
        bone: BoneId,
        now: f64,
    ) -> Result<Option<BoneSample>, ReaderFault> {
        if self.is_suppressed(subject, now) {
            return Err(ReaderFault { subject });
        }
        self.queried = true;
        self.last_subject = Some(subject);
        match self.reader.read(subject, bone) {
            Ok(sample) => Ok(sample.filter(BoneSample::is_available)),
            Err(fault) => {
                self.respawn(Some(fault.subject), now);
                Err(fault)
            }
        }
    }
}
