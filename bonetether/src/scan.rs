use crate::{
    BatchEntry, BoneId, CandidateKey, Evaluator, Probe, ReaderSupervisor, Side, Slot, SubjectId,
    SubjectPose,
};

/// Resumable scan over one subject's bones with a per-tick budget.
///
/// Each pass captures the subject's pose once and then evaluates a bounded
/// number of bones per tick, so one tick yields one heap batch. Dropping the
/// scan abandons it; heap state for the slot is cleared by the owner.
#[derive(Clone, Debug)]
pub struct BoneScan {
    subject: SubjectId,
    slot: Slot,
    pose: Option<SubjectPose>,
    cursor: usize,
    passes: u32,
}

impl BoneScan {
    pub fn new(subject: SubjectId, slot: Slot) -> Self {
        Self {
            subject,
            slot,
            pose: None,
            cursor: 0,
            passes: 0,
        }
    }

    pub fn subject(&self) -> SubjectId {
        self.subject
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    pub fn at_pass_start(&self) -> bool {
        self.cursor == 0
    }

    pub fn pose(&self) -> Option<&SubjectPose> {
        self.pose.as_ref()
    }

    /// Restarts from the first bone at the next step.
    pub fn restart(&mut self) {
        self.cursor = 0;
    }

    /// Evaluates up to `budget` bones. Returns `None` when no pose could ever
    /// be captured for the subject; a failed recapture keeps the previous pose.
    pub fn step(
        &mut self,
        reader: &mut ReaderSupervisor,
        evaluator: &Evaluator,
        probe: &Probe,
        held_side: Side,
        budget: usize,
        now: f64,
    ) -> Option<Vec<BatchEntry>> {
        if self.cursor == 0 {
            if let Some(pose) = reader.read_pose(self.subject, now) {
                self.pose = Some(pose);
            }
        }
        let pose = self.pose.as_ref()?;

        let end = (self.cursor + budget.max(1)).min(BoneId::COUNT);
        let batch: Vec<BatchEntry> = BoneId::ALL[self.cursor..end]
            .iter()
            .map(|&bone| BatchEntry {
                key: CandidateKey::new(self.slot, bone),
                outcome: evaluator.evaluate(pose, bone, probe, held_side),
            })
            .collect();

        self.cursor = end;
        if self.cursor >= BoneId::COUNT {
            self.cursor = 0;
            self.passes += 1;
            log::debug!("bone scan pass {} complete for {:?}", self.passes, self.subject);
        }
        Some(batch)
    }
}
