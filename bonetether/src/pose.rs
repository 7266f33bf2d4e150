use crate::{BoneId, BoneReader, ReaderFault, SubjectId};
use glam::{Quat, Vec3};

/// Positions closer to the origin than this are reported by hosts for bones
/// the rig does not have.
const UNAVAILABLE_EPSILON_SQ: f32 = 1.0e-8;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Linear position and spherical rotation interpolation. `t >= 1` returns
    /// `to` exactly.
    pub fn lerp_slerp(&self, to: &Pose, t: f32) -> Pose {
        if t >= 1.0 {
            return *to;
        }
        let t = t.max(0.0);
        Pose {
            position: self.position.lerp(to.position, t),
            rotation: self.rotation.slerp(to.rotation, t),
        }
    }

    /// Expresses `world` in this pose's local frame.
    pub fn inverse_transform(&self, world: &Pose) -> Pose {
        let inv = self.rotation.inverse();
        Pose {
            position: inv * (world.position - self.position),
            rotation: (inv * world.rotation).normalize(),
        }
    }

    /// Maps a pose expressed in this frame back to world space.
    pub fn transform(&self, local: &Pose) -> Pose {
        Pose {
            position: self.rotation * local.position + self.position,
            rotation: (self.rotation * local.rotation).normalize(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoneSample {
    pub position: Vec3,
    pub rotation: Quat,
}

impl BoneSample {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn is_available(&self) -> bool {
        self.position.length_squared() >= UNAVAILABLE_EPSILON_SQ && self.position.is_finite()
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation)
    }
}

/// Snapshot of every bone of one subject, captured in a single pass.
#[derive(Clone, Debug)]
pub struct SubjectPose {
    pub subject: SubjectId,
    pub captured_at: f64,
    samples: [Option<BoneSample>; BoneId::COUNT],
}

impl SubjectPose {
    pub fn empty(subject: SubjectId, captured_at: f64) -> Self {
        Self {
            subject,
            captured_at,
            samples: [None; BoneId::COUNT],
        }
    }

    /// Reads all bones; a fault anywhere discards the whole capture so callers
    /// never see a torn pose.
    pub fn capture(
        reader: &mut dyn BoneReader,
        subject: SubjectId,
        now: f64,
    ) -> Result<Self, ReaderFault> {
        let mut pose = Self::empty(subject, now);
        for bone in BoneId::ALL {
            pose.samples[bone.index()] = reader.read(subject, bone)?;
        }
        Ok(pose)
    }

    pub fn set(&mut self, bone: BoneId, sample: Option<BoneSample>) {
        self.samples[bone.index()] = sample;
    }

    /// Available sample for `bone`, if the rig has it.
    pub fn sample(&self, bone: BoneId) -> Option<BoneSample> {
        self.samples[bone.index()].filter(BoneSample::is_available)
    }

    pub fn position(&self, bone: BoneId) -> Option<Vec3> {
        self.sample(bone).map(|s| s.position)
    }

    pub fn available_count(&self) -> usize {
        BoneId::ALL
            .iter()
            .filter(|b| self.sample(**b).is_some())
            .count()
    }
}
