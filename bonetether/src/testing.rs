//! Scripted in-memory host for tests.

use crate::{
    Authority, BoneId, BoneReader, BoneSample, ReaderFactory, ReaderFault, SubjectDirectory,
    SubjectId,
};
use glam::{Quat, Vec3};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

pub(crate) fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-4,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

pub(crate) fn assert_vec_approx(actual: Vec3, expected: Vec3) {
    let diff = (actual - expected).length();
    assert!(
        diff <= 1.0e-4,
        "expected {expected:?}, got {actual:?} (diff {diff})"
    );
}

fn finger_bones(side: f32) -> [[BoneId; 3]; 5] {
    use BoneId as B;
    if side < 0.0 {
        [
            [B::LeftThumbProximal, B::LeftThumbIntermediate, B::LeftThumbDistal],
            [B::LeftIndexProximal, B::LeftIndexIntermediate, B::LeftIndexDistal],
            [B::LeftMiddleProximal, B::LeftMiddleIntermediate, B::LeftMiddleDistal],
            [B::LeftRingProximal, B::LeftRingIntermediate, B::LeftRingDistal],
            [B::LeftLittleProximal, B::LeftLittleIntermediate, B::LeftLittleDistal],
        ]
    } else {
        [
            [B::RightThumbProximal, B::RightThumbIntermediate, B::RightThumbDistal],
            [B::RightIndexProximal, B::RightIndexIntermediate, B::RightIndexDistal],
            [B::RightMiddleProximal, B::RightMiddleIntermediate, B::RightMiddleDistal],
            [B::RightRingProximal, B::RightRingIntermediate, B::RightRingDistal],
            [B::RightLittleProximal, B::RightLittleIntermediate, B::RightLittleDistal],
        ]
    }
}

/// T-pose facing +Z with feet at `origin`; left is -X.
pub(crate) fn t_pose(origin: Vec3) -> HashMap<BoneId, BoneSample> {
    use BoneId as B;
    let mut bones = HashMap::new();
    let mut put = |bone: BoneId, p: Vec3| {
        bones.insert(bone, BoneSample::new(origin + p, Quat::IDENTITY));
    };

    put(B::Hips, Vec3::new(0.0, 1.0, 0.0));
    put(B::Spine, Vec3::new(0.0, 1.1, 0.0));
    put(B::Chest, Vec3::new(0.0, 1.25, 0.0));
    put(B::UpperChest, Vec3::new(0.0, 1.35, 0.0));
    put(B::Neck, Vec3::new(0.0, 1.5, 0.0));
    put(B::Head, Vec3::new(0.0, 1.6, 0.0));

    put(B::LeftUpperLeg, Vec3::new(-0.1, 0.95, 0.0));
    put(B::RightUpperLeg, Vec3::new(0.1, 0.95, 0.0));
    put(B::LeftLowerLeg, Vec3::new(-0.1, 0.5, 0.0));
    put(B::RightLowerLeg, Vec3::new(0.1, 0.5, 0.0));
    put(B::LeftFoot, Vec3::new(-0.1, 0.08, 0.0));
    put(B::RightFoot, Vec3::new(0.1, 0.08, 0.0));
    put(B::LeftToes, Vec3::new(-0.1, 0.02, 0.12));
    put(B::RightToes, Vec3::new(0.1, 0.02, 0.12));

    for side in [-1.0f32, 1.0] {
        let (shoulder, upper, lower, hand) = if side < 0.0 {
            (B::LeftShoulder, B::LeftUpperArm, B::LeftLowerArm, B::LeftHand)
        } else {
            (B::RightShoulder, B::RightUpperArm, B::RightLowerArm, B::RightHand)
        };
        put(shoulder, Vec3::new(0.05 * side, 1.42, 0.0));
        put(upper, Vec3::new(0.18 * side, 1.42, 0.0));
        put(lower, Vec3::new(0.45 * side, 1.42, 0.0));
        put(hand, Vec3::new(0.7 * side, 1.42, 0.0));
        for (finger, z) in finger_bones(side).into_iter().zip([0.04, 0.02, 0.0, -0.02, -0.04]) {
            put(finger[0], Vec3::new(0.74 * side, 1.42, z));
            put(finger[1], Vec3::new(0.77 * side, 1.42, z));
            put(finger[2], Vec3::new(0.79 * side, 1.42, z));
        }
    }

    bones
}

#[derive(Debug, Default)]
pub(crate) struct FakeSubject {
    pub origin: Vec3,
    pub valid: bool,
    pub bones: HashMap<BoneId, BoneSample>,
}

#[derive(Debug, Default)]
pub(crate) struct WorldData {
    pub subjects: BTreeMap<u32, FakeSubject>,
    pub faulting: HashSet<SubjectId>,
    pub stalled: bool,
    pub spawned: u32,
}

/// Host double shared with the readers it spawns.
#[derive(Clone, Debug)]
pub(crate) struct FakeHost {
    pub world: Rc<RefCell<WorldData>>,
    pub local: SubjectId,
    pub owner: bool,
    pub grant_ownership: bool,
    pub ownership_requests: u32,
    pub serializations: u32,
}

impl FakeHost {
    pub fn new(local: SubjectId) -> Self {
        Self {
            world: Rc::new(RefCell::new(WorldData::default())),
            local,
            owner: false,
            grant_ownership: true,
            ownership_requests: 0,
            serializations: 0,
        }
    }

    pub fn add_subject(&self, id: SubjectId, origin: Vec3) {
        self.world.borrow_mut().subjects.insert(
            id.0,
            FakeSubject {
                origin,
                valid: true,
                bones: t_pose(origin),
            },
        );
    }

    pub fn remove_subject(&self, id: SubjectId) {
        self.world.borrow_mut().subjects.remove(&id.0);
    }

    pub fn set_bone(&self, id: SubjectId, bone: BoneId, sample: Option<BoneSample>) {
        let mut world = self.world.borrow_mut();
        let Some(subject) = world.subjects.get_mut(&id.0) else {
            return;
        };
        match sample {
            Some(s) => {
                subject.bones.insert(bone, s);
            }
            None => {
                subject.bones.remove(&bone);
            }
        }
    }

    pub fn bone(&self, id: SubjectId, bone: BoneId) -> Option<BoneSample> {
        self.world
            .borrow()
            .subjects
            .get(&id.0)
            .and_then(|s| s.bones.get(&bone).copied())
    }

    pub fn move_subject(&self, id: SubjectId, delta: Vec3) {
        let mut world = self.world.borrow_mut();
        if let Some(subject) = world.subjects.get_mut(&id.0) {
            subject.origin += delta;
            for sample in subject.bones.values_mut() {
                sample.position += delta;
            }
        }
    }

    pub fn reader_factory(&self) -> Box<dyn ReaderFactory> {
        Box::new(FakeReaderFactory {
            world: Rc::clone(&self.world),
        })
    }
}

impl SubjectDirectory for FakeHost {
    fn nearby_subjects(&self) -> Vec<SubjectId> {
        self.world
            .borrow()
            .subjects
            .iter()
            .filter(|(_, s)| s.valid)
            .map(|(id, _)| SubjectId(*id))
            .collect()
    }

    fn is_valid(&self, subject: SubjectId) -> bool {
        self.world
            .borrow()
            .subjects
            .get(&subject.0)
            .is_some_and(|s| s.valid)
    }

    fn world_position(&self, subject: SubjectId) -> Option<Vec3> {
        self.world.borrow().subjects.get(&subject.0).map(|s| s.origin)
    }

    fn local_subject(&self) -> SubjectId {
        self.local
    }
}

impl Authority for FakeHost {
    fn is_owner(&self) -> bool {
        self.owner
    }

    fn request_ownership(&mut self) {
        self.ownership_requests += 1;
        if self.grant_ownership {
            self.owner = true;
        }
    }

    fn request_serialization(&mut self) {
        self.serializations += 1;
    }
}

pub(crate) struct FakeReaderFactory {
    world: Rc<RefCell<WorldData>>,
}

impl ReaderFactory for FakeReaderFactory {
    fn spawn(&mut self) -> Box<dyn BoneReader> {
        self.world.borrow_mut().spawned += 1;
        Box::new(FakeReader {
            world: Rc::clone(&self.world),
            token: 0,
        })
    }
}

pub(crate) struct FakeReader {
    world: Rc<RefCell<WorldData>>,
    token: u64,
}

impl BoneReader for FakeReader {
    fn read(&mut self, subject: SubjectId, bone: BoneId) -> Result<Option<BoneSample>, ReaderFault> {
        let world = self.world.borrow();
        if world.faulting.contains(&subject) {
            return Err(ReaderFault { subject });
        }
        if !world.stalled {
            self.token += 1;
        }
        Ok(world
            .subjects
            .get(&subject.0)
            .and_then(|s| s.bones.get(&bone).copied()))
    }

    fn watchdog(&self) -> u64 {
        self.token
    }
}
