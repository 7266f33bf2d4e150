//! Static humanoid bone topology and segment resolution.

use crate::{Error, Rejection, Segment, SubjectPose};
use glam::Vec3;

/// Squared length below which two joint positions are considered coincident.
const COINCIDENT_EPSILON_SQ: f32 = 1.0e-10;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(u8)]
pub enum BoneId {
    Hips,
    LeftUpperLeg,
    RightUpperLeg,
    LeftLowerLeg,
    RightLowerLeg,
    LeftFoot,
    RightFoot,
    Spine,
    Chest,
    Neck,
    Head,
    LeftShoulder,
    RightShoulder,
    LeftUpperArm,
    RightUpperArm,
    LeftLowerArm,
    RightLowerArm,
    LeftHand,
    RightHand,
    LeftToes,
    RightToes,
    LeftThumbProximal,
    LeftThumbIntermediate,
    LeftThumbDistal,
    LeftIndexProximal,
    LeftIndexIntermediate,
    LeftIndexDistal,
    LeftMiddleProximal,
    LeftMiddleIntermediate,
    LeftMiddleDistal,
    LeftRingProximal,
    LeftRingIntermediate,
    LeftRingDistal,
    LeftLittleProximal,
    LeftLittleIntermediate,
    LeftLittleDistal,
    RightThumbProximal,
    RightThumbIntermediate,
    RightThumbDistal,
    RightIndexProximal,
    RightIndexIntermediate,
    RightIndexDistal,
    RightMiddleProximal,
    RightMiddleIntermediate,
    RightMiddleDistal,
    RightRingProximal,
    RightRingIntermediate,
    RightRingDistal,
    RightLittleProximal,
    RightLittleIntermediate,
    RightLittleDistal,
    UpperChest,
}

impl BoneId {
    pub const COUNT: usize = 52;

    pub const ALL: [BoneId; Self::COUNT] = [
        Self::Hips,
        Self::LeftUpperLeg,
        Self::RightUpperLeg,
        Self::LeftLowerLeg,
        Self::RightLowerLeg,
        Self::LeftFoot,
        Self::RightFoot,
        Self::Spine,
        Self::Chest,
        Self::Neck,
        Self::Head,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftUpperArm,
        Self::RightUpperArm,
        Self::LeftLowerArm,
        Self::RightLowerArm,
        Self::LeftHand,
        Self::RightHand,
        Self::LeftToes,
        Self::RightToes,
        Self::LeftThumbProximal,
        Self::LeftThumbIntermediate,
        Self::LeftThumbDistal,
        Self::LeftIndexProximal,
        Self::LeftIndexIntermediate,
        Self::LeftIndexDistal,
        Self::LeftMiddleProximal,
        Self::LeftMiddleIntermediate,
        Self::LeftMiddleDistal,
        Self::LeftRingProximal,
        Self::LeftRingIntermediate,
        Self::LeftRingDistal,
        Self::LeftLittleProximal,
        Self::LeftLittleIntermediate,
        Self::LeftLittleDistal,
        Self::RightThumbProximal,
        Self::RightThumbIntermediate,
        Self::RightThumbDistal,
        Self::RightIndexProximal,
        Self::RightIndexIntermediate,
        Self::RightIndexDistal,
        Self::RightMiddleProximal,
        Self::RightMiddleIntermediate,
        Self::RightMiddleDistal,
        Self::RightRingProximal,
        Self::RightRingIntermediate,
        Self::RightRingDistal,
        Self::RightLittleProximal,
        Self::RightLittleIntermediate,
        Self::RightLittleDistal,
        Self::UpperChest,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Hips => "Hips",
            Self::LeftUpperLeg => "LeftUpperLeg",
            Self::RightUpperLeg => "RightUpperLeg",
            Self::LeftLowerLeg => "LeftLowerLeg",
            Self::RightLowerLeg => "RightLowerLeg",
            Self::LeftFoot => "LeftFoot",
            Self::RightFoot => "RightFoot",
            Self::Spine => "Spine",
            Self::Chest => "Chest",
            Self::Neck => "Neck",
            Self::Head => "Head",
            Self::LeftShoulder => "LeftShoulder",
            Self::RightShoulder => "RightShoulder",
            Self::LeftUpperArm => "LeftUpperArm",
            Self::RightUpperArm => "RightUpperArm",
            Self::LeftLowerArm => "LeftLowerArm",
            Self::RightLowerArm => "RightLowerArm",
            Self::LeftHand => "LeftHand",
            Self::RightHand => "RightHand",
            Self::LeftToes => "LeftToes",
            Self::RightToes => "RightToes",
            Self::LeftThumbProximal => "LeftThumbProximal",
            Self::LeftThumbIntermediate => "LeftThumbIntermediate",
            Self::LeftThumbDistal => "LeftThumbDistal",
            Self::LeftIndexProximal => "LeftIndexProximal",
            Self::LeftIndexIntermediate => "LeftIndexIntermediate",
            Self::LeftIndexDistal => "LeftIndexDistal",
            Self::LeftMiddleProximal => "LeftMiddleProximal",
            Self::LeftMiddleIntermediate => "LeftMiddleIntermediate",
            Self::LeftMiddleDistal => "LeftMiddleDistal",
            Self::LeftRingProximal => "LeftRingProximal",
            Self::LeftRingIntermediate => "LeftRingIntermediate",
            Self::LeftRingDistal => "LeftRingDistal",
            Self::LeftLittleProximal => "LeftLittleProximal",
            Self::LeftLittleIntermediate => "LeftLittleIntermediate",
            Self::LeftLittleDistal => "LeftLittleDistal",
            Self::RightThumbProximal => "RightThumbProximal",
            Self::RightThumbIntermediate => "RightThumbIntermediate",
            Self::RightThumbDistal => "RightThumbDistal",
            Self::RightIndexProximal => "RightIndexProximal",
            Self::RightIndexIntermediate => "RightIndexIntermediate",
            Self::RightIndexDistal => "RightIndexDistal",
            Self::RightMiddleProximal => "RightMiddleProximal",
            Self::RightMiddleIntermediate => "RightMiddleIntermediate",
            Self::RightMiddleDistal => "RightMiddleDistal",
            Self::RightRingProximal => "RightRingProximal",
            Self::RightRingIntermediate => "RightRingIntermediate",
            Self::RightRingDistal => "RightRingDistal",
            Self::RightLittleProximal => "RightLittleProximal",
            Self::RightLittleIntermediate => "RightLittleIntermediate",
            Self::RightLittleDistal => "RightLittleDistal",
            Self::UpperChest => "UpperChest",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|b| b.name() == name)
            .ok_or_else(|| Error::UnknownBone {
                name: name.to_string(),
            })
    }
}

/// Where the linearization of a bone continues.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Link {
    Bone(BoneId),
    /// Terminal: the bone is treated as a point.
    Sphere,
    /// The bone never produces a segment.
    Excluded,
}

/// Which hand a bone belongs to, for self-attachment rejection.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum Side {
    Left,
    Right,
    #[default]
    None,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BoneDescriptor {
    pub id: BoneId,
    pub linearization_child: Link,
    pub length_reference_parent: Option<BoneId>,
    pub side: Side,
}

impl BoneDescriptor {
    const fn new(id: BoneId, child: Link, reference: Option<BoneId>, side: Side) -> Self {
        Self {
            id,
            linearization_child: child,
            length_reference_parent: reference,
            side,
        }
    }

    pub fn is_excluded(&self) -> bool {
        self.linearization_child == Link::Excluded
    }
}

/// One finger chain: proximal -> intermediate -> distal, distal extrapolated
/// from the intermediate phalanx.
fn finger(
    out: &mut Vec<BoneDescriptor>,
    [proximal, intermediate, distal]: [BoneId; 3],
    side: Side,
) {
    out.push(BoneDescriptor::new(
        proximal,
        Link::Bone(intermediate),
        None,
        side,
    ));
    out.push(BoneDescriptor::new(
        intermediate,
        Link::Bone(distal),
        None,
        side,
    ));
    out.push(BoneDescriptor::new(
        distal,
        Link::Sphere,
        Some(intermediate),
        side,
    ));
}

fn humanoid_descriptors() -> Vec<BoneDescriptor> {
    use BoneId as B;
    use Link::{Bone, Excluded, Sphere};

    let mut d = vec![
        BoneDescriptor::new(B::Hips, Bone(B::Spine), None, Side::None),
        BoneDescriptor::new(B::LeftUpperLeg, Bone(B::LeftLowerLeg), None, Side::None),
        BoneDescriptor::new(B::RightUpperLeg, Bone(B::RightLowerLeg), None, Side::None),
        BoneDescriptor::new(B::LeftLowerLeg, Bone(B::LeftFoot), None, Side::None),
        BoneDescriptor::new(B::RightLowerLeg, Bone(B::RightFoot), None, Side::None),
        BoneDescriptor::new(B::LeftFoot, Bone(B::LeftToes), None, Side::None),
        BoneDescriptor::new(B::RightFoot, Bone(B::RightToes), None, Side::None),
        BoneDescriptor::new(B::Spine, Bone(B::Chest), None, Side::None),
        BoneDescriptor::new(B::Chest, Bone(B::UpperChest), None, Side::None),
        BoneDescriptor::new(B::Neck, Bone(B::Head), None, Side::None),
        BoneDescriptor::new(B::Head, Sphere, Some(B::Neck), Side::None),
        BoneDescriptor::new(B::LeftShoulder, Bone(B::LeftUpperArm), None, Side::None),
        BoneDescriptor::new(B::RightShoulder, Bone(B::RightUpperArm), None, Side::None),
        BoneDescriptor::new(B::LeftUpperArm, Bone(B::LeftLowerArm), None, Side::Left),
        BoneDescriptor::new(B::RightUpperArm, Bone(B::RightLowerArm), None, Side::Right),
        BoneDescriptor::new(B::LeftLowerArm, Bone(B::LeftHand), None, Side::Left),
        BoneDescriptor::new(B::RightLowerArm, Bone(B::RightHand), None, Side::Right),
        BoneDescriptor::new(B::LeftHand, Bone(B::LeftMiddleProximal), None, Side::Left),
        BoneDescriptor::new(B::RightHand, Bone(B::RightMiddleProximal), None, Side::Right),
        BoneDescriptor::new(B::LeftToes, Excluded, None, Side::None),
        BoneDescriptor::new(B::RightToes, Excluded, None, Side::None),
    ];

    finger(&mut d, [B::LeftThumbProximal, B::LeftThumbIntermediate, B::LeftThumbDistal], Side::Left);
    finger(&mut d, [B::LeftIndexProximal, B::LeftIndexIntermediate, B::LeftIndexDistal], Side::Left);
    finger(&mut d, [B::LeftMiddleProximal, B::LeftMiddleIntermediate, B::LeftMiddleDistal], Side::Left);
    finger(&mut d, [B::LeftRingProximal, B::LeftRingIntermediate, B::LeftRingDistal], Side::Left);
    finger(&mut d, [B::LeftLittleProximal, B::LeftLittleIntermediate, B::LeftLittleDistal], Side::Left);
    finger(&mut d, [B::RightThumbProximal, B::RightThumbIntermediate, B::RightThumbDistal], Side::Right);
    finger(&mut d, [B::RightIndexProximal, B::RightIndexIntermediate, B::RightIndexDistal], Side::Right);
    finger(&mut d, [B::RightMiddleProximal, B::RightMiddleIntermediate, B::RightMiddleDistal], Side::Right);
    finger(&mut d, [B::RightRingProximal, B::RightRingIntermediate, B::RightRingDistal], Side::Right);
    finger(&mut d, [B::RightLittleProximal, B::RightLittleIntermediate, B::RightLittleDistal], Side::Right);

    d.push(BoneDescriptor::new(B::UpperChest, Bone(B::Neck), None, Side::None));
    d
}

/// Validated, immutable bone table indexed by [`BoneId`].
#[derive(Clone, Debug)]
pub struct Topology {
    descriptors: Vec<BoneDescriptor>,
}

impl Topology {
    pub fn humanoid() -> Result<Self, Error> {
        Self::from_descriptors(humanoid_descriptors())
    }

    /// Validates that descriptors are stored at their bone's index and that no
    /// linearization chain cycles.
    pub fn from_descriptors(descriptors: Vec<BoneDescriptor>) -> Result<Self, Error> {
        if descriptors.len() != BoneId::COUNT {
            return Err(Error::TopologyMisplacedBone {
                index: descriptors.len().min(BoneId::COUNT),
                bone: format!("<{} descriptors>", descriptors.len()),
            });
        }
        for (index, d) in descriptors.iter().enumerate() {
            if d.id.index() != index {
                return Err(Error::TopologyMisplacedBone {
                    index,
                    bone: d.id.name().to_string(),
                });
            }
        }

        for start in BoneId::ALL {
            let mut link = descriptors[start.index()].linearization_child;
            let mut steps = 0usize;
            while let Link::Bone(next) = link {
                steps += 1;
                if next == start || steps > BoneId::COUNT {
                    return Err(Error::TopologyCycle {
                        bone: start.name().to_string(),
                    });
                }
                link = descriptors[next.index()].linearization_child;
            }
        }

        Ok(Self { descriptors })
    }

    pub fn descriptor(&self, bone: BoneId) -> &BoneDescriptor {
        &self.descriptors[bone.index()]
    }

    pub fn descriptors(&self) -> &[BoneDescriptor] {
        &self.descriptors
    }

    pub fn side(&self, bone: BoneId) -> Side {
        self.descriptor(bone).side
    }

    pub fn resolve_segment(&self, bone: BoneId, pose: &SubjectPose) -> Result<Segment, Rejection> {
        let desc = self.descriptor(bone);
        if desc.is_excluded() {
            return Err(Rejection::Excluded);
        }
        let root = pose.position(bone).ok_or(Rejection::Unavailable)?;

        match bone {
            BoneId::Hips => return Ok(self.hips_segment(root, pose)),
            BoneId::Head => return Ok(self.head_segment(root, pose)),
            _ => {}
        }

        if let Some(child) = self.first_available_child(desc.linearization_child, root, pose) {
            return Ok(Segment::line(root, child));
        }

        if let Some(parent) = desc.length_reference_parent.and_then(|p| pose.position(p)) {
            let extension = root - parent;
            if extension.length_squared() > COINCIDENT_EPSILON_SQ {
                return Ok(Segment::line(root, root + extension));
            }
        }

        Ok(Segment::point(root))
    }

    fn first_available_child(&self, mut link: Link, root: Vec3, pose: &SubjectPose) -> Option<Vec3> {
        while let Link::Bone(next) = link {
            match pose.position(next) {
                Some(p) if (p - root).length_squared() > COINCIDENT_EPSILON_SQ => return Some(p),
                _ => {}
            }
            link = self.descriptor(next).linearization_child;
        }
        None
    }

    /// Capsule from the spine down through the pelvis, twice the hips->spine length.
    fn hips_segment(&self, root: Vec3, pose: &SubjectPose) -> Segment {
        let hips = self.descriptor(BoneId::Hips);
        let Some(spine) = self.first_available_child(hips.linearization_child, root, pose) else {
            return Segment::point(root);
        };

        let legs = (
            pose.position(BoneId::LeftUpperLeg),
            pose.position(BoneId::RightUpperLeg),
        );
        if let (Some(left), Some(right)) = legs {
            let mid = (left + right) * 0.5;
            let dir = (mid - spine).normalize_or_zero();
            if dir != Vec3::ZERO {
                let length = 2.0 * (spine - root).length();
                return Segment::line(spine, spine + dir * length);
            }
        }

        Segment::line(root, spine)
    }

    /// Head axis best aligned with neck->head, independent of rig authoring.
    fn head_segment(&self, root: Vec3, pose: &SubjectPose) -> Segment {
        let head = self.descriptor(BoneId::Head);
        let (Some(sample), Some(neck)) = (
            pose.sample(BoneId::Head),
            head.length_reference_parent.and_then(|p| pose.position(p)),
        ) else {
            return Segment::point(root);
        };

        let along = root - neck;
        let length = along.length();
        if length * length <= COINCIDENT_EPSILON_SQ {
            return Segment::point(root);
        }
        let dir = along / length;

        let axes = [
            sample.rotation * Vec3::Y,
            sample.rotation * Vec3::Z,
            sample.rotation * Vec3::X,
        ];
        let mut best = axes[0];
        let mut best_dot = best.dot(dir);
        for axis in &axes[1..] {
            let dot = axis.dot(dir);
            if dot.abs() > best_dot.abs() {
                best = *axis;
                best_dot = dot;
            }
        }
        if best_dot < 0.0 {
            best = -best;
        }

        Segment::line(root, root + best * length)
    }
}
