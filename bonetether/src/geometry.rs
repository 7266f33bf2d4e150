use crate::{BoneId, Side, SubjectPose, Topology};
use glam::Vec3;
use std::sync::Arc;

/// Line-segment (or point) approximation of a bone.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Segment {
    pub root: Vec3,
    pub child: Option<Vec3>,
}

impl Segment {
    pub fn line(root: Vec3, child: Vec3) -> Self {
        Self {
            root,
            child: Some(child),
        }
    }

    pub fn point(root: Vec3) -> Self {
        Self { root, child: None }
    }

    pub fn has_child(&self) -> bool {
        self.child.is_some()
    }

    /// Same segment with endpoints swapped. Points are returned unchanged.
    pub fn reversed(&self) -> Self {
        match self.child {
            Some(child) => Self::line(child, self.root),
            None => *self,
        }
    }

    pub fn length(&self) -> f32 {
        self.child.map_or(0.0, |c| (c - self.root).length())
    }
}

pub fn closest_point_on_segment(p: Vec3, segment: &Segment) -> Vec3 {
    let Some(child) = segment.child else {
        return segment.root;
    };
    let ab = child - segment.root;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return segment.root;
    }
    let t = ((p - segment.root).dot(ab) / len_sq).clamp(0.0, 1.0);
    segment.root + ab * t
}

pub fn point_segment_distance(p: Vec3, segment: &Segment) -> f32 {
    (closest_point_on_segment(p, segment) - p).length()
}

/// Origin and forward axis of the held object.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Probe {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Probe {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Distance {
    pub adjusted: f32,
    pub true_distance: f32,
    pub nearest: Vec3,
}

/// Point-to-segment distance, discounted by how far the nearest point lies
/// ahead of the probe. `weight` is clamped to [0, 1], so the adjusted distance
/// never drops below zero.
pub fn distance(probe: &Probe, weight: f32, segment: &Segment) -> Distance {
    let nearest = closest_point_on_segment(probe.origin, segment);
    let to_nearest = nearest - probe.origin;
    let true_distance = to_nearest.length();
    let ahead = to_nearest
        .dot(probe.direction.normalize_or_zero())
        .max(0.0);
    Distance {
        adjusted: true_distance - weight.clamp(0.0, 1.0) * ahead,
        true_distance,
        nearest,
    }
}

/// Result of measuring one bone against the probe.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub bone: BoneId,
    pub adjusted_distance: f32,
    pub true_distance: f32,
    pub nearest: Vec3,
    /// Nearest point expressed in the bone's local frame.
    pub local_child_offset: Vec3,
}

/// Why a bone is not a candidate.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Rejection {
    Excluded,
    Unavailable,
    /// The bone belongs to the arm whose hand holds the probe.
    HeldByProbe,
    /// Measured, but beyond the search range.
    OutOfRange(Evaluation),
}

#[derive(Clone, Debug)]
pub struct Evaluator {
    topology: Arc<Topology>,
    pub range: f32,
    pub directionality: f32,
}

impl Evaluator {
    pub fn new(topology: Arc<Topology>, range: f32, directionality: f32) -> Self {
        Self {
            topology,
            range,
            directionality,
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// `held_side` is the hand holding the probe when `pose` is the local
    /// user's own skeleton.
    pub fn evaluate(
        &self,
        pose: &SubjectPose,
        bone: BoneId,
        probe: &Probe,
        held_side: Side,
    ) -> Result<Evaluation, Rejection> {
        if held_side != Side::None && self.topology.side(bone) == held_side {
            return Err(Rejection::HeldByProbe);
        }

        let segment = self.topology.resolve_segment(bone, pose)?;
        let d = distance(probe, self.directionality, &segment);
        let local_child_offset = pose
            .sample(bone)
            .map(|s| s.rotation.inverse() * (d.nearest - s.position))
            .unwrap_or(Vec3::ZERO);

        let evaluation = Evaluation {
            bone,
            adjusted_distance: d.adjusted,
            true_distance: d.true_distance,
            nearest: d.nearest,
            local_child_offset,
        };
        if d.true_distance > self.range {
            return Err(Rejection::OutOfRange(evaluation));
        }
        Ok(evaluation)
    }
}
