use crate::{
    BoneId, BoneScan, BoneTarget, CandidateHeap, CandidateKey, Edge, Error, Evaluator, Host, Pose,
    Probe, ReaderFactory, ReaderSupervisor, Settings, Side, SlotMap, SubjectId, TargetSearch,
    Topology, Trigger,
};
use glam::{Quat, Vec3};
use std::collections::VecDeque;
use std::sync::Arc;

/// Slack when comparing elapsed blend time against its duration.
const BLEND_EPSILON: f64 = 1.0e-9;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum AttachmentState {
    #[default]
    Idle,
    HeldLocal,
    HeldRemote,
    Tracking,
}

/// The replicated record. Only the authority holder mutates it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReplicatedState {
    target: Option<BoneTarget>,
    pub offset_position: Vec3,
    pub offset_rotation: Quat,
    pub sequence: u32,
    /// Set while some participant holds the object.
    pub held: bool,
}

impl Default for ReplicatedState {
    fn default() -> Self {
        Self {
            target: None,
            offset_position: Vec3::ZERO,
            offset_rotation: Quat::IDENTITY,
            sequence: 0,
            held: false,
        }
    }
}

impl ReplicatedState {
    /// Builds a record from separately replicated fields. A subject without a
    /// bone (or the reverse) is read as no target.
    pub fn from_fields(
        subject: Option<SubjectId>,
        bone: Option<BoneId>,
        offset_position: Vec3,
        offset_rotation: Quat,
        sequence: u32,
        held: bool,
    ) -> Self {
        let target = match (subject, bone) {
            (Some(subject), Some(bone)) => Some(BoneTarget { subject, bone }),
            _ => None,
        };
        Self {
            target,
            offset_position,
            offset_rotation,
            sequence,
            held,
        }
    }

    pub fn target(&self) -> Option<BoneTarget> {
        self.target
    }

    pub fn target_subject(&self) -> Option<SubjectId> {
        self.target.map(|t| t.subject)
    }

    pub fn target_bone(&self) -> Option<BoneId> {
        self.target.map(|t| t.bone)
    }

    /// Offset of the attachable in the target bone's local frame.
    pub fn offset(&self) -> Pose {
        Pose::new(self.offset_position, self.offset_rotation)
    }

    fn commit(&mut self, target: Option<BoneTarget>, offset: Pose) {
        self.target = target;
        self.offset_position = offset.position;
        self.offset_rotation = offset.rotation;
        self.sequence = self.sequence.wrapping_add(1);
    }
}

/// Per-tick input from the host.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameInput {
    pub now: f64,
    /// World pose of the attachable; its local +Z is the probe direction.
    pub object_pose: Pose,
    pub select: bool,
    pub change_subject: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MarkerColor {
    /// Best candidate, not yet locked.
    Candidate,
    Locked,
    /// Locked, but currently out of range.
    Invalid,
}

/// Selection marker shown while holding. `None` from [`Attachment::marker`]
/// means hidden.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Marker {
    pub subject: SubjectId,
    pub bone: BoneId,
    pub position: Vec3,
    pub color: MarkerColor,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameOutput {
    pub state: AttachmentState,
    /// World pose to apply, present only while visibly following a bone.
    pub pose: Option<Pose>,
    pub marker: Option<Marker>,
}

/// Visible side effects, applied at the start of the next tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Deferred {
    Follow,
    Release,
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct Blend {
    from: Pose,
    started_at: f64,
    duration: f64,
}

/// Pickup/track/sync state machine for one attachable object.
#[derive(Debug)]
pub struct Attachment {
    settings: Arc<Settings>,
    evaluator: Evaluator,
    state: AttachmentState,
    replicated: ReplicatedState,
    /// Last record known to be authoritative, restored on an authority conflict.
    resync: ReplicatedState,
    applied_sequence: Option<u32>,
    world_pose: Option<Pose>,
    blend: Option<Blend>,
    heap: CandidateHeap,
    slots: SlotMap,
    search: TargetSearch,
    scan: Option<BoneScan>,
    reader: ReaderSupervisor,
    locked: Option<CandidateKey>,
    seed: Option<BoneTarget>,
    held_side: Side,
    select: Trigger,
    change: Trigger,
    last_advance_at: Option<f64>,
    /// Advance requested by the current press, run on release unless the
    /// press turns into a long press.
    advance_pending: bool,
    deferred: VecDeque<Deferred>,
    following: bool,
    enabled: bool,
}

impl Attachment {
    pub fn new(
        settings: Settings,
        topology: Arc<Topology>,
        reader_factory: Box<dyn ReaderFactory>,
    ) -> Result<Self, Error> {
        settings.validate()?;
        let settings = Arc::new(settings);
        Ok(Self {
            evaluator: Evaluator::new(topology, settings.range, settings.directionality),
            search: TargetSearch::new(&settings),
            reader: ReaderSupervisor::new(reader_factory, settings.reader_fault_cooldown_seconds),
            settings,
            state: AttachmentState::Idle,
            replicated: ReplicatedState::default(),
            resync: ReplicatedState::default(),
            applied_sequence: None,
            world_pose: None,
            blend: None,
            heap: CandidateHeap::new(),
            slots: SlotMap::new(),
            scan: None,
            locked: None,
            seed: None,
            held_side: Side::None,
            select: Trigger::default(),
            change: Trigger::default(),
            last_advance_at: None,
            advance_pending: false,
            deferred: VecDeque::new(),
            following: false,
            enabled: true,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> AttachmentState {
        self.state
    }

    pub fn replicated(&self) -> &ReplicatedState {
        &self.replicated
    }

    pub fn heap(&self) -> &CandidateHeap {
        &self.heap
    }

    pub fn reader(&self) -> &ReaderSupervisor {
        &self.reader
    }

    pub fn world_pose(&self) -> Option<Pose> {
        self.world_pose
    }

    pub fn is_following(&self) -> bool {
        self.following
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Subject the bone scan currently runs against.
    pub fn scan_subject(&self) -> Option<SubjectId> {
        self.scan.as_ref().map(BoneScan::subject)
    }

    pub fn locked(&self) -> Option<BoneTarget> {
        let key = self.locked?;
        Some(BoneTarget {
            subject: self.slots.subject(key.slot)?,
            bone: key.bone,
        })
    }

    /// Disabling abandons any running search; tracking keeps running.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        if !enabled {
            self.abandon_search();
        }
        log::debug!("attachment enabled: {enabled}");
    }

    fn state_from_replicated(&self) -> AttachmentState {
        if self.replicated.held {
            AttachmentState::HeldRemote
        } else if self.replicated.target().is_some() {
            AttachmentState::Tracking
        } else {
            AttachmentState::Idle
        }
    }

    fn set_state(&mut self, state: AttachmentState) {
        if self.state != state {
            log::debug!("attachment state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
        if state != AttachmentState::Tracking {
            self.world_pose = None;
            self.blend = None;
        }
        let follow = state == AttachmentState::Tracking;
        let pending = self
            .deferred
            .back()
            .map_or(self.following, |d| *d == Deferred::Follow);
        if follow != pending {
            self.deferred.push_back(if follow {
                Deferred::Follow
            } else {
                Deferred::Release
            });
        }
    }

    pub fn on_pickup<H: Host + ?Sized>(&mut self, host: &mut H, hand: Side, now: f64) {
        if !self.enabled || self.state == AttachmentState::HeldLocal {
            return;
        }
        host.request_ownership();

        self.resync = self.replicated;
        self.seed = self.replicated.target();
        self.abandon_search();
        self.replicated.commit(None, Pose::IDENTITY);
        self.replicated.held = true;
        self.held_side = hand;
        self.search.invalidate();
        self.set_state(AttachmentState::HeldLocal);
        host.request_serialization();

        if let Some(seed) = self.seed {
            if host.is_valid(seed.subject) {
                self.search.set_manual_selection(Some(seed.subject));
                self.start_scan(seed.subject);
            } else {
                self.seed = None;
            }
        }
        log::debug!("picked up (seed {:?}) at {now}", self.seed);
    }

    pub fn on_drop<H: Host + ?Sized>(&mut self, host: &mut H, object_pose: Pose, now: f64) {
        if self.state != AttachmentState::HeldLocal {
            return;
        }

        if !host.is_owner() {
            log::warn!("drop without authority; resyncing from replicated state");
            self.force_drop();
            return;
        }

        let committed = self.commit_lock(object_pose, host, now);
        self.abandon_search();
        self.held_side = Side::None;
        self.replicated.held = false;
        self.world_pose = Some(object_pose);

        if committed {
            self.set_state(AttachmentState::Tracking);
        } else {
            if self.replicated.target().is_some() {
                self.replicated.commit(None, Pose::IDENTITY);
            }
            self.set_state(AttachmentState::Idle);
        }
        host.request_serialization();
    }

    /// Freezes the locked candidate into a bone-relative offset, re-measuring
    /// it against the release pose first.
    fn commit_lock<H: Host + ?Sized>(&mut self, object_pose: Pose, host: &H, now: f64) -> bool {
        let Some(key) = self.locked else {
            return false;
        };
        let Some(subject) = self.slots.subject(key.slot) else {
            return false;
        };
        if !host.is_valid(subject) {
            return false;
        }
        let Some(pose) = self.reader.read_pose(subject, now) else {
            return false;
        };

        let probe = Probe::new(object_pose.position, object_pose.rotation * Vec3::Z);
        let held_side = if subject == host.local_subject() {
            self.held_side
        } else {
            Side::None
        };
        if let Err(rejection) = self.evaluator.evaluate(&pose, key.bone, &probe, held_side) {
            log::debug!("locked {:?} rejected at release: {rejection:?}", key.bone);
            return false;
        }
        let Some(bone) = pose.sample(key.bone) else {
            return false;
        };

        let offset = bone.pose().inverse_transform(&object_pose);
        let target = BoneTarget {
            subject,
            bone: key.bone,
        };
        self.replicated.commit(Some(target), offset);
        log::debug!("committed {target:?} (sequence {})", self.replicated.sequence);
        true
    }

    pub fn update<H: Host + ?Sized>(&mut self, host: &mut H, input: &FrameInput) -> FrameOutput {
        let now = input.now;
        self.reader.begin_tick(now);

        while let Some(action) = self.deferred.pop_front() {
            match action {
                Deferred::Follow => self.following = true,
                Deferred::Release => {
                    self.following = false;
                    self.blend = None;
                }
            }
        }

        match self.state {
            AttachmentState::HeldLocal => {
                if self.enabled {
                    self.tick_held(host, input);
                }
            }
            AttachmentState::Tracking => self.tick_tracking(host, now),
            AttachmentState::Idle | AttachmentState::HeldRemote => {}
        }

        FrameOutput {
            state: self.state,
            pose: if self.following && self.state == AttachmentState::Tracking {
                self.world_pose
            } else {
                None
            },
            marker: self.marker(),
        }
    }

    fn tick_held<H: Host + ?Sized>(&mut self, host: &mut H, input: &FrameInput) {
        let now = input.now;
        let probe = Probe::new(
            input.object_pose.position,
            input.object_pose.rotation * Vec3::Z,
        );
        self.handle_input(host, &probe, input);

        let timed_out = self
            .heap
            .blocklist()
            .touched_at()
            .is_some_and(|at| now - at > self.settings.blocklist_timeout_seconds);
        if timed_out {
            log::debug!("blocklist inactive; clearing");
            self.heap.clear_blocklist();
        }

        let departed: Vec<SubjectId> = self
            .slots
            .subjects()
            .map(|(s, _)| s)
            .filter(|&s| !host.is_valid(s))
            .collect();
        for subject in departed {
            self.forget_subject(subject);
        }
        // Follow the preferred subject between passes, unless a lock pins
        // the current one.
        let retarget = match self.scan.as_ref() {
            Some(scan) => scan.at_pass_start() && self.locked.is_none(),
            None => true,
        };
        if retarget {
            let current = self.scan_subject();
            if let Some(next) = self.search.find_next_subject(host, probe.origin, None, now) {
                if Some(next) != current {
                    if let Some(previous) = current {
                        self.release_subject(previous);
                    }
                    self.start_scan(next);
                }
            }
        }

        let local = host.local_subject();
        let Some(scan) = self.scan.as_mut() else {
            return;
        };

        if scan.at_pass_start()
            && self.heap.valid_len() < self.settings.min_usable_candidates
            && !self.heap.blocklist().is_empty()
        {
            log::debug!(
                "fewer than {} candidates; clearing blocklist",
                self.settings.min_usable_candidates
            );
            self.heap.clear_blocklist();
        }

        let held_side = if scan.subject() == local {
            self.held_side
        } else {
            Side::None
        };
        let passes_before = scan.passes();
        let Some(batch) = scan.step(
            &mut self.reader,
            &self.evaluator,
            &probe,
            held_side,
            self.settings.bones_per_tick,
            now,
        ) else {
            return;
        };
        let pass_completed = scan.passes() != passes_before;
        let slot = scan.slot();

        self.heap.apply_batch(
            &batch,
            self.locked,
            self.settings.secondary_candidate_multiplier,
        );

        if let Some(seed) = self.seed {
            let key = CandidateKey::new(slot, seed.bone);
            let seeded = self.slots.subject(slot) == Some(seed.subject);
            if seeded && self.locked.is_none() && self.heap.get(key).is_some_and(|c| c.valid) {
                self.locked = Some(key);
                self.seed = None;
            } else if pass_completed {
                self.seed = None;
            }
        }
    }

    fn handle_input<H: Host + ?Sized>(&mut self, host: &mut H, probe: &Probe, input: &FrameInput) {
        let now = input.now;
        match self.select.update(input.select, now) {
            Edge::Pressed if self.locked.is_none() => self.select_or_advance(now),
            Edge::Pressed => self.advance_pending = true,
            Edge::Released => {
                if std::mem::take(&mut self.advance_pending) && self.locked.is_some() {
                    self.select_or_advance(now);
                }
            }
            Edge::None => {}
        }
        if self.change.update(input.change_subject, now) == Edge::Pressed {
            self.change_subject(host, probe, now);
        }
        if self.locked.is_some()
            && self
                .select
                .take_long_press(now, self.settings.long_press_seconds)
        {
            log::debug!("long press; releasing bone lock");
            self.locked = None;
            self.advance_pending = false;
        }
    }

    fn best_valid_key(&self) -> Option<CandidateKey> {
        self.heap.best().filter(|c| c.valid).map(|c| c.key)
    }

    fn select_or_advance(&mut self, now: f64) {
        match self.locked {
            None => {
                self.locked = self.best_valid_key();
            }
            Some(current) => {
                let stale = self
                    .last_advance_at
                    .is_none_or(|at| now - at > self.settings.advance_restart_seconds);
                if stale {
                    self.heap.clear_blocklist();
                    if let Some(scan) = self.scan.as_mut() {
                        scan.restart();
                    }
                } else {
                    self.heap.forbid_bone(current, now);
                }
                self.locked = self.best_valid_key();
            }
        }
        self.last_advance_at = Some(now);
        log::debug!("lock -> {:?}", self.locked);
    }

    fn change_subject<H: Host + ?Sized>(&mut self, host: &H, probe: &Probe, now: f64) {
        self.locked = None;
        self.seed = None;

        let current = self.scan_subject();
        if let Some(slot) = current.and_then(|c| self.slots.get(c)) {
            self.heap.forbid_subject(slot, now);
        }

        match self.search.find_next_subject(host, probe.origin, current, now) {
            Some(next) => {
                self.search.set_manual_selection(Some(next));
                self.start_scan(next);
            }
            None => self.scan = None,
        }
        log::debug!("subject {current:?} -> {:?}", self.scan_subject());
    }

    fn start_scan(&mut self, subject: SubjectId) {
        let Some(slot) = self.slots.acquire(subject) else {
            self.scan = None;
            return;
        };
        if self.heap.blocklist().contains_subject(slot) {
            self.heap.clear_subject(slot);
        }
        self.scan = Some(BoneScan::new(subject, slot));
    }

    /// The subject left: drop its heap state and reclaim its slot.
    fn forget_subject(&mut self, subject: SubjectId) {
        if let Some(slot) = self.slots.release(subject) {
            self.heap.clear_subject(slot);
            if self.locked.is_some_and(|k| k.slot == slot) {
                self.locked = None;
            }
        }
        if self.scan_subject() == Some(subject) {
            self.scan = None;
        }
        log::debug!("subject {subject:?} departed");
    }

    /// Stops scanning a subject that is still present; it may come back later
    /// under a fresh slot.
    fn release_subject(&mut self, subject: SubjectId) {
        if let Some(slot) = self.slots.release(subject) {
            self.heap.clear_subject(slot);
        }
        if self.scan_subject() == Some(subject) {
            self.scan = None;
        }
        log::debug!("scan moved off {subject:?}");
    }

    /// Cancels any in-progress scan without leaving heap state behind.
    fn abandon_search(&mut self) {
        self.scan = None;
        let subjects: Vec<SubjectId> = self.slots.subjects().map(|(s, _)| s).collect();
        for subject in subjects {
            if let Some(slot) = self.slots.release(subject) {
                self.heap.clear_subject(slot);
            }
        }
        self.heap.clear_blocklist();
        self.locked = None;
        self.select.reset();
        self.change.reset();
        self.last_advance_at = None;
        self.advance_pending = false;
    }

    fn clear_tracking<H: Host + ?Sized>(&mut self, host: &mut H) {
        self.replicated.commit(None, Pose::IDENTITY);
        self.applied_sequence = Some(self.replicated.sequence);
        self.set_state(AttachmentState::Idle);
        host.request_serialization();
    }

    fn tick_tracking<H: Host + ?Sized>(&mut self, host: &mut H, now: f64) {
        let Some(target) = self.replicated.target() else {
            self.set_state(AttachmentState::Idle);
            return;
        };

        let sample = if host.is_valid(target.subject) {
            match self.reader.read_bone(target.subject, target.bone, now) {
                Ok(sample) => sample,
                // The supervisor recovers the reader; hold the last pose meanwhile.
                Err(_) => return,
            }
        } else {
            None
        };
        let Some(sample) = sample else {
            if host.is_owner() {
                log::debug!("tracked bone {target:?} gone; clearing");
                self.clear_tracking(host);
            }
            return;
        };

        let goal = sample.pose().transform(&self.replicated.offset());

        if self.applied_sequence != Some(self.replicated.sequence) {
            self.blend = match self.world_pose {
                Some(from) if self.settings.blend_seconds > 0.0 => Some(Blend {
                    from,
                    started_at: now,
                    duration: self.settings.blend_seconds,
                }),
                _ => None,
            };
            self.applied_sequence = Some(self.replicated.sequence);
        }

        let pose = match self.blend {
            Some(blend) => {
                let elapsed = now - blend.started_at;
                if elapsed + BLEND_EPSILON >= blend.duration {
                    self.blend = None;
                    goal
                } else {
                    blend.from.lerp_slerp(&goal, (elapsed / blend.duration) as f32)
                }
            }
            None => goal,
        };
        self.world_pose = Some(pose);
    }

    /// Host callback when a replicated record arrives.
    pub fn on_deserialization<H: Host + ?Sized>(&mut self, host: &mut H, record: ReplicatedState) {
        if self.state == AttachmentState::HeldLocal {
            log::debug!("replicated record arrived while held locally; kept for resync");
            self.resync = record;
            return;
        }
        self.replicated = record;
        self.resync = record;
        if host.is_owner() {
            self.revalidate_as_owner(host);
        } else {
            let state = self.state_from_replicated();
            self.set_state(state);
        }
    }

    pub fn on_ownership_transferred<H: Host + ?Sized>(&mut self, host: &mut H) {
        if host.is_owner() {
            self.revalidate_as_owner(host);
        } else if self.state == AttachmentState::HeldLocal {
            log::warn!("lost authority while holding; forcing drop");
            self.force_drop();
        }
    }

    /// Abandons the local hold and falls back to the last authoritative record.
    fn force_drop(&mut self) {
        self.abandon_search();
        self.held_side = Side::None;
        self.seed = None;
        self.replicated = self.resync;
        let state = self.state_from_replicated();
        self.set_state(state);
    }

    /// New authority holder: clear a stale held flag and re-check tracking.
    fn revalidate_as_owner<H: Host + ?Sized>(&mut self, host: &mut H) {
        if self.state == AttachmentState::HeldLocal {
            return;
        }
        let mut changed = false;
        if self.replicated.held {
            log::debug!("clearing stale held flag");
            self.replicated.held = false;
            changed = true;
        }
        if let Some(target) = self.replicated.target() {
            if !host.is_valid(target.subject) {
                self.replicated.commit(None, Pose::IDENTITY);
                changed = true;
            }
        }
        let state = self.state_from_replicated();
        self.set_state(state);
        if changed {
            host.request_serialization();
        }
    }

    /// Selection feedback; `None` while nothing is shown.
    pub fn marker(&self) -> Option<Marker> {
        if self.state != AttachmentState::HeldLocal || !self.enabled {
            return None;
        }
        let (key, locked) = match self.locked {
            Some(key) => (key, true),
            None => (self.best_valid_key()?, false),
        };
        let candidate = self.heap.get(key)?;
        let color = match (locked, candidate.valid) {
            (false, _) => MarkerColor::Candidate,
            (true, true) => MarkerColor::Locked,
            (true, false) => MarkerColor::Invalid,
        };
        Some(Marker {
            subject: self.slots.subject(key.slot)?,
            bone: key.bone,
            position: candidate.nearest,
            color,
        })
    }
}
