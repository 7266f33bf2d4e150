use crate::{
    BatchEntry, BoneId, CandidateHeap, CandidateKey, Evaluation, RankedCandidate, Rejection, Slot,
};
use glam::Vec3;
use proptest::prelude::*;

fn key(slot: u16, bone: BoneId) -> CandidateKey {
    CandidateKey::new(Slot(slot), bone)
}

fn evaluation(bone: BoneId, d: f32) -> Evaluation {
    Evaluation {
        bone,
        adjusted_distance: d,
        true_distance: d,
        nearest: Vec3::new(d, 0.0, 0.0),
        local_child_offset: Vec3::ZERO,
    }
}

fn candidate(k: CandidateKey, d: f32) -> RankedCandidate {
    RankedCandidate::from_evaluation(k, &evaluation(k.bone, d), true)
}

fn hit(k: CandidateKey, d: f32) -> BatchEntry {
    BatchEntry {
        key: k,
        outcome: Ok(evaluation(k.bone, d)),
    }
}

fn out_of_range(k: CandidateKey, d: f32) -> BatchEntry {
    BatchEntry {
        key: k,
        outcome: Err(Rejection::OutOfRange(evaluation(k.bone, d))),
    }
}

#[test]
fn best_candidate_tracks_updates_in_place() {
    let mut heap = CandidateHeap::new();
    let head = key(0, BoneId::Head);
    let neck = key(0, BoneId::Neck);
    let hand = key(1, BoneId::LeftHand);

    assert!(heap.upsert(candidate(head, 0.3)));
    assert!(heap.upsert(candidate(neck, 0.2)));
    assert!(heap.upsert(candidate(hand, 0.4)));
    assert_eq!(heap.best_candidate(), Some(neck));

    heap.upsert(candidate(hand, 0.1));
    assert_eq!(heap.best_candidate(), Some(hand));
    assert_eq!(heap.len(), 3);

    heap.upsert(candidate(hand, 0.9));
    assert_eq!(heap.best_candidate(), Some(neck));
    assert!(heap.heap_order_holds());

    assert_eq!(heap.delete(neck).map(|c| c.key), Some(neck));
    assert_eq!(heap.delete(neck), None);
    assert_eq!(heap.best_candidate(), Some(head));
    assert!(heap.heap_order_holds());
}

#[test]
fn forbidden_bone_is_suppressed_until_blocklist_clear() {
    let mut heap = CandidateHeap::new();
    let head = key(0, BoneId::Head);
    heap.upsert(candidate(head, 0.3));

    heap.forbid_bone(head, 1.0);
    assert!(!heap.contains(head));
    assert!(!heap.upsert(candidate(head, 0.1)));
    assert!(heap.is_blocked(head));

    heap.clear_blocklist();
    assert!(heap.upsert(candidate(head, 0.1)));
    assert_eq!(heap.best_candidate(), Some(head));
}

#[test]
fn forbidden_subject_blocks_every_bone() {
    let mut heap = CandidateHeap::new();
    heap.upsert(candidate(key(2, BoneId::Head), 0.3));
    heap.upsert(candidate(key(2, BoneId::Spine), 0.2));
    heap.upsert(candidate(key(1, BoneId::Spine), 0.4));

    heap.forbid_subject(Slot(2), 0.0);
    assert_eq!(heap.len(), 1);
    assert!(!heap.upsert(candidate(key(2, BoneId::Chest), 0.05)));
    assert_eq!(heap.best_candidate(), Some(key(1, BoneId::Spine)));
}

#[test]
fn forbidding_the_last_candidate_leaves_no_best() {
    let mut heap = CandidateHeap::new();
    let only = key(0, BoneId::Chest);
    heap.upsert(candidate(only, 0.2));

    heap.forbid_bone(only, 0.0);
    assert_eq!(heap.best_candidate(), None);
    assert!(heap.is_empty());
    assert_eq!(heap.blocklist().len(), 1);
}

#[test]
fn cleared_slot_carries_no_stale_state_for_its_next_subject() {
    let mut heap = CandidateHeap::new();
    for (i, bone) in BoneId::ALL.iter().enumerate().take(10) {
        heap.upsert(candidate(key(3, *bone), 0.1 + i as f32 * 0.01));
    }
    heap.forbid_bone(key(3, BoneId::Head), 0.0);
    heap.upsert(candidate(key(0, BoneId::Head), 0.5));

    heap.clear_subject(Slot(3));
    assert!(heap.iter().all(|c| c.key.slot != Slot(3)));
    assert!(!heap.is_blocked(key(3, BoneId::Head)));
    assert_eq!(heap.len(), 1);
    assert!(heap.heap_order_holds());
}

#[test]
fn secondary_filter_drops_candidates_beyond_three_times_best() {
    let mut heap = CandidateHeap::new();
    let near = key(0, BoneId::Head);
    let far = key(0, BoneId::Hips);

    let report = heap.apply_batch(&[hit(near, 1.0), hit(far, 3.5)], None, 3.0);
    assert!(heap.contains(near));
    assert!(!heap.contains(far));
    assert_eq!(report.pruned, 1);
}

#[test]
fn secondary_filter_is_reevaluated_when_best_improves() {
    let mut heap = CandidateHeap::new();
    let a = key(0, BoneId::Head);
    let b = key(0, BoneId::Neck);
    let c = key(0, BoneId::Chest);

    heap.apply_batch(&[hit(a, 1.0), hit(b, 2.5)], None, 3.0);
    assert_eq!(heap.len(), 2);

    heap.apply_batch(&[hit(c, 0.5)], None, 3.0);
    assert!(heap.contains(a));
    assert!(!heap.contains(b));
    assert_eq!(heap.best_candidate(), Some(c));
}

#[test]
fn locked_key_survives_filter_and_range() {
    let mut heap = CandidateHeap::new();
    let locked = key(0, BoneId::LeftHand);
    let other = key(0, BoneId::RightHand);

    heap.apply_batch(&[hit(locked, 2.0), hit(other, 0.1)], Some(locked), 3.0);
    assert!(heap.contains(locked));
    assert!(heap.get(locked).unwrap().valid);

    let report = heap.apply_batch(&[out_of_range(locked, 0.9), hit(other, 0.1)], Some(locked), 3.0);
    assert_eq!(report.retained_invalid, 1);
    let kept = heap.get(locked).unwrap();
    assert!(!kept.valid);
    assert_eq!(kept.true_distance, 0.9);
    assert_eq!(heap.valid_len(), 1);
    assert_eq!(heap.best_candidate(), Some(other));

    // Without the lock, out of range means gone.
    heap.apply_batch(&[out_of_range(locked, 0.9)], None, 3.0);
    assert!(!heap.contains(locked));
}

#[test]
fn rejected_bones_are_removed() {
    let mut heap = CandidateHeap::new();
    let k = key(0, BoneId::Spine);
    heap.apply_batch(&[hit(k, 0.2)], None, 3.0);

    let report = heap.apply_batch(
        &[BatchEntry {
            key: k,
            outcome: Err(Rejection::Unavailable),
        }],
        None,
        3.0,
    );
    assert_eq!(report.removed, 1);
    assert!(heap.is_empty());
}

#[derive(Clone, Debug)]
enum Op {
    Upsert(u16, usize, f32),
    Delete(u16, usize),
    ForbidBone(u16, usize),
    ForbidSubject(u16),
    ClearSubject(u16),
    ClearBlocklist,
}

fn arb_op() -> impl Strategy<Value = Op> {
    let slot = 0u16..4;
    let bone = 0usize..BoneId::COUNT;
    prop_oneof![
        6 => (slot.clone(), bone.clone(), 0.0..5.0f32).prop_map(|(s, b, d)| Op::Upsert(s, b, d)),
        2 => (slot.clone(), bone.clone()).prop_map(|(s, b)| Op::Delete(s, b)),
        1 => (slot.clone(), bone).prop_map(|(s, b)| Op::ForbidBone(s, b)),
        1 => slot.clone().prop_map(Op::ForbidSubject),
        1 => slot.prop_map(Op::ClearSubject),
        1 => Just(Op::ClearBlocklist),
    ]
}

fn k(slot: u16, bone: usize) -> CandidateKey {
    key(slot, BoneId::from_index(bone).unwrap())
}

proptest! {
    #[test]
    fn heap_invariant_holds_under_random_operations(ops in prop::collection::vec(arb_op(), 1..200)) {
        let mut heap = CandidateHeap::new();
        for op in ops {
            match op {
                Op::Upsert(s, b, d) => {
                    heap.upsert(candidate(k(s, b), d));
                }
                Op::Delete(s, b) => {
                    heap.delete(k(s, b));
                }
                Op::ForbidBone(s, b) => heap.forbid_bone(k(s, b), 0.0),
                Op::ForbidSubject(s) => heap.forbid_subject(Slot(s), 0.0),
                Op::ClearSubject(s) => heap.clear_subject(Slot(s)),
                Op::ClearBlocklist => heap.clear_blocklist(),
            }

            prop_assert!(heap.heap_order_holds());
            prop_assert!(heap.iter().all(|c| !heap.is_blocked(c.key)));

            let min = heap.iter().map(|c| c.adjusted_distance).fold(f32::INFINITY, f32::min);
            match heap.best() {
                Some(best) => prop_assert_eq!(best.adjusted_distance, min),
                None => prop_assert!(heap.is_empty()),
            }
        }
    }

    #[test]
    fn batch_leaves_nothing_beyond_the_filter_bound(
        batches in prop::collection::vec(
            prop::collection::vec((0u16..3, 0usize..BoneId::COUNT, 0.01..4.0f32), 1..20),
            1..10,
        ),
        locked_bone in 0usize..BoneId::COUNT,
    ) {
        let mut heap = CandidateHeap::new();
        let locked = k(0, locked_bone);
        for batch in batches {
            let entries: Vec<BatchEntry> = batch.iter().map(|&(s, b, d)| hit(k(s, b), d)).collect();
            heap.apply_batch(&entries, Some(locked), 3.0);

            let best = heap.best().map(|c| c.adjusted_distance);
            if let Some(best) = best {
                for c in heap.iter().filter(|c| c.key != locked) {
                    prop_assert!(c.adjusted_distance <= best * 3.0);
                }
            }
            prop_assert!(heap.heap_order_holds());
        }
    }
}
