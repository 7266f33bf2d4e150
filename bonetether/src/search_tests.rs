use crate::testing::FakeHost;
use crate::{Settings, SubjectId, TargetSearch};
use glam::Vec3;

const LOCAL: SubjectId = SubjectId(1);

fn host() -> FakeHost {
    let host = FakeHost::new(LOCAL);
    host.add_subject(LOCAL, Vec3::ZERO);
    host.add_subject(SubjectId(2), Vec3::new(1.0, 0.0, 0.0));
    host.add_subject(SubjectId(3), Vec3::new(0.0, 0.0, 0.5));
    host.add_subject(SubjectId(4), Vec3::new(9.0, 0.0, 0.0));
    host
}

fn search(prefer_self: bool) -> TargetSearch {
    TargetSearch::new(&Settings {
        prefer_self,
        ..Settings::default()
    })
}

#[test]
fn others_come_nearest_first_then_self() {
    let host = host();
    let mut search = search(false);

    let first = search.find_next_subject(&host, Vec3::ZERO, None, 0.0);
    assert_eq!(first, Some(SubjectId(3)));

    let mut seen = vec![SubjectId(3)];
    let mut current = SubjectId(3);
    for _ in 0..3 {
        current = search
            .find_next_subject(&host, Vec3::ZERO, Some(current), 0.0)
            .unwrap();
        seen.push(current);
    }
    // Subject 4 is outside the search radius.
    assert_eq!(
        seen,
        vec![SubjectId(3), SubjectId(2), LOCAL, SubjectId(3)]
    );
}

#[test]
fn preferred_self_comes_first() {
    let host = host();
    let mut search = search(true);

    assert_eq!(search.find_next_subject(&host, Vec3::ZERO, None, 0.0), Some(LOCAL));
    assert_eq!(
        search.find_next_subject(&host, Vec3::ZERO, Some(LOCAL), 0.0),
        Some(SubjectId(3))
    );
    assert_eq!(
        search.find_next_subject(&host, Vec3::ZERO, Some(SubjectId(2)), 0.0),
        Some(LOCAL)
    );
}

#[test]
fn manual_selection_wins_while_in_range() {
    let host = host();
    let mut search = search(true);
    search.set_manual_selection(Some(SubjectId(2)));
    assert_eq!(
        search.find_next_subject(&host, Vec3::ZERO, None, 0.0),
        Some(SubjectId(2))
    );

    host.move_subject(SubjectId(2), Vec3::new(20.0, 0.0, 0.0));
    assert_eq!(search.find_next_subject(&host, Vec3::ZERO, None, 0.0), Some(LOCAL));
}

#[test]
fn unknown_after_restarts_the_cycle() {
    let host = host();
    let mut search = search(false);
    assert_eq!(
        search.find_next_subject(&host, Vec3::ZERO, Some(SubjectId(77)), 0.0),
        Some(SubjectId(3))
    );
}

#[test]
fn subject_list_is_cached_between_refreshes() {
    let host = host();
    let mut search = search(false);
    search.find_next_subject(&host, Vec3::ZERO, None, 0.0);

    host.add_subject(SubjectId(5), Vec3::new(0.1, 0.0, 0.0));
    assert_eq!(
        search.find_next_subject(&host, Vec3::ZERO, None, 1.0),
        Some(SubjectId(3))
    );
    assert_eq!(
        search.find_next_subject(&host, Vec3::ZERO, None, 6.0),
        Some(SubjectId(5))
    );

    host.remove_subject(SubjectId(5));
    assert_eq!(
        search.find_next_subject(&host, Vec3::ZERO, None, 6.5),
        Some(SubjectId(3))
    );

    host.add_subject(SubjectId(6), Vec3::new(0.05, 0.0, 0.0));
    search.invalidate();
    assert_eq!(
        search.find_next_subject(&host, Vec3::ZERO, None, 7.0),
        Some(SubjectId(6))
    );
}

#[test]
fn nobody_in_range_yields_none() {
    let host = FakeHost::new(LOCAL);
    let mut search = search(false);
    assert_eq!(search.find_next_subject(&host, Vec3::ZERO, None, 0.0), None);
}
