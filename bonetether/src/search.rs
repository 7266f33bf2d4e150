use crate::{Settings, SubjectDirectory, SubjectId};
use glam::Vec3;

/// Picks which subject the bone scan runs against.
#[derive(Clone, Debug)]
pub struct TargetSearch {
    cache: Vec<SubjectId>,
    refreshed_at: Option<f64>,
    cache_seconds: f64,
    radius: f32,
    prefer_self: bool,
    manual_selection: Option<SubjectId>,
}

impl TargetSearch {
    pub fn new(settings: &Settings) -> Self {
        Self {
            cache: Vec::new(),
            refreshed_at: None,
            cache_seconds: settings.subject_cache_seconds,
            radius: settings.subject_radius(),
            prefer_self: settings.prefer_self,
            manual_selection: None,
        }
    }

    pub fn set_manual_selection(&mut self, subject: Option<SubjectId>) {
        self.manual_selection = subject;
    }

    pub fn manual_selection(&self) -> Option<SubjectId> {
        self.manual_selection
    }

    /// Forces the next search to re-enumerate subjects.
    pub fn invalidate(&mut self) {
        self.refreshed_at = None;
    }

    fn refresh<H: SubjectDirectory + ?Sized>(&mut self, host: &H, now: f64) {
        let fresh = self
            .refreshed_at
            .is_some_and(|at| now - at <= self.cache_seconds);
        if fresh {
            return;
        }
        self.cache = host.nearby_subjects();
        let local = host.local_subject();
        if !self.cache.contains(&local) {
            self.cache.push(local);
        }
        self.refreshed_at = Some(now);
    }

    fn distance_to<H: SubjectDirectory + ?Sized>(
        &self,
        host: &H,
        subject: SubjectId,
        origin: Vec3,
    ) -> Option<f32> {
        if !host.is_valid(subject) {
            return None;
        }
        let d = host.world_position(subject)?.distance(origin);
        (d <= self.radius).then_some(d)
    }

    /// Next subject to scan. With `after == None` this is the preferred
    /// subject; otherwise the one following `after` in cycling order
    /// (self first if preferred, then others nearest-first, then self as the
    /// fallback), wrapping around.
    pub fn find_next_subject<H: SubjectDirectory + ?Sized>(
        &mut self,
        host: &H,
        origin: Vec3,
        after: Option<SubjectId>,
        now: f64,
    ) -> Option<SubjectId> {
        self.refresh(host, now);
        let local = host.local_subject();

        if after.is_none() {
            if let Some(manual) = self.manual_selection {
                if self.distance_to(host, manual, origin).is_some() {
                    return Some(manual);
                }
            }
            if self.prefer_self && self.distance_to(host, local, origin).is_some() {
                return Some(local);
            }
        }

        let mut working: Vec<(f32, SubjectId)> = self
            .cache
            .iter()
            .filter_map(|&s| self.distance_to(host, s, origin).map(|d| (d, s)))
            .collect();

        // Self goes to the end (or the front when preferred) rather than being
        // ranked by distance.
        let has_self = match working.iter().position(|&(_, s)| s == local) {
            Some(i) => {
                working.remove(i);
                true
            }
            None => false,
        };
        working.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut order: Vec<SubjectId> = working.into_iter().map(|(_, s)| s).collect();
        if has_self {
            if self.prefer_self {
                order.insert(0, local);
            } else {
                order.push(local);
            }
        }
        if order.is_empty() {
            return None;
        }

        let next = match after.and_then(|a| order.iter().position(|&s| s == a)) {
            Some(i) => order[(i + 1) % order.len()],
            None => order[0],
        };
        Some(next)
    }
}
