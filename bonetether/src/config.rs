use crate::Error;

/// Tunables for bone search and tracking. Distances are in meters, times in
/// seconds.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Maximum probe-to-bone distance for a candidate.
    pub range: f32,
    /// Extra radius around the probe when enumerating subjects by root position.
    pub subject_leeway: f32,
    /// Weight of the forward-axis discount, in [0, 1].
    pub directionality: f32,
    pub secondary_candidate_multiplier: f32,
    pub bones_per_tick: usize,
    pub prefer_self: bool,
    pub subject_cache_seconds: f64,
    pub long_press_seconds: f64,
    /// An advance arriving later than this after the previous one restarts the scan.
    pub advance_restart_seconds: f64,
    pub blend_seconds: f64,
    pub blocklist_timeout_seconds: f64,
    /// Fewer valid candidates than this at scan start clears the blocklist.
    pub min_usable_candidates: usize,
    pub reader_fault_cooldown_seconds: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            range: 0.5,
            subject_leeway: 1.5,
            directionality: 0.5,
            secondary_candidate_multiplier: 3.0,
            bones_per_tick: 8,
            prefer_self: false,
            subject_cache_seconds: 5.0,
            long_press_seconds: 3.0,
            advance_restart_seconds: 5.0,
            blend_seconds: 0.1,
            blocklist_timeout_seconds: 10.0,
            min_usable_candidates: 2,
            reader_fault_cooldown_seconds: 2.0,
        }
    }
}

fn require(ok: bool, field: &str, message: &str) -> Result<(), Error> {
    if ok {
        Ok(())
    } else {
        Err(Error::invalid_settings(field, message))
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        require(
            self.range.is_finite() && self.range > 0.0,
            "range",
            "must be a positive finite distance",
        )?;
        require(
            self.subject_leeway.is_finite() && self.subject_leeway >= 0.0,
            "subject_leeway",
            "must be a non-negative finite distance",
        )?;
        require(
            (0.0..=1.0).contains(&self.directionality),
            "directionality",
            "must be within [0, 1]",
        )?;
        require(
            self.secondary_candidate_multiplier.is_finite()
                && self.secondary_candidate_multiplier >= 1.0,
            "secondary_candidate_multiplier",
            "must be at least 1",
        )?;
        require(self.bones_per_tick >= 1, "bones_per_tick", "must be at least 1")?;

        let durations = [
            ("subject_cache_seconds", self.subject_cache_seconds),
            ("long_press_seconds", self.long_press_seconds),
            ("advance_restart_seconds", self.advance_restart_seconds),
            ("blend_seconds", self.blend_seconds),
            ("blocklist_timeout_seconds", self.blocklist_timeout_seconds),
            ("reader_fault_cooldown_seconds", self.reader_fault_cooldown_seconds),
        ];
        for (field, value) in durations {
            require(
                value.is_finite() && value >= 0.0,
                field,
                "must be a non-negative finite duration",
            )?;
        }
        Ok(())
    }

    /// Candidate search radius used when enumerating subjects.
    pub fn subject_radius(&self) -> f32 {
        self.range + self.subject_leeway
    }
}
