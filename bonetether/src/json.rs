use crate::{Error, Settings};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
struct SettingsJson {
    range: Option<f32>,
    subject_leeway: Option<f32>,
    directionality: Option<f32>,
    secondary_candidate_multiplier: Option<f32>,
    bones_per_tick: Option<usize>,
    prefer_self: Option<bool>,
    subject_cache_seconds: Option<f64>,
    long_press_seconds: Option<f64>,
    advance_restart_seconds: Option<f64>,
    blend_seconds: Option<f64>,
    blocklist_timeout_seconds: Option<f64>,
    min_usable_candidates: Option<usize>,
    reader_fault_cooldown_seconds: Option<f64>,
}

impl Settings {
    /// Parses camelCase JSON; omitted fields keep their defaults.
    pub fn from_json_str(input: &str) -> Result<Self, Error> {
        let raw: SettingsJson = serde_json::from_str(input).map_err(|e| Error::JsonParse {
            message: e.to_string(),
        })?;

        let d = Settings::default();
        let settings = Settings {
            range: raw.range.unwrap_or(d.range),
            subject_leeway: raw.subject_leeway.unwrap_or(d.subject_leeway),
            directionality: raw.directionality.unwrap_or(d.directionality),
            secondary_candidate_multiplier: raw
                .secondary_candidate_multiplier
                .unwrap_or(d.secondary_candidate_multiplier),
            bones_per_tick: raw.bones_per_tick.unwrap_or(d.bones_per_tick),
            prefer_self: raw.prefer_self.unwrap_or(d.prefer_self),
            subject_cache_seconds: raw.subject_cache_seconds.unwrap_or(d.subject_cache_seconds),
            long_press_seconds: raw.long_press_seconds.unwrap_or(d.long_press_seconds),
            advance_restart_seconds: raw
                .advance_restart_seconds
                .unwrap_or(d.advance_restart_seconds),
            blend_seconds: raw.blend_seconds.unwrap_or(d.blend_seconds),
            blocklist_timeout_seconds: raw
                .blocklist_timeout_seconds
                .unwrap_or(d.blocklist_timeout_seconds),
            min_usable_candidates: raw.min_usable_candidates.unwrap_or(d.min_usable_candidates),
            reader_fault_cooldown_seconds: raw
                .reader_fault_cooldown_seconds
                .unwrap_or(d.reader_fault_cooldown_seconds),
        };
        settings.validate()?;
        Ok(settings)
    }
}
