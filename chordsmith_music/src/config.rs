// Run configuration.
//
// `HarmonizerConfig` gathers every tunable of a run: the genetic search
// parameters (`GaConfig`, see ga.rs), the slot length, and the accompaniment
// velocity scale. Defaults reproduce the classic setup (population 256, top
// 32 survivors, 10000 generations, two-beat slots, 90% of melody velocity).
//
// A config can be loaded from JSON; any field left out keeps its default,
// so `{}` is a valid config file.

use crate::error::HarmonizeError;
use crate::ga::GaConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonizerConfig {
    pub ga: GaConfig,
    /// Slot length in beats (quarter notes).
    pub slot_beats: u32,
    /// Accompaniment velocity as a fraction of the melody's mean velocity.
    pub velocity_scale: f64,
}

impl Default for HarmonizerConfig {
    fn default() -> Self {
        HarmonizerConfig {
            ga: GaConfig::default(),
            slot_beats: 2,
            velocity_scale: 0.9,
        }
    }
}

impl HarmonizerConfig {
    /// Load from a JSON file and validate.
    pub fn load(path: &Path) -> Result<Self, HarmonizeError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, HarmonizeError> {
        let config: HarmonizerConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the search or renderer cannot run with.
    pub fn validate(&self) -> Result<(), HarmonizeError> {
        let ga = &self.ga;
        if ga.population_size < 2 || ga.population_size % 2 != 0 {
            return Err(HarmonizeError::InvalidConfig(format!(
                "population_size must be even and at least 2, got {}",
                ga.population_size
            )));
        }
        if ga.survivor_count == 0 || ga.survivor_count > ga.population_size / 2 {
            return Err(HarmonizeError::InvalidConfig(format!(
                "survivor_count must be in 1..={}, got {}",
                ga.population_size / 2,
                ga.survivor_count
            )));
        }
        if ga.max_iterations == 0 {
            return Err(HarmonizeError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.slot_beats == 0 {
            return Err(HarmonizeError::InvalidConfig(
                "slot_beats must be at least 1".to_string(),
            ));
        }
        if !(self.velocity_scale > 0.0 && self.velocity_scale <= 1.0) {
            return Err(HarmonizeError::InvalidConfig(format!(
                "velocity_scale must be in (0, 1], got {}",
                self.velocity_scale
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarmonizerConfig::default();
        assert_eq!(config.ga.population_size, 256);
        assert_eq!(config.ga.survivor_count, 32);
        assert_eq!(config.ga.max_iterations, 10_000);
        assert_eq!(config.ga.mutation_count, None);
        assert_eq!(config.ga.mutations(), 128);
        assert_eq!(config.ga.max_root_pitch, 120);
        assert_eq!(config.slot_beats, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_is_default() {
        let config = HarmonizerConfig::from_json("{}").unwrap();
        assert_eq!(config, HarmonizerConfig::default());
    }

    #[test]
    fn test_partial_json_keeps_other_defaults() {
        let config =
            HarmonizerConfig::from_json(r#"{ "ga": { "max_iterations": 50 }, "slot_beats": 4 }"#)
                .unwrap();
        assert_eq!(config.ga.max_iterations, 50);
        assert_eq!(config.ga.population_size, 256);
        assert_eq!(config.slot_beats, 4);
        assert_eq!(config.velocity_scale, 0.9);
    }

    #[test]
    fn test_mutation_count_follows_population() {
        let config = HarmonizerConfig::from_json(r#"{ "ga": { "population_size": 16 } }"#).unwrap();
        assert_eq!(config.ga.mutations(), 8);

        let config = HarmonizerConfig::from_json(
            r#"{ "ga": { "population_size": 16, "mutation_count": 3 } }"#,
        )
        .unwrap();
        assert_eq!(config.ga.mutations(), 3);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for json in [
            r#"{ "ga": { "population_size": 7 } }"#,
            r#"{ "ga": { "population_size": 0 } }"#,
            r#"{ "ga": { "survivor_count": 0 } }"#,
            r#"{ "ga": { "population_size": 16, "survivor_count": 9 } }"#,
            r#"{ "ga": { "max_iterations": 0 } }"#,
            r#"{ "slot_beats": 0 }"#,
            r#"{ "velocity_scale": 1.5 }"#,
        ] {
            assert!(
                matches!(
                    HarmonizerConfig::from_json(json),
                    Err(HarmonizeError::InvalidConfig(_))
                ),
                "{json} should be rejected"
            );
        }
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            HarmonizerConfig::from_json("{ not json"),
            Err(HarmonizeError::Config(_))
        ));
    }
}
