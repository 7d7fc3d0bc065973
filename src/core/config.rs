//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{PdsError, Result};

/// Full PDS configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub timing: TimingConfig,
    pub balance: BalanceConfig,
    pub effect: EffectConfig,
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
}

/// Delays of the demo script, in milliseconds, in the order they elapse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    /// Idle time on the main screen before the menu nudge.
    pub initial_delay_ms: u64,
    /// How long the menu list stays nudged before it is restored.
    pub nudge_ms: u64,
    /// How long the highlighted option is shown before switching to the buy screen.
    pub highlight_ms: u64,
    /// Time spent on the buy screen.
    pub buy_screen_ms: u64,
    /// Time spent on the processing screen.
    pub processing_ms: u64,
    /// Time spent on the success screen.
    pub success_ms: u64,
    /// Pause on the main screen before the next cycle begins.
    pub restart_delay_ms: u64,
    /// Counter animation tick length.
    pub frame_interval_ms: u64,
}

/// Counter animation knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BalanceConfig {
    /// Balance shown on the main screen.
    pub base: u64,
    /// Amount credited by the demo purchase.
    pub bonus: u64,
    /// Number of frames a count-up takes.
    pub steps: u32,
}

/// Celebration effect parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EffectConfig {
    pub enabled: bool,
    pub particle_count: u32,
    pub spread_degrees: f64,
    pub colors: Vec<String>,
}

/// Activity log tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
}

/// Filesystem paths used by pds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub jsonl_log: PathBuf,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 3_000,
            nudge_ms: 500,
            highlight_ms: 1_500,
            buy_screen_ms: 3_000,
            processing_ms: 3_000,
            success_ms: 4_000,
            restart_delay_ms: 5_000,
            frame_interval_ms: 16,
        }
    }
}

impl TimingConfig {
    /// Sum of every delay in one full cycle, restart pause included.
    #[must_use]
    pub fn cycle_length(&self) -> Duration {
        Duration::from_millis(
            self.initial_delay_ms
                + self.nudge_ms
                + self.highlight_ms
                + self.buy_screen_ms
                + self.processing_ms
                + self.success_ms
                + self.restart_delay_ms,
        )
    }

    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            base: 1_337,
            bonus: 667,
            steps: 50,
        }
    }
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            particle_count: 100,
            spread_degrees: 70.0,
            colors: ["#FF7D00", "#6C63FF", "#005F73", "#FFD700", "#10b981"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[PDS-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir.join(".config").join("pds").join("config.toml"),
            jsonl_log: home_dir
                .join(".local")
                .join("share")
                .join("pds")
                .join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| PdsError::io(&path_buf, source))?;
            toml::from_str::<Self>(&raw)?
        } else if path.is_some() {
            return Err(PdsError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over the canonical JSON form so the value is stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let timing = &mut self.timing;
        for (name, slot) in [
            ("PDS_TIMING_INITIAL_DELAY_MS", &mut timing.initial_delay_ms),
            ("PDS_TIMING_NUDGE_MS", &mut timing.nudge_ms),
            ("PDS_TIMING_HIGHLIGHT_MS", &mut timing.highlight_ms),
            ("PDS_TIMING_BUY_SCREEN_MS", &mut timing.buy_screen_ms),
            ("PDS_TIMING_PROCESSING_MS", &mut timing.processing_ms),
            ("PDS_TIMING_SUCCESS_MS", &mut timing.success_ms),
            ("PDS_TIMING_RESTART_DELAY_MS", &mut timing.restart_delay_ms),
            ("PDS_TIMING_FRAME_INTERVAL_MS", &mut timing.frame_interval_ms),
            ("PDS_BALANCE_BASE", &mut self.balance.base),
            ("PDS_BALANCE_BONUS", &mut self.balance.bonus),
            ("PDS_LOGGING_MAX_SIZE_BYTES", &mut self.logging.max_size_bytes),
        ] {
            if let Some(raw) = lookup(name) {
                *slot = parse_env(name, &raw)?;
            }
        }

        if let Some(raw) = lookup("PDS_BALANCE_STEPS") {
            self.balance.steps = parse_env("PDS_BALANCE_STEPS", &raw)?;
        }
        if let Some(raw) = lookup("PDS_EFFECT_ENABLED") {
            self.effect.enabled = parse_env("PDS_EFFECT_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("PDS_EFFECT_PARTICLE_COUNT") {
            self.effect.particle_count = parse_env("PDS_EFFECT_PARTICLE_COUNT", &raw)?;
        }
        if let Some(raw) = lookup("PDS_EFFECT_SPREAD_DEGREES") {
            self.effect.spread_degrees = parse_env("PDS_EFFECT_SPREAD_DEGREES", &raw)?;
        }
        if let Some(raw) = lookup("PDS_EFFECT_COLORS") {
            self.effect.colors = raw
                .split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(raw) = lookup("PDS_LOGGING_ENABLED") {
            self.logging.enabled = parse_env("PDS_LOGGING_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("PDS_LOGGING_MAX_ROTATED_FILES") {
            self.logging.max_rotated_files = parse_env("PDS_LOGGING_MAX_ROTATED_FILES", &raw)?;
        }
        if let Some(raw) = lookup("PDS_PATHS_JSONL_LOG") {
            self.paths.jsonl_log = PathBuf::from(raw);
        }

        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let t = &self.timing;
        for (name, val) in [
            ("initial_delay_ms", t.initial_delay_ms),
            ("nudge_ms", t.nudge_ms),
            ("highlight_ms", t.highlight_ms),
            ("buy_screen_ms", t.buy_screen_ms),
            ("processing_ms", t.processing_ms),
            ("success_ms", t.success_ms),
            ("restart_delay_ms", t.restart_delay_ms),
            ("frame_interval_ms", t.frame_interval_ms),
        ] {
            if val == 0 {
                return Err(PdsError::InvalidConfig {
                    details: format!("timing.{name} must be >= 1"),
                });
            }
        }

        if self.balance.steps == 0 {
            return Err(PdsError::InvalidConfig {
                details: "balance.steps must be >= 1".to_string(),
            });
        }
        if self.balance.base.checked_add(self.balance.bonus).is_none() {
            return Err(PdsError::InvalidConfig {
                details: "balance.base + balance.bonus overflows".to_string(),
            });
        }

        if !(0.0..=360.0).contains(&self.effect.spread_degrees) {
            return Err(PdsError::InvalidConfig {
                details: format!(
                    "effect.spread_degrees must be in [0, 360], got {}",
                    self.effect.spread_degrees
                ),
            });
        }
        if self.effect.enabled && self.effect.colors.is_empty() {
            return Err(PdsError::InvalidConfig {
                details: "effect.colors must not be empty when the effect is enabled".to_string(),
            });
        }

        if self.logging.max_rotated_files == 0 {
            return Err(PdsError::InvalidConfig {
                details: "logging.max_rotated_files must be >= 1".to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| PdsError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

#[cfg(test)]
mod tests {
    use super::{Config, PdsError};
    use std::collections::HashMap;
    use std::path::Path;
    use std::time::Duration;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn default_cycle_is_twenty_seconds() {
        let cfg = Config::default();
        assert_eq!(cfg.timing.cycle_length(), Duration::from_millis(20_000));
    }

    #[test]
    fn zero_delay_rejected() {
        let mut cfg = Config::default();
        cfg.timing.processing_ms = 0;
        let err = cfg.validate().expect_err("expected delay validation error");
        assert!(err.to_string().contains("processing_ms"));
    }

    #[test]
    fn zero_steps_rejected() {
        let mut cfg = Config::default();
        cfg.balance.steps = 0;
        let err = cfg.validate().expect_err("expected steps validation error");
        assert!(err.to_string().contains("balance.steps"));
    }

    #[test]
    fn balance_overflow_rejected() {
        let mut cfg = Config::default();
        cfg.balance.base = u64::MAX;
        let err = cfg.validate().expect_err("expected overflow error");
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn spread_out_of_range_rejected() {
        let mut cfg = Config::default();
        cfg.effect.spread_degrees = 400.0;
        let err = cfg.validate().expect_err("expected spread error");
        assert!(err.to_string().contains("spread_degrees"));
    }

    #[test]
    fn empty_colors_only_rejected_when_enabled() {
        let mut cfg = Config::default();
        cfg.effect.colors.clear();
        assert!(cfg.validate().is_err());
        cfg.effect.enabled = false;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        let overrides = vars(&[
            ("PDS_TIMING_INITIAL_DELAY_MS", "1200"),
            ("PDS_BALANCE_BASE", "42"),
            ("PDS_BALANCE_STEPS", "10"),
            ("PDS_EFFECT_ENABLED", "false"),
            ("PDS_EFFECT_COLORS", "#111, #222 ,"),
        ]);

        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("env overrides should parse");

        assert_eq!(cfg.timing.initial_delay_ms, 1_200);
        assert_eq!(cfg.balance.base, 42);
        assert_eq!(cfg.balance.steps, 10);
        assert!(!cfg.effect.enabled);
        assert_eq!(cfg.effect.colors, vec!["#111".to_string(), "#222".to_string()]);
    }

    #[test]
    fn env_invalid_number_rejected() {
        let mut cfg = Config::default();
        let overrides = vars(&[("PDS_TIMING_SUCCESS_MS", "soon")]);

        let err = cfg
            .apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect_err("invalid number should fail");
        match err {
            PdsError::ConfigParse { context, details } => {
                assert_eq!(context, "env");
                assert!(details.contains("PDS_TIMING_SUCCESS_MS"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let result = Config::load(Some(Path::new("/nonexistent/pds/config.toml")));
        assert!(matches!(result, Err(PdsError::MissingConfig { .. })));
    }

    #[test]
    fn load_reads_partial_toml_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[timing]\nsuccess_ms = 2500\n\n[balance]\nbonus = 1000\n").unwrap();

        let cfg = Config::load(Some(&path)).expect("config should load");
        assert_eq!(cfg.timing.success_ms, 2_500);
        assert_eq!(cfg.timing.initial_delay_ms, 3_000);
        assert_eq!(cfg.balance.bonus, 1_000);
        assert_eq!(cfg.paths.config_file, path);
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = Config::default();
        let mut modified = Config::default();
        modified.balance.bonus += 1;
        assert_ne!(cfg.stable_hash().unwrap(), modified.stable_hash().unwrap());
        assert_eq!(cfg.stable_hash().unwrap(), cfg.stable_hash().unwrap());
    }
}
