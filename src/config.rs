//! Agent configuration, loaded from a single JSON file

use crate::clean::CleanConfig;
use anyhow::{Context, Result};
use arena_core::Vocabulary;
use arena_cv::PerceptionConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Screen coordinate for a tap, written `[x, y]` in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct TapPoint {
    pub x: u32,
    pub y: u32,
}

impl TapPoint {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl From<[u32; 2]> for TapPoint {
    fn from([x, y]: [u32; 2]) -> Self {
        Self::new(x, y)
    }
}

impl From<TapPoint> for [u32; 2] {
    fn from(p: TapPoint) -> Self {
        [p.x, p.y]
    }
}

impl fmt::Display for TapPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// adb executable, looked up on PATH when bare
    pub adb_path: PathBuf,
    /// Emulator address passed to `adb connect`; `None` uses the default device
    pub serial: Option<String>,
}

/// Where each screen handler taps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapPoints {
    pub home: TapPoint,
    pub main: TapPoint,
    pub select_mode: TapPoint,
    pub select_confirm: TapPoint,
    pub ingame_confirm: TapPoint,
    pub clearing: TapPoint,
}

/// All waits, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Pause after an action and on idle screens
    pub wait_ms: u64,
    pub double_tap_gap_ms: u64,
    /// Pause between the two steps of the select sequence
    pub select_gap_ms: u64,
    /// Settle time before reading slots on an in-game screen
    pub ingame_settle_ms: u64,
    pub poll_interval_ms: u64,
    /// Give up on a round whose result never shows; unbounded when absent
    pub result_poll_timeout_ms: Option<u64>,
}

impl Timings {
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn double_tap_gap(&self) -> Duration {
        Duration::from_millis(self.double_tap_gap_ms)
    }

    pub fn select_gap(&self) -> Duration {
        Duration::from_millis(self.select_gap_ms)
    }

    pub fn ingame_settle(&self) -> Duration {
        Duration::from_millis(self.ingame_settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn result_poll_timeout(&self) -> Option<Duration> {
        self.result_poll_timeout_ms.map(Duration::from_millis)
    }

    /// Every wait set to zero, for scripted runs.
    pub fn immediate() -> Self {
        Self {
            wait_ms: 0,
            double_tap_gap_ms: 0,
            select_gap_ms: 0,
            ingame_settle_ms: 0,
            poll_interval_ms: 0,
            result_poll_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Outcome dataset, one row per recorded round
    pub dataset: PathBuf,
    /// Per-read capture dump; `None` disables it
    pub capture_dir: Option<PathBuf>,
    pub backup_dir: PathBuf,
    pub log_dir: PathBuf,
}

/// Main agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub device: DeviceConfig,
    pub taps: TapPoints,
    pub timings: Timings,
    pub paths: PathsConfig,
    pub perception: PerceptionConfig,
    pub vocabulary: Vocabulary,
    /// Retrain after every this many recorded outcomes; 0 disables retraining
    pub retrain_every: u64,
    pub clean: CleanConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adb_path: "adb".into(),
            serial: Some("127.0.0.1:16384".to_string()),
        }
    }
}

impl Default for TapPoints {
    fn default() -> Self {
        Self {
            home: TapPoint::new(1750, 350),
            main: TapPoint::new(1750, 900),
            select_mode: TapPoint::new(1500, 800),
            select_confirm: TapPoint::new(1760, 900),
            ingame_confirm: TapPoint::new(960, 680),
            clearing: TapPoint::new(1800, 1000),
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            wait_ms: 1000,
            double_tap_gap_ms: 200,
            select_gap_ms: 500,
            ingame_settle_ms: 500,
            poll_interval_ms: 300,
            result_poll_timeout_ms: None,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            dataset: "results.csv".into(),
            capture_dir: Some("captures/slots".into()),
            backup_dir: "backup".into(),
            log_dir: "logs".into(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            taps: TapPoints::default(),
            timings: Timings::default(),
            paths: PathsConfig::default(),
            perception: PerceptionConfig::default(),
            vocabulary: Vocabulary::default(),
            retrain_every: 100,
            clean: CleanConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load from `path`. A missing file yields the defaults; a malformed one is an error.
    ///
    /// Runs before logging is set up, so it reports nothing itself.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json).with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_cv::Region;

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.taps.home, TapPoint::new(1750, 350));
        assert_eq!(config.timings.wait_ms, 1000);
        assert_eq!(config.timings.result_poll_timeout(), None);
        assert_eq!(config.retrain_every, 100);
        assert_eq!(config.vocabulary.len(), 56);
        assert_eq!(config.perception.mode_region, Region::new(0, 0, 300, 100));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AgentConfig::load(&tmp.path().join("absent.json")).unwrap();
        assert_eq!(config.paths.dataset, PathBuf::from("results.csv"));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "taps": { "home": [10, 20] },
                "timings": { "result_poll_timeout_ms": 60000 },
                "perception": { "mode_region": [5, 5, 50, 20], "digits": { "max_digits": 3 } },
                "vocabulary": ["knight", "dog"],
                "clean": { "balance_threshold": 1.5 }
            }"#,
        )
        .unwrap();

        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.taps.home, TapPoint::new(10, 20));
        assert_eq!(config.taps.main, TapPoint::new(1750, 900));
        assert_eq!(config.timings.result_poll_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.timings.poll_interval_ms, 300);
        assert_eq!(config.perception.mode_region, Region::new(5, 5, 50, 20));
        assert_eq!(config.perception.digits.max_digits, 3);
        assert_eq!(config.perception.digits.binarize_cut, 200);
        assert_eq!(config.vocabulary.index_of("dog"), Some(1));
        assert_eq!(config.clean.balance_threshold, 1.5);
        assert_eq!(config.clean.outlier_high, 2.5);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(AgentConfig::load(&path).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.json");
        let mut config = AgentConfig::default();
        config.retrain_every = 7;
        config.save(&path).unwrap();

        assert_eq!(AgentConfig::load(&path).unwrap().retrain_every, 7);
    }
}
