//! Node configuration – reads `tracksense.toml`.
//!
//! Every table and field is optional. The file is located through
//! `$TRACKSENSE_CONFIG`, falling back to `./tracksense.toml`.
//!
//! ```toml
//! [ids]
//! pose_x = 0x200
//! blue_base = 0x400
//!
//! [perception]
//! pixels_per_meter = 10.0
//! detection_range = 5.0
//! bearing_unit = "degrees"
//!
//! [bus]
//! bind = "127.0.0.1:47000"
//! peers = ["127.0.0.1:47001"]
//!
//! [runtime]
//! poll_backoff_ms = 1
//!
//! [track]
//! path = "track.toml"
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracksense_perception::DetectionConfig;
use tracksense_runtime::RuntimeConfig;
use tracksense_types::{FrameIds, SenseError};

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 47000))
}
fn default_peers() -> Vec<SocketAddr> {
    vec![SocketAddr::from(([127, 0, 0, 1], 47001))]
}
fn default_track_path() -> PathBuf {
    PathBuf::from("track.toml")
}

/// `[bus]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Local address the node listens on for pose frames.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Every detection frame is sent to each of these.
    #[serde(default = "default_peers")]
    pub peers: Vec<SocketAddr>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            peers: default_peers(),
        }
    }
}

/// `[track]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackConfig {
    #[serde(default = "default_track_path")]
    pub path: PathBuf,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            path: default_track_path(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ids: FrameIds,
    #[serde(default)]
    pub perception: DetectionConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub track: TrackConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), SenseError> {
        self.perception.validate()?;
        self.ids.validate(self.perception.max_per_class)?;
        self.runtime.validate()?;
        Ok(())
    }
}

/// `$TRACKSENSE_CONFIG`, or `tracksense.toml` in the working directory.
pub fn config_path() -> PathBuf {
    config_path_from(std::env::var("TRACKSENSE_CONFIG").ok())
}

pub(crate) fn config_path_from(var: Option<String>) -> PathBuf {
    var.filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tracksense.toml"))
}

/// Load the config from a specific path. Returns `None` if the file does not
/// exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `TRACKSENSE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TRACKSENSE_BUS_BIND` | `bus.bind` |
/// | `TRACKSENSE_TRACK` | `track.path` |
/// | `TRACKSENSE_DETECTION_RANGE` | `perception.detection_range` |
/// | `TRACKSENSE_SEED` | `perception.seed` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("TRACKSENSE_BUS_BIND")
        && let Ok(addr) = v.parse::<SocketAddr>()
    {
        cfg.bus.bind = addr;
    }
    if let Some(v) = lookup("TRACKSENSE_TRACK")
        && !v.is_empty()
    {
        cfg.track.path = PathBuf::from(v);
    }
    if let Some(v) = lookup("TRACKSENSE_DETECTION_RANGE")
        && let Ok(range) = v.parse::<f64>()
    {
        cfg.perception.detection_range = range;
    }
    if let Some(v) = lookup("TRACKSENSE_SEED")
        && let Ok(seed) = v.parse::<u64>()
    {
        cfg.perception.seed = Some(seed);
    }
}

/// Build the effective configuration. Never fails: a missing, unreadable or
/// invalid file yields the defaults.
pub fn resolve(path: &Path) -> Config {
    let mut cfg = match load_from(path) {
        Ok(Some(cfg)) => {
            info!(path = %path.display(), "configuration loaded");
            cfg
        }
        Ok(None) => {
            info!(path = %path.display(), "no configuration file; using defaults");
            Config::default()
        }
        Err(e) => {
            warn!(error = %e, "configuration unusable; using defaults");
            Config::default()
        }
    };
    apply_env_overrides(&mut cfg);
    if let Err(e) = cfg.validate() {
        warn!(error = %e, "configuration rejected; using defaults");
        cfg = Config::default();
    }
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tracksense_types::AngleUnit;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("tracksense.toml");
        fs::write(&path, body).expect("write config");
        path
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.ids.pose_x, 0x200);
        assert_eq!(cfg.ids.yellow_base, 0x480);
        assert_eq!(cfg.perception.pixels_per_meter, 10.0);
        assert_eq!(cfg.perception.detection_range, 5.0);
        assert_eq!(cfg.perception.bearing_unit, AngleUnit::Degrees);
        assert_eq!(cfg.bus.bind.to_string(), "127.0.0.1:47000");
        assert_eq!(cfg.bus.peers.len(), 1);
        assert_eq!(cfg.runtime.poll_backoff_ms, 1);
        assert_eq!(cfg.track.path, PathBuf::from("track.toml"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(
            &dir,
            "[ids]\nblue_base = 0x300\n\n[perception]\ndetection_range = 12.5\n\n[bus]\npeers = [\"10.0.0.2:5000\", \"10.0.0.3:5000\"]\n",
        );
        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.ids.blue_base, 0x300);
        assert_eq!(cfg.ids.yellow_base, 0x480);
        assert_eq!(cfg.perception.detection_range, 12.5);
        assert_eq!(cfg.perception.range_noise_std_dev, 0.1);
        assert_eq!(cfg.bus.peers.len(), 2);
        assert_eq!(cfg.bus.bind, default_bind());
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let result = load_from(&dir.path().join("absent.toml")).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn unparseable_file_is_an_error_and_resolves_to_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(&dir, "[perception\ndetection_range = ");
        assert!(load_from(&path).is_err());
        let cfg = resolve(&path);
        assert_eq!(cfg.perception.detection_range, Config::default().perception.detection_range);
    }

    #[test]
    fn invalid_values_resolve_to_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(&dir, "[perception]\npixels_per_meter = -1.0\n");
        assert!(load_from(&path).expect("parses").is_some());
        let cfg = resolve(&path);
        assert_eq!(cfg.perception.pixels_per_meter, 10.0);
    }

    #[test]
    fn zero_poll_backoff_resolves_to_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(&dir, "[runtime]\npoll_backoff_ms = 0\n");
        let loaded = load_from(&path).expect("parses").expect("present");
        assert!(loaded.validate().is_err());
        let cfg = resolve(&path);
        assert_eq!(cfg.runtime.poll_backoff_ms, 1);
    }

    #[test]
    fn overlapping_id_windows_fail_validation() {
        let mut cfg = Config::default();
        cfg.ids.yellow_base = 0x410;
        assert!(cfg.validate().is_err());
        cfg.ids.yellow_base = 0x7F0;
        assert!(cfg.validate().is_err(), "window must fit in 11 bits");
    }

    #[test]
    fn overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("TRACKSENSE_BUS_BIND", "0.0.0.0:9000"),
            ("TRACKSENSE_TRACK", "/tmp/acceleration.toml"),
            ("TRACKSENSE_DETECTION_RANGE", "7.5"),
            ("TRACKSENSE_SEED", "42"),
        ]);
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, |k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.bus.bind.to_string(), "0.0.0.0:9000");
        assert_eq!(cfg.track.path, PathBuf::from("/tmp/acceleration.toml"));
        assert_eq!(cfg.perception.detection_range, 7.5);
        assert_eq!(cfg.perception.seed, Some(42));
    }

    #[test]
    fn unparseable_overrides_are_ignored() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("TRACKSENSE_BUS_BIND", "not-an-address"),
            ("TRACKSENSE_DETECTION_RANGE", "far"),
            ("TRACKSENSE_SEED", "-3"),
        ]);
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, |k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn config_path_prefers_the_variable() {
        assert_eq!(config_path_from(Some("/etc/ts.toml".into())), PathBuf::from("/etc/ts.toml"));
        assert_eq!(config_path_from(Some(String::new())), PathBuf::from("tracksense.toml"));
        assert_eq!(config_path_from(None), PathBuf::from("tracksense.toml"));
    }
}
