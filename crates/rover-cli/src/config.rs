//! Configuration file – reads/writes `~/.rover/config.toml`.

use rover_perception::{AccumulationPolicy, PerceptionConfig};
use rover_runtime::params::ControlParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted rover configuration.
///
/// Both sections fall back to their defaults field by field, so a file only
/// needs to name the values it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoverConfig {
    #[serde(default)]
    pub perception: PerceptionConfig,
    #[serde(default)]
    pub control: ControlParams,
}

/// Return the path to `~/.rover/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rover").join("config.toml")
}

/// Resolve the effective configuration.
///
/// An explicit `path` must exist. Without one, `~/.rover/config.toml` is used
/// when present and the defaults otherwise. Environment overrides are applied
/// last in every case.
pub fn resolve(path: Option<&Path>) -> Result<RoverConfig, String> {
    let mut cfg = match path {
        Some(p) => load_from(p)?.ok_or_else(|| format!("Config file {} does not exist", p.display()))?,
        None => load_from(&config_path())?.unwrap_or_default(),
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<RoverConfig>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: RoverConfig = toml::from_str(&raw)
        .map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `ROVER_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROVER_MAX_VELOCITY` | `control.max_velocity` |
/// | `ROVER_MIN_SAMPLES` | `control.min_samples` |
/// | `ROVER_ACCUMULATION` | `perception.accumulation` (`count` or `seen`) |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut RoverConfig) {
    if let Ok(v) = std::env::var("ROVER_MAX_VELOCITY")
        && let Ok(velocity) = v.parse::<f32>()
        && velocity.is_finite()
    {
        cfg.control.max_velocity = velocity;
    }
    if let Ok(v) = std::env::var("ROVER_MIN_SAMPLES")
        && let Ok(n) = v.parse::<u32>()
    {
        cfg.control.min_samples = n;
    }
    if let Ok(v) = std::env::var("ROVER_ACCUMULATION") {
        match v.trim().to_ascii_lowercase().as_str() {
            "count" => cfg.perception.accumulation = AccumulationPolicy::Count,
            "seen" => cfg.perception.accumulation = AccumulationPolicy::Seen,
            _ => {}
        }
    }
}

/// Save the config to disk, creating `~/.rover/` if necessary.
pub fn save(cfg: &RoverConfig) -> Result<PathBuf, String> {
    let path = config_path();
    save_to(cfg, &path)?;
    Ok(path)
}

pub(crate) fn save_to(cfg: &RoverConfig, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw = to_toml(cfg)?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}

pub fn to_toml(cfg: &RoverConfig) -> Result<String, String> {
    toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))
}
