//! Operator configuration – reads/writes `~/.atlas/config.toml`.

use atlas_fleet::FleetConfig;
use atlas_runtime::SessionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted operator configuration stored in `~/.atlas/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Device id the local session registers under.
    #[serde(default = "default_device_id")]
    pub device_id: String,

    /// Per-agent pipeline: world, predictor, planner, serializer.
    #[serde(default)]
    pub session: SessionConfig,

    /// Fleet coordinator tuning.
    #[serde(default)]
    pub fleet: FleetConfig,
}

fn default_device_id() -> String {
    "atlas-01".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_id: default_device_id(),
            session: SessionConfig::default(),
            fleet: FleetConfig::default(),
        }
    }
}

/// Return the path to `~/.atlas/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".atlas").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    let mut cfg = read_from(path)?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Parse the file at `path` without applying environment overrides.
pub(crate) fn read_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    toml::from_str(&raw)
        .map(Some)
        .map_err(|e| format!("Failed to parse config: {}", e))
}

/// Apply `ATLAS_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ATLAS_DEVICE_ID` | `device_id` |
/// | `ATLAS_RESOLUTION_CM` | `session.world.resolution_cm` |
/// | `ATLAS_INFLATION_CELLS` | `session.planner.obstacle_inflation_cells` |
/// | `ATLAS_WAYPOINT_SPACING` | `session.planner.waypoint_spacing` |
/// | `ATLAS_MAX_FLEET` | `fleet.max_members` |
///
/// Unparseable or non-positive values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ATLAS_DEVICE_ID")
        && !v.trim().is_empty()
    {
        cfg.device_id = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("ATLAS_RESOLUTION_CM")
        && let Ok(res) = v.parse::<f32>()
        && res.is_finite()
        && res > 0.0
    {
        cfg.session.world.resolution_cm = res;
    }
    if let Ok(v) = std::env::var("ATLAS_INFLATION_CELLS")
        && let Ok(cells) = v.parse::<u32>()
    {
        cfg.session.planner.obstacle_inflation_cells = cells;
    }
    if let Ok(v) = std::env::var("ATLAS_WAYPOINT_SPACING")
        && let Ok(spacing) = v.parse::<usize>()
        && spacing > 0
    {
        cfg.session.planner.waypoint_spacing = spacing;
    }
    if let Ok(v) = std::env::var("ATLAS_MAX_FLEET")
        && let Ok(max) = v.parse::<usize>()
        && max > 0
    {
        cfg.fleet.max_members = max;
    }
}

/// Save the config to disk, creating `~/.atlas/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_fleet::MergeStrategy;

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let mut cfg = Config::default();
        cfg.session.world.world_width_m = 8.0;
        cfg.fleet.merge_strategy = MergeStrategy::LatestUpdate;
        save_to(&cfg, &path).expect("save");

        let loaded = read_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.session.world.world_width_m, 8.0);
        assert_eq!(loaded.fleet.merge_strategy, MergeStrategy::LatestUpdate);
        assert_eq!(loaded.device_id, "atlas-01");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "device_id = \"scout\"\n[session.planner]\nwaypoint_spacing = 5\n")
            .unwrap();

        let loaded = read_from(&path).unwrap().unwrap();
        assert_eq!(loaded.device_id, "scout");
        assert_eq!(loaded.session.planner.waypoint_spacing, 5);
        assert_eq!(loaded.session.planner.unknown_cost, 3.0);
        assert_eq!(loaded.session.world.resolution_cm, 10.0);
        assert_eq!(loaded.fleet.max_members, 8);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "device_id = [").unwrap();
        let err = read_from(&path).unwrap_err();
        assert!(err.contains("parse"));
    }

    #[test]
    fn config_path_points_to_atlas_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".atlas"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn apply_env_overrides_changes_planner_and_world() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe {
            std::env::set_var("ATLAS_RESOLUTION_CM", "5");
            std::env::set_var("ATLAS_INFLATION_CELLS", "2");
            std::env::set_var("ATLAS_WAYPOINT_SPACING", "4");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.session.world.resolution_cm, 5.0);
        assert_eq!(cfg.session.planner.obstacle_inflation_cells, 2);
        assert_eq!(cfg.session.planner.waypoint_spacing, 4);
        unsafe {
            std::env::remove_var("ATLAS_RESOLUTION_CM");
            std::env::remove_var("ATLAS_INFLATION_CELLS");
            std::env::remove_var("ATLAS_WAYPOINT_SPACING");
        }
    }

    #[test]
    fn apply_env_overrides_fleet_size() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("ATLAS_MAX_FLEET", "3") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.fleet.max_members, 3);

        unsafe { std::env::set_var("ATLAS_MAX_FLEET", "zero") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.fleet.max_members, 8);
        unsafe { std::env::remove_var("ATLAS_MAX_FLEET") };
    }
}
