//! Configuration – reads/writes `~/.odolink/config.toml`.

use odolink_perception::WheelOdometryConfig;
use odolink_runtime::PoseTrace;
use odolink_types::TelemetryError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persisted operator configuration stored in `~/.odolink/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Serial device node, replay file, or `-` for stdin.
    #[serde(default = "default_link_path")]
    pub link_path: String,

    /// Line speed the serial port is opened at (8N1, no flow control).
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Wheel radius in metres.
    #[serde(default = "default_wheel_radius")]
    pub wheel_radius: f64,

    /// Distance between the wheels in metres.
    #[serde(default = "default_wheel_base")]
    pub wheel_base: f64,

    /// Encoder pulses per wheel revolution.
    #[serde(default = "default_counts_per_revolution")]
    pub counts_per_revolution: f64,

    /// Monitor poll cadence.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Number of points kept in the rolling pose trace.
    #[serde(default = "default_trace_capacity")]
    pub trace_capacity: usize,

    /// Trace points older than this many seconds are dropped.
    #[serde(default = "default_trace_window_secs")]
    pub trace_window_secs: u64,

    /// Period of the interval command sender.
    #[serde(default = "default_pulse_interval_ms")]
    pub pulse_interval_ms: u64,
}

fn default_link_path() -> String {
    "/dev/ttyUSB0".to_string()
}
fn default_baud_rate() -> u32 {
    921_600
}
fn default_wheel_radius() -> f64 {
    0.1
}
fn default_wheel_base() -> f64 {
    0.5
}
fn default_counts_per_revolution() -> f64 {
    360.0
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_trace_capacity() -> usize {
    500
}
fn default_trace_window_secs() -> u64 {
    60
}
fn default_pulse_interval_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            link_path: default_link_path(),
            baud_rate: default_baud_rate(),
            wheel_radius: default_wheel_radius(),
            wheel_base: default_wheel_base(),
            counts_per_revolution: default_counts_per_revolution(),
            poll_interval_ms: default_poll_interval_ms(),
            trace_capacity: default_trace_capacity(),
            trace_window_secs: default_trace_window_secs(),
            pulse_interval_ms: default_pulse_interval_ms(),
        }
    }
}

impl Config {
    /// Validated wheel geometry for the estimators.
    pub fn odometry(&self) -> Result<WheelOdometryConfig, TelemetryError> {
        WheelOdometryConfig::new(self.wheel_radius, self.wheel_base, self.counts_per_revolution)
    }

    /// Empty pose trace with the configured bounds.
    pub fn pose_trace(&self) -> Result<PoseTrace, TelemetryError> {
        Ok(PoseTrace::new(self.trace_capacity)?.with_window(Duration::from_secs(self.trace_window_secs)))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn pulse_interval(&self) -> Duration {
        Duration::from_millis(self.pulse_interval_ms)
    }
}

/// Return the path to `~/.odolink/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".odolink").join("config.toml")
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Load the config, or write and return the defaults on first run.
pub fn load_or_init() -> Result<Config, String> {
    load_or_init_at(&config_path())
}

pub(crate) fn load_or_init_at(path: &Path) -> Result<Config, String> {
    if let Some(cfg) = load_from(path)? {
        return Ok(cfg);
    }
    let mut cfg = Config::default();
    save_to(&cfg, path)?;
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Apply `ODOLINK_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ODOLINK_LINK` | `link_path` |
/// | `ODOLINK_BAUD` | `baud_rate` |
/// | `ODOLINK_POLL_MS` | `poll_interval_ms` |
///
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ODOLINK_LINK")
        && !v.trim().is_empty()
    {
        cfg.link_path = v;
    }
    if let Ok(v) = std::env::var("ODOLINK_BAUD")
        && let Ok(baud) = v.parse::<u32>()
    {
        cfg.baud_rate = baud;
    }
    if let Ok(v) = std::env::var("ODOLINK_POLL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.poll_interval_ms = ms;
    }
}

/// Save the config to `path`, creating its directory if necessary.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner-only directory (rwx------) on Unix.
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

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);

        let dir_meta = std::fs::metadata(path.parent().unwrap()).expect("dir metadata");
        assert_eq!(dir_meta.permissions().mode() & 0o777, 0o700);
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.wheel_base, 0.5);
        assert_eq!(loaded.wheel_radius, 0.1);
        assert_eq!(loaded.counts_per_revolution, 360.0);
        assert_eq!(loaded.trace_capacity, 500);
        assert_eq!(loaded.trace_window_secs, 60);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "wheel_base = 0.42\n").unwrap();

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.wheel_base, 0.42);
        assert_eq!(loaded.wheel_radius, 0.1);
        assert_eq!(loaded.pulse_interval_ms, 1000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "wheel_base = \"wide\"\n").unwrap();
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn first_run_writes_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(!path.exists());

        let cfg = load_or_init_at(&path).expect("init");
        assert!(path.exists());
        assert_eq!(cfg.wheel_base, 0.5);
    }

    #[test]
    fn config_path_points_to_odolink_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".odolink"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        let cfg = Config {
            wheel_base: 0.0,
            ..Config::default()
        };
        assert!(matches!(cfg.odometry(), Err(TelemetryError::Config(_))));
        assert!(Config::default().odometry().is_ok());
    }

    #[test]
    fn pose_trace_uses_configured_bounds() {
        let cfg = Config {
            trace_capacity: 7,
            trace_window_secs: 5,
            ..Config::default()
        };
        let trace = cfg.pose_trace().expect("trace");
        assert_eq!(trace.capacity(), 7);
        assert_eq!(trace.window(), Duration::from_secs(5));

        let empty = Config {
            trace_capacity: 0,
            ..Config::default()
        };
        assert!(empty.pose_trace().is_err());
    }

    // Env overrides share process state, so they are exercised in one test.
    #[test]
    fn apply_env_overrides_reads_odolink_vars() {
        // SAFETY: no other test in this crate touches ODOLINK_* vars.
        unsafe {
            std::env::set_var("ODOLINK_LINK", "-");
            std::env::set_var("ODOLINK_BAUD", "115200");
            std::env::set_var("ODOLINK_POLL_MS", "not-a-number");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.link_path, "-");
        assert_eq!(cfg.baud_rate, 115_200);
        assert_eq!(cfg.poll_interval_ms, 100);

        unsafe {
            std::env::remove_var("ODOLINK_LINK");
            std::env::remove_var("ODOLINK_BAUD");
            std::env::remove_var("ODOLINK_POLL_MS");
        }
    }
}
