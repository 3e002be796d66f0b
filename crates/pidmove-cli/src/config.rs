//! Robot configuration – reads/writes `~/.pidmove/config.toml`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pidmove_hal::sim::{
    LineBand, ReflectanceProfile, SimConfig, GYRO_PORT, LEFT_LINE_SENSOR_PORT, LEFT_MOTOR_PORT,
    RIGHT_LINE_SENSOR_PORT, RIGHT_MOTOR_PORT, TRACKING_SENSOR_PORT,
};
use pidmove_motion::defaults::{DefaultsConfig, KnownThreshold, TuningTable, Wiring};
use pidmove_motion::guard::{CancelToken, RunGuard};
use pidmove_types::{PartialTuning, Tuning};

/// Limits applied to every behavior the CLI runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    /// Wall-clock limit per behavior, in milliseconds.  `0` disables it.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Tick budget per behavior.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ticks: Option<u64>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_ticks: None,
        }
    }
}

impl RunSettings {
    pub fn guard(&self, cancel: &CancelToken) -> RunGuard {
        let mut guard = RunGuard::default().with_cancel(cancel.clone());
        if self.timeout_ms > 0 {
            guard = guard.with_timeout(Duration::from_millis(self.timeout_ms));
        }
        if let Some(max) = self.max_ticks {
            guard = guard.with_max_ticks(max);
        }
        guard
    }
}

/// The simulated field used by `pidmove run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSettings {
    /// How far ahead of its wheel each squaring sensor sits, left then
    /// right.  Unequal offsets make the robot meet the line at an angle.
    #[serde(default = "default_square_sensor_offsets")]
    pub square_sensor_offsets: [f64; 2],

    #[serde(default = "default_world")]
    pub world: SimConfig,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            square_sensor_offsets: default_square_sensor_offsets(),
            world: default_world(),
        }
    }
}

/// Persisted configuration stored in `~/.pidmove/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunSettings,

    /// Wiring, tunings and thresholds handed to the movement behaviors.
    /// Keys present in the file override the built-in defaults one by one.
    #[serde(default = "default_motion", deserialize_with = "motion_over_defaults")]
    pub motion: DefaultsConfig,

    #[serde(default)]
    pub sim: SimSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run: RunSettings::default(),
            motion: default_motion(),
            sim: SimSettings::default(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_square_sensor_offsets() -> [f64; 2] {
    [0.0, -12.0]
}

fn default_world() -> SimConfig {
    SimConfig {
        initial_lateral: -12.0,
        line: Some(LineBand {
            start: 600.0,
            width: 60.0,
            profile: ReflectanceProfile::default(),
        }),
        ..SimConfig::default()
    }
}

fn default_motion() -> DefaultsConfig {
    DefaultsConfig {
        wiring: Wiring {
            left_motor: Some(LEFT_MOTOR_PORT),
            right_motor: Some(RIGHT_MOTOR_PORT),
            gyro: Some(GYRO_PORT),
            line_sensor: Some(TRACKING_SENSOR_PORT),
            left_line_sensor: Some(LEFT_LINE_SENSOR_PORT),
            right_line_sensor: Some(RIGHT_LINE_SENSOR_PORT),
        },
        tuning: TuningTable {
            gyro_straight: Tuning::gains(3.0, 0.0, 0.0).with_output_limit(300.0).into(),
            gyro_turn_single: Tuning::gains(6.0, 0.0, 0.0).with_output_limit(500.0).into(),
            gyro_turn_double: Tuning::gains(3.0, 0.0, 0.0).with_output_limit(400.0).into(),
            line_track: Tuning::gains(1.0, 0.0, 50.0).into(),
            line_square: Tuning::gains(2.0, 0.0, 0.0).with_output_limit(200.0).into(),
            encoder_straight: PartialTuning::from(Tuning::gains(2.0, 0.0, 0.0)),
        },
        thresholds: [LEFT_LINE_SENSOR_PORT, RIGHT_LINE_SENSOR_PORT, TRACKING_SENSOR_PORT]
            .into_iter()
            .map(|sensor| KnownThreshold { sensor, threshold: 45 })
            .collect(),
        ..DefaultsConfig::default()
    }
}

/// Deserialize `[motion]` on top of [`default_motion`]: nested tables merge
/// key by key, arrays and scalars replace.
fn motion_over_defaults<'de, D>(deserializer: D) -> Result<DefaultsConfig, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = toml::Table::deserialize(deserializer)?;
    let defaults = toml::Value::try_from(default_motion()).map_err(D::Error::custom)?;
    let mut merged: toml::Table = defaults.try_into().map_err(D::Error::custom)?;
    merge_table(&mut merged, overrides);
    toml::Value::Table(merged).try_into().map_err(D::Error::custom)
}

fn merge_table(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        match value {
            toml::Value::Table(value) if matches!(base.get(&key), Some(toml::Value::Table(_))) => {
                if let Some(toml::Value::Table(inner)) = base.get_mut(&key) {
                    merge_table(inner, value);
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

/// Return the path to `~/.pidmove/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".pidmove").join("config.toml")
}

/// Load the config from `path`, falling back to [`Config::default`] when the
/// file does not exist, then apply environment overrides.
pub fn load(path: &Path) -> Result<Config, String> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config from a specific path.  Returns `None` if the file does not
/// exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Cannot read pidmove config {}: {e}", path.display()))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| format!("Cannot parse pidmove config {}: {e}", path.display()))?;
    Ok(Some(cfg))
}

/// Apply `PIDMOVE_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `PIDMOVE_TIMEOUT_MS` | `run.timeout_ms` |
/// | `PIDMOVE_MAX_TICKS` | `run.max_ticks` |
/// | `PIDMOVE_APPROACH_SPEED` | `motion.line_square.approach_speed` |
/// | `PIDMOVE_SETTLE_MS` | `motion.line_square.settle_ms` |
///
/// Values that fail to parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("PIDMOVE_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>() {
            cfg.run.timeout_ms = ms;
        }
    if let Ok(v) = std::env::var("PIDMOVE_MAX_TICKS")
        && let Ok(ticks) = v.parse::<u64>() {
            cfg.run.max_ticks = Some(ticks);
        }
    if let Ok(v) = std::env::var("PIDMOVE_APPROACH_SPEED")
        && let Ok(speed) = v.parse::<f64>()
        && speed.is_finite() {
            cfg.motion.line_square.approach_speed = speed;
        }
    if let Ok(v) = std::env::var("PIDMOVE_SETTLE_MS")
        && let Ok(ms) = v.parse::<u64>() {
            cfg.motion.line_square.settle_ms = ms;
        }
}

/// Write `cfg` as TOML to `path` for a later `pidmove run`, creating the
/// `.pidmove` directory when needed.  On Unix the directory is made
/// owner-only and the file owner read/write.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Cannot create pidmove config directory {}: {e}", parent.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Cannot restrict pidmove config directory {}: {e}", parent.display()))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Cannot encode pidmove config as TOML: {e}"))?;
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
            .map_err(|e| format!("Cannot write pidmove config {}: {e}", path.display()))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Cannot write pidmove config {}: {e}", path.display()))?;
    Ok(())
}
