//! Station configuration – reads `~/.nev-gcs/config.toml`.
//!
//! Every section and every field is optional; anything missing takes its
//! default.  `GCS_CONFIG` points at a different file.

use std::fs;
use std::path::{Path, PathBuf};

use gcs_cockpit::CockpitConfig;
use gcs_hal::JoystickConfig;
use gcs_kernel::ValidationConfig;
use gcs_middleware::{LinkConfig, TransportKind};
use gcs_runtime::DispatchConfig;
use gcs_types::GcsError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub joystick: JoystickConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub cockpit: CockpitConfig,
}

/// `$GCS_CONFIG`, else `~/.nev-gcs/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("GCS_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".nev-gcs").join("config.toml")
}

/// Load from [`config_path`] and apply environment overrides.  A missing
/// file yields `Ok(None)`.
pub fn load() -> Result<Option<Config>, GcsError> {
    let loaded = load_from(&config_path())?;
    Ok(loaded.map(|mut cfg| {
        apply_env_overrides(&mut cfg);
        cfg
    }))
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, GcsError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| GcsError::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| GcsError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `GCS_*` environment overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `GCS_VEHICLE_ADDR` | `link.vehicle_addr` |
/// | `GCS_TRANSPORT` | `link.transport` |
/// | `GCS_MQTT_HOST` | `link.mqtt_host` |
/// | `GCS_COCKPIT_PORT` | `cockpit.port` |
///
/// Unparsable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides_from(cfg, |key| std::env::var(key).ok());
}

fn apply_overrides_from(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("GCS_VEHICLE_ADDR") {
        cfg.link.vehicle_addr = v;
    }
    if let Some(v) = lookup("GCS_TRANSPORT")
        && let Ok(kind) = v.parse::<TransportKind>()
    {
        cfg.link.transport = kind;
    }
    if let Some(v) = lookup("GCS_MQTT_HOST") {
        cfg.link.mqtt_host = v;
    }
    if let Some(v) = lookup("GCS_COCKPIT_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.cockpit.port = port;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        fs::write(&path, body).expect("write config");
        path
    }

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn config_path_points_to_gcs_dir() {
        let p = config_path_for_home("/home/operator");
        assert!(p.to_string_lossy().contains(".nev-gcs"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let result = load_from(&dir.path().join("absent.toml")).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn empty_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let cfg = load_from(&write(&dir, "")).expect("load").expect("some");
        assert_eq!(cfg.link.transport, TransportKind::Udp);
        assert_eq!(cfg.joystick.axis_speed, 1);
        assert_eq!(cfg.dispatch.heartbeat_rate, 5.0);
        assert_eq!(cfg.validation.stale_after_secs, 3.0);
        assert_eq!(cfg.cockpit.port, 8080);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let body = r#"
            [link]
            transport = "mqtt"
            mqtt_host = "broker.local"

            [joystick]
            axis_speed = 7
            invert_speed = false

            [dispatch]
            teleop_rate = 10.0

            [validation]
            stale_after_secs = 1.5
        "#;
        let cfg = load_from(&write(&dir, body)).expect("load").expect("some");
        assert_eq!(cfg.link.transport, TransportKind::Mqtt);
        assert_eq!(cfg.link.mqtt_host, "broker.local");
        assert_eq!(cfg.link.mqtt_port, 1883);
        assert_eq!(cfg.joystick.axis_speed, 7);
        assert!(!cfg.joystick.invert_speed);
        assert_eq!(cfg.joystick.deadzone, 0.05);
        assert_eq!(cfg.dispatch.teleop_rate, 10.0);
        assert_eq!(cfg.dispatch.heartbeat_rate, 5.0);
        assert_eq!(cfg.validation.stale_after_secs, 1.5);
        assert_eq!(cfg.validation.motion_threshold, 0.05);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let err = load_from(&write(&dir, "[link\ntransport = ")).unwrap_err();
        assert!(matches!(err, GcsError::Config(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        apply_overrides_from(
            &mut cfg,
            overrides(&[
                ("GCS_VEHICLE_ADDR", "10.0.0.5:47001"),
                ("GCS_TRANSPORT", "MQTT"),
                ("GCS_MQTT_HOST", "broker"),
                ("GCS_COCKPIT_PORT", "9000"),
            ]),
        );
        assert_eq!(cfg.link.vehicle_addr, "10.0.0.5:47001");
        assert_eq!(cfg.link.transport, TransportKind::Mqtt);
        assert_eq!(cfg.link.mqtt_host, "broker");
        assert_eq!(cfg.cockpit.port, 9000);
    }

    #[test]
    fn unparsable_env_values_are_ignored() {
        let mut cfg = Config::default();
        apply_overrides_from(
            &mut cfg,
            overrides(&[("GCS_TRANSPORT", "carrier-pigeon"), ("GCS_COCKPIT_PORT", "not-a-port")]),
        );
        assert_eq!(cfg.link.transport, TransportKind::Udp);
        assert_eq!(cfg.cockpit.port, 8080);
    }

    #[test]
    fn default_config_serialises_to_loadable_toml() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let body = toml::to_string_pretty(&Config::default()).expect("serialise");
        let cfg = load_from(&write(&dir, &body)).expect("load").expect("some");
        assert_eq!(cfg.link.bind_addr, "0.0.0.0:47000");
        assert_eq!(cfg.joystick.max_steer_deg, 27.0);
    }
}
