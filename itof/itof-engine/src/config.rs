//! Outer-program configuration: recognized options the core consumes as a
//! plain struct, `serde`-derived like the rest of this workspace's
//! configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How the sensor head's clock is synchronized at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeSyncMode {
    None,
    Ptp,
    Pps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mapping_path: Option<PathBuf>,
    pub pixel_mask_path: Option<PathBuf>,
    #[serde(default = "default_time_sync_mode")]
    pub startup_time_sync_mode: TimeSyncMode,
    #[serde(default = "default_raw_dump_prefix")]
    pub raw_dump_prefix: PathBuf,
    #[serde(default = "default_raw_dump_max_rois")]
    pub raw_dump_max_rois: u32,
    #[serde(default = "default_max_net_frames")]
    pub max_net_frames: u32,
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    pub head_num: u32,
}

fn default_time_sync_mode() -> TimeSyncMode {
    TimeSyncMode::None
}

fn default_raw_dump_prefix() -> PathBuf {
    PathBuf::from(crate::raw_dump::DEFAULT_DUMP_PATH)
}

fn default_raw_dump_max_rois() -> u32 {
    1
}

fn default_max_net_frames() -> u32 {
    8
}

fn default_base_port() -> u16 {
    5000
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mapping_path: None,
            pixel_mask_path: None,
            startup_time_sync_mode: default_time_sync_mode(),
            raw_dump_prefix: default_raw_dump_prefix(),
            raw_dump_max_rois: default_raw_dump_max_rois(),
            max_net_frames: default_max_net_frames(),
            base_port: default_base_port(),
            head_num: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let cfg = Config::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.base_port, cfg.base_port);
        assert_eq!(back.startup_time_sync_mode, cfg.startup_time_sync_mode);
    }

    #[test]
    fn missing_optional_fields_fall_back_to_defaults() {
        let json = r#"{"mapping_path": null, "pixel_mask_path": null, "head_num": 3}"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.head_num, 3);
        assert_eq!(cfg.base_port, 5000);
        assert_eq!(cfg.startup_time_sync_mode, TimeSyncMode::None);
    }
}
