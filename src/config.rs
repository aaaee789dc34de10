//! Configuration loading for the costmap and its layers.
//!
//! Files are YAML key/value documents; every key has a default so an empty
//! document is valid. Validation happens at load time and produces
//! [`CostmapError::Config`] for values the costmap cannot start with.

use std::path::Path;

use glam::{UVec2, Vec2};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::footprint::Footprint;
use crate::layers::InflationConfig;
use crate::types::{CostmapError, MapInfo};

/// Boolean-ish flag: accepts `true`/`false` as well as `0`/`1`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i32),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Int(value) => *value != 0,
        }
    }
}

fn flag_off() -> Flag {
    Flag::Bool(false)
}

/// Top-level costmap configuration (`costmap.yaml`).
#[derive(Debug, Clone, Deserialize)]
pub struct CostmapConfig {
    /// When set, uninitialized cells read as no-information instead of free.
    #[serde(default = "flag_off")]
    track_unknown_space: Flag,
    /// Robot polygon, meters, as a bracketed point list.
    #[serde(default = "default_footprint")]
    pub footprint: String,
    /// Outward padding applied to the footprint, meters.
    #[serde(default)]
    pub footprint_padding: f32,
    /// Map width in meters.
    #[serde(default = "default_map_width")]
    pub map_width: f32,
    /// Map height in meters.
    #[serde(default = "default_map_height")]
    pub map_height: f32,
    /// Meters per cell.
    #[serde(default = "default_resolution")]
    pub resolution: f32,
    /// Update loop frequency, Hz.
    #[serde(default = "default_map_update_frequency")]
    pub map_update_frequency: f32,
    #[serde(default)]
    pub origin_x: f32,
    #[serde(default)]
    pub origin_y: f32,
    /// When set, the grid origin follows the robot.
    #[serde(default = "flag_off")]
    rolling_window: Flag,
}

fn default_footprint() -> String {
    "[[0.16, 0.16], [0.16, -0.16], [-0.16, -0.16], [-0.16, 0.16]]".to_string()
}

fn default_map_width() -> f32 {
    6.0
}

fn default_map_height() -> f32 {
    6.0
}

fn default_resolution() -> f32 {
    0.01
}

fn default_map_update_frequency() -> f32 {
    1.0
}

impl Default for CostmapConfig {
    fn default() -> Self {
        Self {
            track_unknown_space: flag_off(),
            footprint: default_footprint(),
            footprint_padding: 0.0,
            map_width: default_map_width(),
            map_height: default_map_height(),
            resolution: default_resolution(),
            map_update_frequency: default_map_update_frequency(),
            origin_x: 0.0,
            origin_y: 0.0,
            rolling_window: flag_off(),
        }
    }
}

impl CostmapConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, CostmapError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CostmapError> {
        Self::from_yaml_str(&std::fs::read_to_string(path)?)
    }

    pub fn track_unknown_space(&self) -> bool {
        self.track_unknown_space.is_set()
    }

    pub fn rolling_window(&self) -> bool {
        self.rolling_window.is_set()
    }

    pub fn parse_footprint(&self) -> Result<Footprint, CostmapError> {
        Footprint::parse(&self.footprint)
    }

    /// Grid metadata implied by the configured extent and resolution.
    pub fn map_info(&self) -> MapInfo {
        MapInfo {
            width: (self.map_width / self.resolution) as u32,
            height: (self.map_height / self.resolution) as u32,
            resolution: self.resolution,
            origin: Vec2::new(self.origin_x, self.origin_y),
        }
    }

    pub fn size_cells(&self) -> UVec2 {
        let info = self.map_info();
        UVec2::new(info.width, info.height)
    }

    pub fn validate(&self) -> Result<(), CostmapError> {
        if !self.resolution.is_finite() || self.resolution <= 0.0 {
            return Err(CostmapError::Config(format!(
                "resolution must be finite and positive, got {}",
                self.resolution
            )));
        }
        if !self.map_width.is_finite()
            || !self.map_height.is_finite()
            || self.map_width <= 0.0
            || self.map_height <= 0.0
        {
            return Err(CostmapError::Config(format!(
                "map extent must be finite and positive, got {} x {}",
                self.map_width, self.map_height
            )));
        }
        if !self.map_update_frequency.is_finite() || self.map_update_frequency <= 0.0 {
            return Err(CostmapError::Config(format!(
                "map_update_frequency must be finite and positive, got {}",
                self.map_update_frequency
            )));
        }
        if !self.footprint_padding.is_finite() || self.footprint_padding < 0.0 {
            return Err(CostmapError::Config(format!(
                "footprint_padding must be finite and non-negative, got {}",
                self.footprint_padding
            )));
        }
        self.parse_footprint()?;
        Ok(())
    }
}

/// Load the inflation layer configuration (`inflation_layer.yaml`).
pub fn load_inflation_config(path: impl AsRef<Path>) -> Result<InflationConfig, CostmapError> {
    let config: InflationConfig = load_yaml(path)?;
    validate_inflation(&config)?;
    Ok(config)
}

pub fn inflation_config_from_str(s: &str) -> Result<InflationConfig, CostmapError> {
    let config: InflationConfig = serde_yaml::from_str(s)?;
    validate_inflation(&config)?;
    Ok(config)
}

fn validate_inflation(config: &InflationConfig) -> Result<(), CostmapError> {
    if !config.inflation_radius.is_finite() || config.inflation_radius < 0.0 {
        return Err(CostmapError::Config(format!(
            "inflation_radius must be finite and non-negative, got {}",
            config.inflation_radius
        )));
    }
    if !config.cost_scaling_factor.is_finite() || config.cost_scaling_factor < 0.0 {
        return Err(CostmapError::Config(format!(
            "cost_scaling_factor must be finite and non-negative, got {}",
            config.cost_scaling_factor
        )));
    }
    Ok(())
}

fn load_yaml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, CostmapError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = CostmapConfig::from_yaml_str("{}").unwrap();
        assert!(!config.track_unknown_space());
        assert!(!config.rolling_window());
        assert_eq!(config.map_width, 6.0);
        assert_eq!(config.resolution, 0.01);
        assert_eq!(config.map_update_frequency, 1.0);
        assert_eq!(config.size_cells(), UVec2::new(600, 600));
        assert_eq!(config.parse_footprint().unwrap().points().len(), 4);
    }

    #[test]
    fn integer_flags_are_accepted() {
        let config = CostmapConfig::from_yaml_str("track_unknown_space: 1\nrolling_window: 0\n")
            .unwrap();
        assert!(config.track_unknown_space());
        assert!(!config.rolling_window());
    }

    #[test]
    fn overridden_keys_parse() {
        let yaml = "map_width: 10.0\nmap_height: 4.0\nresolution: 0.5\nmap_update_frequency: 5.0\n";
        let config = CostmapConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.size_cells(), UVec2::new(20, 8));
        assert_eq!(config.map_update_frequency, 5.0);
    }

    #[test]
    fn bad_resolution_is_rejected() {
        assert!(CostmapConfig::from_yaml_str("resolution: 0.0").is_err());
        assert!(CostmapConfig::from_yaml_str("resolution: -0.05").is_err());
        assert!(CostmapConfig::from_yaml_str("resolution: .nan").is_err());
    }

    #[test]
    fn bad_footprint_is_rejected() {
        assert!(CostmapConfig::from_yaml_str("footprint: \"[[1, 1], [1, -1]]\"").is_err());
        assert!(CostmapConfig::from_yaml_str("footprint: \"garbage\"").is_err());
    }

    #[test]
    fn inflation_defaults_and_overrides() {
        let config = inflation_config_from_str("{}").unwrap();
        assert_eq!(config.inflation_radius, 0.55);
        assert_eq!(config.cost_scaling_factor, 10.0);

        let config = inflation_config_from_str("inflation_radius: 1.1\n").unwrap();
        assert_eq!(config.inflation_radius, 1.1);

        assert!(inflation_config_from_str("inflation_radius: -1.0").is_err());
    }
}
