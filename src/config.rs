//! Packing configuration.
//!
//! Two layers of configuration feed a run:
//!
//! - **[`PackConfig`]**: optional `imgpacker.toml`, sparse, merged over the
//!   stock defaults. Holds the transform flags, filter strengths, canvas
//!   background and worker count.
//! - **[`TransformConfig`]**: the validated, immutable value handed to every
//!   transform invocation. Built once per run from the CLI arguments and the
//!   loaded [`PackConfig`].
//!
//! ## Config File
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [transforms]
//! flatten_alpha = false
//! blur_before = false
//! blur_after = false
//! sharpen_before = false
//! sharpen_after = false
//! median_before = false
//! median_after = false
//! flip_vertical = false
//! flop_horizontal = false
//!
//! [filters]
//! blur_sigma = 1.0
//! sharpen_sigma = 1.0
//! sharpen_threshold = 0
//! median_radius = 1
//! flatten_background = "#000000"
//!
//! [canvas]
//! background = "#00000000"
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Smallest accepted tile side, in pixels.
pub const MIN_CELL_SIZE: u32 = 4;
/// Smallest accepted column count.
pub const MIN_COLUMNS: u32 = 1;
/// Largest accepted median filter radius.
pub const MAX_MEDIAN_RADIUS: u32 = 16;
/// Name of the config file looked up in the input directory.
pub const CONFIG_FILENAME: &str = "imgpacker.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("CellSize must be at least {MIN_CELL_SIZE} (got {0})")]
    CellSizeTooSmall(u32),
    #[error("Columns must be at least {MIN_COLUMNS} (got {0})")]
    ColumnsTooSmall(u32),
    #[error("Invalid InputFolder path: `{0}`")]
    InvalidInputDir(PathBuf),
    #[error("Invalid OutputFile path: `{0}`")]
    InvalidOutputPath(PathBuf),
    #[error("Unsupported output format `{0}` (expected png, tif, tiff or webp)")]
    UnsupportedOutputFormat(String),
    #[error("Invalid color `{0}` (expected #RRGGBB or #RRGGBBAA)")]
    InvalidColor(String),
    #[error("Config validation error: {0}")]
    Validation(String),
}

// =============================================================================
// Colors
// =============================================================================

/// An RGBA color, written in config files as `#RRGGBB` or `#RRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const TRANSPARENT: Color = Color([0, 0, 0, 0]);
    pub const BLACK: Color = Color([0, 0, 0, 255]);

    pub fn rgba(self) -> image::Rgba<u8> {
        image::Rgba(self.0)
    }

    pub fn is_opaque(self) -> bool {
        self.0[3] == 255
    }
}

impl FromStr for Color {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidColor(s.to_string());
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Color([channel(0)?, channel(2)?, channel(4)?, alpha]))
    }
}

impl TryFrom<String> for Color {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        if a == 255 {
            write!(f, "#{r:02x}{g:02x}{b:02x}")
        } else {
            write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

// =============================================================================
// Config file sections
// =============================================================================

/// Configuration loaded from `imgpacker.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackConfig {
    /// Which optional transform stages run.
    pub transforms: TransformFlags,
    /// Strength of the blur, sharpen, median and flatten stages.
    pub filters: FilterSettings,
    /// Output canvas settings.
    pub canvas: CanvasConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl PackConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.filters.validate()
    }
}

/// Optional per-image transform stages.
///
/// The order in which flags are set has no effect: stages always run in the
/// fixed order of [`plan_stages`](crate::imaging::operations::plan_stages).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformFlags {
    pub flatten_alpha: bool,
    pub blur_before: bool,
    pub blur_after: bool,
    pub sharpen_before: bool,
    pub sharpen_after: bool,
    pub median_before: bool,
    pub median_after: bool,
    pub flip_vertical: bool,
    pub flop_horizontal: bool,
}

impl TransformFlags {
    /// Flags enabled in either set.
    pub fn union(self, other: TransformFlags) -> TransformFlags {
        TransformFlags {
            flatten_alpha: self.flatten_alpha || other.flatten_alpha,
            blur_before: self.blur_before || other.blur_before,
            blur_after: self.blur_after || other.blur_after,
            sharpen_before: self.sharpen_before || other.sharpen_before,
            sharpen_after: self.sharpen_after || other.sharpen_after,
            median_before: self.median_before || other.median_before,
            median_after: self.median_after || other.median_after,
            flip_vertical: self.flip_vertical || other.flip_vertical,
            flop_horizontal: self.flop_horizontal || other.flop_horizontal,
        }
    }
}

/// Filter strengths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterSettings {
    /// Gaussian blur standard deviation.
    pub blur_sigma: f32,
    /// Unsharp-mask blur standard deviation.
    pub sharpen_sigma: f32,
    /// Minimum brightness difference to sharpen (0 = sharpen all pixels).
    pub sharpen_threshold: i32,
    /// Median window radius; the window is `(2r + 1)²` pixels.
    pub median_radius: u32,
    /// Color transparent pixels are flattened against.
    pub flatten_background: Color,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            blur_sigma: 1.0,
            sharpen_sigma: 1.0,
            sharpen_threshold: 0,
            median_radius: 1,
            flatten_background: Color::BLACK,
        }
    }
}

impl FilterSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.blur_sigma.is_finite() && self.blur_sigma > 0.0) {
            return Err(ConfigError::Validation(
                "filters.blur_sigma must be a positive number".into(),
            ));
        }
        if !(self.sharpen_sigma.is_finite() && self.sharpen_sigma > 0.0) {
            return Err(ConfigError::Validation(
                "filters.sharpen_sigma must be a positive number".into(),
            ));
        }
        if self.sharpen_threshold < 0 {
            return Err(ConfigError::Validation(
                "filters.sharpen_threshold must not be negative".into(),
            ));
        }
        if self.median_radius == 0 || self.median_radius > MAX_MEDIAN_RADIUS {
            return Err(ConfigError::Validation(format!(
                "filters.median_radius must be 1-{MAX_MEDIAN_RADIUS}"
            )));
        }
        if !self.flatten_background.is_opaque() {
            return Err(ConfigError::Validation(
                "filters.flatten_background must be opaque".into(),
            ));
        }
        Ok(())
    }
}

/// Output canvas settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CanvasConfig {
    /// Fill color for cells with no image.
    pub background: Color,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            background: Color::TRANSPARENT,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Validated transform configuration
// =============================================================================

/// Immutable per-run transform settings, shared by reference with every
/// transform invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformConfig {
    cell_size: u32,
    flags: TransformFlags,
    filters: FilterSettings,
}

impl TransformConfig {
    /// Build a config with default filter strengths.
    pub fn new(cell_size: u32, flags: TransformFlags) -> Result<Self, ConfigError> {
        Self::with_filters(cell_size, flags, FilterSettings::default())
    }

    pub fn with_filters(
        cell_size: u32,
        flags: TransformFlags,
        filters: FilterSettings,
    ) -> Result<Self, ConfigError> {
        validate_cell_size(cell_size)?;
        filters.validate()?;
        Ok(Self {
            cell_size,
            flags,
            filters,
        })
    }

    pub fn cell_size(&self) -> u32 {
        self.cell_size
    }

    pub fn flags(&self) -> &TransformFlags {
        &self.flags
    }

    pub fn filters(&self) -> &FilterSettings {
        &self.filters
    }
}

pub fn validate_cell_size(cell_size: u32) -> Result<(), ConfigError> {
    if cell_size < MIN_CELL_SIZE {
        return Err(ConfigError::CellSizeTooSmall(cell_size));
    }
    Ok(())
}

pub fn validate_columns(columns: u32) -> Result<(), ConfigError> {
    if columns < MIN_COLUMNS {
        return Err(ConfigError::ColumnsTooSmall(columns));
    }
    Ok(())
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PackConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Parse sparse TOML text and resolve it against the stock defaults.
pub fn parse_config(content: &str) -> Result<PackConfig, ConfigError> {
    let overlay: toml::Value = toml::from_str(content)?;
    let merged = merge_toml(stock_defaults_value()?, overlay);
    let config: PackConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load a config file, merging it over the stock defaults.
pub fn load_config(path: &Path) -> Result<PackConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load `imgpacker.toml` from the input directory if it exists.
///
/// Returns stock defaults when there is no config file.
pub fn load_config_in(dir: &Path) -> Result<PackConfig, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.is_file() {
        return Ok(PackConfig::default());
    }
    load_config(&config_path)
}

/// Returns a fully-commented stock `imgpacker.toml` with all keys and explanations.
pub fn stock_config_toml() -> &'static str {
    r##"# imgpacker configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file as `imgpacker.toml` in the input folder, or pass it with
# `--config <FILE>`. Command-line flags are applied on top of it.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Transform stages
# ---------------------------------------------------------------------------
# Stages always run in this order, whatever order they are enabled in:
#   flatten -> blur -> sharpen -> median -> flip -> flop
#   -> resize to CellSize
#   -> blur -> sharpen -> median
[transforms]
flatten_alpha = false
blur_before = false
blur_after = false
sharpen_before = false
sharpen_after = false
median_before = false
median_after = false
# Mirror top-to-bottom.
flip_vertical = false
# Mirror left-to-right.
flop_horizontal = false

# ---------------------------------------------------------------------------
# Filter strengths
# ---------------------------------------------------------------------------
[filters]
# Gaussian blur standard deviation.
blur_sigma = 1.0
# Unsharp-mask sigma and threshold (0 = sharpen every pixel).
sharpen_sigma = 1.0
sharpen_threshold = 0
# Median window radius (1 = 3x3 window), 1-16.
median_radius = 1
# Opaque color that transparent pixels are flattened against.
flatten_background = "#000000"

# ---------------------------------------------------------------------------
# Output canvas
# ---------------------------------------------------------------------------
[canvas]
# Fill for empty trailing cells, as #RRGGBB or #RRGGBBAA.
background = "#00000000"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid() {
        let config = PackConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transforms, TransformFlags::default());
        assert_eq!(config.canvas.background, Color::TRANSPARENT);
        assert_eq!(config.filters.median_radius, 1);
    }

    #[test]
    fn stock_toml_parses_to_defaults() {
        let config = parse_config(stock_config_toml()).unwrap();
        assert_eq!(config, PackConfig::default());
    }

    #[test]
    fn sparse_config_overrides_only_given_keys() {
        let config = parse_config(
            r##"
            [transforms]
            blur_after = true

            [filters]
            median_radius = 3
            "##,
        )
        .unwrap();

        assert!(config.transforms.blur_after);
        assert!(!config.transforms.blur_before);
        assert_eq!(config.filters.median_radius, 3);
        assert_eq!(config.filters.blur_sigma, 1.0);
        assert_eq!(config.canvas.background, Color::TRANSPARENT);
    }

    #[test]
    fn unknown_keys_rejected() {
        let result = parse_config("[transforms]\nblurAfter = true\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn invalid_median_radius_rejected() {
        let result = parse_config("[filters]\nmedian_radius = 0\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn translucent_flatten_background_rejected() {
        let result = parse_config("[filters]\nflatten_background = \"#ffffff80\"\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn merge_toml_keeps_base_keys() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn load_config_in_without_file_returns_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config_in(tmp.path()).unwrap();
        assert_eq!(config, PackConfig::default());
    }

    #[test]
    fn load_config_in_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[canvas]\nbackground = \"#ff0000\"\n",
        )
        .unwrap();
        let config = load_config_in(tmp.path()).unwrap();
        assert_eq!(config.canvas.background, Color([255, 0, 0, 255]));
    }

    #[test]
    fn color_parses_rgb_and_rgba() {
        assert_eq!("#102030".parse::<Color>().unwrap(), Color([16, 32, 48, 255]));
        assert_eq!(
            "#10203040".parse::<Color>().unwrap(),
            Color([16, 32, 48, 64])
        );
        assert_eq!("#FFFFFF".parse::<Color>().unwrap(), Color([255, 255, 255, 255]));
    }

    #[test]
    fn color_rejects_malformed() {
        for bad in ["102030", "#1020", "#zzzzzz", "#1020304", ""] {
            assert!(bad.parse::<Color>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn color_display_roundtrips_through_parse() {
        for color in [Color::TRANSPARENT, Color::BLACK, Color([1, 2, 3, 4])] {
            assert_eq!(color.to_string().parse::<Color>().unwrap(), color);
        }
    }

    #[test]
    fn transform_config_rejects_small_cell_size() {
        let result = TransformConfig::new(2, TransformFlags::default());
        assert!(matches!(result, Err(ConfigError::CellSizeTooSmall(2))));
        assert!(TransformConfig::new(MIN_CELL_SIZE, TransformFlags::default()).is_ok());
    }

    #[test]
    fn columns_must_be_positive() {
        assert!(matches!(
            validate_columns(0),
            Err(ConfigError::ColumnsTooSmall(0))
        ));
        assert!(validate_columns(1).is_ok());
    }

    #[test]
    fn flags_union_enables_either_side() {
        let file = TransformFlags {
            blur_before: true,
            ..Default::default()
        };
        let cli = TransformFlags {
            median_after: true,
            ..Default::default()
        };
        let merged = file.union(cli);
        assert!(merged.blur_before);
        assert!(merged.median_after);
        assert!(!merged.median_before);
    }

    #[test]
    fn effective_threads_clamps_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(cores + 64),
        };
        assert_eq!(effective_threads(&config), cores);
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }
}
