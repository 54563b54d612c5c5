// SPDX-License-Identifier: MPL-2.0-only

//! User configuration for the video output core.
//!
//! These are the knobs a player exposes to its users: which YUV->RGB matrix
//! and range to trust, picture levels, zoom, aspect override and where the
//! picture sits inside a larger window. The values are persisted as RON.

use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const NAME: &str = "vidout";
pub const CONFIG_FILE: &str = "output.ron";

/// Smallest zoom percentage accepted from a user.
pub const ZOOM_MIN: i32 = -85;
/// Largest zoom percentage accepted from a user.
pub const ZOOM_MAX: i32 = 400;
/// Zoom percentage meaning "unchanged".
pub const ZOOM_STEP: i32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),
    #[error("no config directory available")]
    NoConfigDir,
}

/// How the output color matrix is chosen.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MatrixPolicy {
    /// Do as the stream suggests.
    Signal,
    /// Same as `Signal`, but assume HD colors for unmarked HD streams.
    #[default]
    SignalSize,
    /// Force the SD standard (ITU-R 470/601).
    ForceSd,
    /// Force the HD standard (ITU-R 709).
    ForceHd,
}

impl MatrixPolicy {
    pub const LABELS: [&'static str; 4] = ["Signal", "Signal+Size", "SD", "HD"];

    #[must_use]
    pub fn index(self) -> u8 {
        match self {
            MatrixPolicy::Signal => 0,
            MatrixPolicy::SignalSize => 1,
            MatrixPolicy::ForceSd => 2,
            MatrixPolicy::ForceHd => 3,
        }
    }

    #[must_use]
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(MatrixPolicy::Signal),
            1 => Some(MatrixPolicy::SignalSize),
            2 => Some(MatrixPolicy::ForceSd),
            3 => Some(MatrixPolicy::ForceHd),
            _ => None,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        Self::LABELS[self.index() as usize]
    }
}

/// How the black/white range of the output is chosen.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RangePolicy {
    /// Do as the stream suggests.
    #[default]
    Auto,
    /// Force MPEG range (16..235), studio swing.
    Mpeg,
    /// Force full range (0..255), PC mode.
    Full,
}

impl RangePolicy {
    pub const LABELS: [&'static str; 3] = ["Auto", "MPEG", "FULL"];

    #[must_use]
    pub fn index(self) -> u8 {
        match self {
            RangePolicy::Auto => 0,
            RangePolicy::Mpeg => 1,
            RangePolicy::Full => 2,
        }
    }

    #[must_use]
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(RangePolicy::Auto),
            1 => Some(RangePolicy::Mpeg),
            2 => Some(RangePolicy::Full),
            _ => None,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        Self::LABELS[self.index() as usize]
    }
}

/// User aspect ratio override.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AspectRatio {
    /// Use the ratio reported by the stream.
    #[default]
    Auto,
    /// Square pixels.
    Square,
    /// 4:3
    FourThree,
    /// 16:9
    Anamorphic,
    /// 2.11:1
    Dvb,
}

impl AspectRatio {
    pub const COUNT: usize = 5;

    #[must_use]
    pub fn index(self) -> i32 {
        match self {
            AspectRatio::Auto => 0,
            AspectRatio::Square => 1,
            AspectRatio::FourThree => 2,
            AspectRatio::Anamorphic => 3,
            AspectRatio::Dvb => 4,
        }
    }

    /// Out of range values fall back to `Auto`.
    #[must_use]
    pub fn from_index(index: i32) -> Self {
        match index {
            1 => AspectRatio::Square,
            2 => AspectRatio::FourThree,
            3 => AspectRatio::Anamorphic,
            4 => AspectRatio::Dvb,
            _ => AspectRatio::Auto,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            AspectRatio::Auto => "auto",
            AspectRatio::Square => "square",
            AspectRatio::FourThree => "4:3",
            AspectRatio::Anamorphic => "16:9",
            AspectRatio::Dvb => "2:1",
        }
    }
}

/// Brightness, contrast, saturation and hue as exposed to the user.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Setters)]
#[serde(default, deny_unknown_fields)]
#[must_use]
pub struct PictureLevels {
    /// Added to luma, -128..127
    pub brightness: i32,
    /// Luma gain, 128 means 1.0
    pub contrast: i32,
    /// Chroma gain, 128 means 1.0
    pub saturation: i32,
    /// Chroma rotation in degrees
    pub hue: i32,
}

impl PictureLevels {
    pub const BRIGHTNESS_RANGE: (i32, i32) = (-128, 127);
    pub const CONTRAST_RANGE: (i32, i32) = (0, 255);
    pub const SATURATION_RANGE: (i32, i32) = (0, 255);
    pub const HUE_RANGE: (i32, i32) = (-180, 180);

    /// Clamp every level into its valid range.
    pub fn clamped(self) -> Self {
        Self {
            brightness: self
                .brightness
                .clamp(Self::BRIGHTNESS_RANGE.0, Self::BRIGHTNESS_RANGE.1),
            contrast: self
                .contrast
                .clamp(Self::CONTRAST_RANGE.0, Self::CONTRAST_RANGE.1),
            saturation: self
                .saturation
                .clamp(Self::SATURATION_RANGE.0, Self::SATURATION_RANGE.1),
            hue: self.hue.clamp(Self::HUE_RANGE.0, Self::HUE_RANGE.1),
        }
    }
}

impl Default for PictureLevels {
    fn default() -> Self {
        Self {
            brightness: 0,
            contrast: 128,
            saturation: 128,
            hue: 0,
        }
    }
}

/// Configuration of one video output surface.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Setters)]
#[serde(default, deny_unknown_fields)]
#[must_use]
pub struct OutputConfig {
    /// output color matrix selection
    pub color_matrix: MatrixPolicy,
    /// output color range selection
    pub color_range: RangePolicy,
    pub levels: PictureLevels,
    /// horizontal zoom in percent
    pub zoom_x: i32,
    /// vertical zoom in percent
    pub zoom_y: i32,
    pub aspect: AspectRatio,
    /// horizontal image position inside a larger window, 0 = left, 100 = right
    pub horizontal_position: u8,
    /// vertical image position inside a larger window, 0 = top, 100 = bottom
    pub vertical_position: u8,
    /// map frame pixels 1:1 to screen pixels
    pub disable_scaling: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color_matrix: MatrixPolicy::default(),
            color_range: RangePolicy::default(),
            levels: PictureLevels::default(),
            zoom_x: ZOOM_STEP,
            zoom_y: ZOOM_STEP,
            aspect: AspectRatio::default(),
            horizontal_position: 50,
            vertical_position: 50,
            disable_scaling: false,
        }
    }
}

impl OutputConfig {
    /// Default location of the config file.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(NAME).join(CONFIG_FILE))
    }

    /// Load a config from a RON file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or does not parse.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = ron::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(config.sanitized())
    }

    /// Load the config from the default location, falling back to defaults.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            tracing::warn!("no config directory, using default output config");
            return Self::default();
        };

        match Self::load(&path) {
            Ok(config) => config,
            Err(ConfigError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                tracing::debug!(path = %path.display(), "no output config, using defaults");
                Self::default()
            }
            Err(why) => {
                tracing::warn!(%why, "config file error, falling back to defaults");
                Self::default()
            }
        }
    }

    /// Write the config as pretty RON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Fails if the config cannot be serialized or written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        std::fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Bring hand-edited values back into their valid ranges.
    pub fn sanitized(mut self) -> Self {
        self.levels = self.levels.clamped();
        if !zoom_is_valid(self.zoom_x) {
            self.zoom_x = ZOOM_STEP;
        }
        if !zoom_is_valid(self.zoom_y) {
            self.zoom_y = ZOOM_STEP;
        }
        self.horizontal_position = self.horizontal_position.min(100);
        self.vertical_position = self.vertical_position.min(100);
        self
    }
}

/// Zoom values must lie within the user range and produce a positive factor.
#[must_use]
pub fn zoom_is_valid(value: i32) -> bool {
    (ZOOM_MIN..=ZOOM_MAX).contains(&value) && value > 0
}
