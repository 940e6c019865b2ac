//! Configuration for npu-uvc-link
//!
//! One [`AppConfig`] describes both ends of the link:
//!
//! - `device`: which NPU model runs and whether results are painted on the
//!   device before encoding
//! - `host`: display geometry, rotation and the result reuse window
//! - `queues`: input depths of the picture and result slots
//! - `logging`: filter override and optional rolling log directory
//!
//! Files are TOML (`.toml`) or JSON (`.json`); every section falls back to
//! its defaults when omitted.
//!
//! # Example
//!
//! ```toml
//! [device]
//! model = "rockx_face_gender_age:300x300"
//!
//! [host]
//! rotation = 90
//! display_width = 1280
//! display_height = 720
//! ```

use crate::error::{Error, Result};
use crate::sideband::{ModelIdentifier, OutputType, SidebandHeader};
use crate::types::{Geometry, Rotation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable naming the config file used by the binary.
pub const CONFIG_ENV_VAR: &str = "NPU_UVC_CONFIG";

/// NPU input geometry assumed when a model selection omits it.
pub const DEFAULT_MODEL_GEOMETRY: Geometry = Geometry::new(300, 300);

/// Default picture queue depth
pub const DEFAULT_PICTURE_DEPTH: usize = 2;

/// Default result queue depth
pub const DEFAULT_RESULT_DEPTH: usize = 1;

// ==================== Model Selection ====================

/// Model name plus NPU input geometry, written `name:WxH`
/// (e.g. `rockx_face_detect:300x300`). The geometry part is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelSelection {
    pub name: String,
    pub geometry: Geometry,
}

impl ModelSelection {
    pub fn new(name: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            name: name.into(),
            geometry,
        }
    }

    /// Output type implied by the model name prefix.
    pub fn output_type(&self) -> OutputType {
        OutputType::for_model(&self.name)
    }

    /// Header template for the embed stage; timestamps are filled per picture.
    pub fn header_template(&self) -> Result<SidebandHeader> {
        let model = ModelIdentifier::new(&self.name)?;
        Ok(SidebandHeader::new(model, self.output_type(), self.geometry))
    }
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self::new("rockx_face_detect", DEFAULT_MODEL_GEOMETRY)
    }
}

impl FromStr for ModelSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, geometry) = match s.split_once(':') {
            Some((name, dims)) => {
                let (w, h) = dims.split_once(['x', 'X']).ok_or_else(|| {
                    Error::Config(format!("Model geometry {:?} is not WxH", dims))
                })?;
                let parse = |v: &str| {
                    v.trim().parse::<u32>().map_err(|e| {
                        Error::Config(format!("Bad model geometry {:?}: {}", dims, e))
                    })
                };
                (name, Geometry::new(parse(w)?, parse(h)?))
            }
            None => (s, DEFAULT_MODEL_GEOMETRY),
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Config("Model name is empty".to_string()));
        }
        Ok(Self::new(name, geometry))
    }
}

impl TryFrom<String> for ModelSelection {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ModelSelection> for String {
    fn from(selection: ModelSelection) -> Self {
        selection.to_string()
    }
}

impl fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.geometry)
    }
}

// ==================== Sections ====================

/// Device side settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// NPU model and its input geometry
    pub model: ModelSelection,

    /// Paint results onto the picture on the device before encoding
    pub render_result: bool,
}

/// Host side settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Display rotation in degrees (0, 90, 180 or 270)
    pub rotation: Rotation,

    /// Display width in pixels
    pub display_width: u32,

    /// Display height in pixels
    pub display_height: u32,

    /// How long a result may be reused for pictures without one
    pub reuse_window_ms: u64,

    /// Directory of recorded JPEG pictures replayed by the host binary
    pub input_dir: Option<PathBuf>,

    /// Delay between replayed pictures
    pub frame_interval_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            rotation: Rotation::Deg0,
            display_width: 1280,
            display_height: 720,
            reuse_window_ms: crate::decode::DEFAULT_REUSE_WINDOW_MS,
            input_dir: None,
            frame_interval_ms: 33,
        }
    }
}

/// Input queue depths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub picture_depth: usize,
    pub result_depth: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            picture_depth: DEFAULT_PICTURE_DEPTH,
            result_depth: DEFAULT_RESULT_DEPTH,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used instead of `RUST_LOG`
    pub filter: Option<String>,

    /// Directory for daily rolling log files
    pub directory: Option<PathBuf>,
}

// ==================== App Config ====================

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub host: HostConfig,
    pub queues: QueueConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Toml,
    Json,
}

fn format_of(path: &Path) -> Result<Format> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Format::Toml),
        Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Format::Json),
        _ => Err(Error::Config(format!(
            "Config file {:?} must end in .toml or .json",
            path
        ))),
    }
}

impl AppConfig {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = match format {
            Format::Toml => toml::from_str(&content).map_err(|e| {
                Error::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?,
            Format::Json => serde_json::from_str(&content).map_err(|e| {
                Error::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, returning defaults if any error occurs
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Using default configuration: {}", e);
            Self::default()
        })
    }

    /// Save to disk, TOML or pretty JSON depending on the extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = match format_of(path)? {
            Format::Toml => toml::to_string_pretty(self)
                .map_err(|e| Error::Serialization(format!("Failed to serialize config: {}", e)))?,
            Format::Json => serde_json::to_string_pretty(self)
                .map_err(|e| Error::Serialization(format!("Failed to serialize config: {}", e)))?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Config(format!("Failed to create config directory: {}", e))
            })?;
        }
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Reject settings no pipeline can run with
    pub fn validate(&self) -> Result<()> {
        let model = &self.device.model;
        if !model.geometry.is_valid() {
            return Err(Error::Config(format!(
                "Model {} has zero input geometry",
                model
            )));
        }
        if model.output_type() == OutputType::None {
            return Err(Error::Config(format!(
                "Model {:?} is neither rknn_* nor rockx_*",
                model.name
            )));
        }
        ModelIdentifier::new(&model.name)?;
        if self.host.display_width == 0 || self.host.display_height == 0 {
            return Err(Error::Config("Display geometry must be non-zero".to_string()));
        }
        if self.queues.picture_depth == 0 || self.queues.result_depth == 0 {
            return Err(Error::Config("Queue depths must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Effective log filter: config override, then `RUST_LOG`, then default
    pub fn log_filter(&self) -> Option<&str> {
        self.logging.filter.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_model_selection_parse() {
        let sel: ModelSelection = "rockx_face_gender_age:320x240".parse().unwrap();
        assert_eq!(sel.name, "rockx_face_gender_age");
        assert_eq!(sel.geometry, Geometry::new(320, 240));
        assert_eq!(sel.to_string(), "rockx_face_gender_age:320x240");

        let bare: ModelSelection = "rknn_ssd".parse().unwrap();
        assert_eq!(bare.geometry, DEFAULT_MODEL_GEOMETRY);
        assert_eq!(bare.output_type(), OutputType::RawTensor);
    }

    #[test]
    fn test_model_selection_errors() {
        assert!("rockx_face_detect:300".parse::<ModelSelection>().is_err());
        assert!("rockx_face_detect:axb".parse::<ModelSelection>().is_err());
        assert!(":300x300".parse::<ModelSelection>().is_err());
    }

    #[test]
    fn test_header_template() {
        let header = ModelSelection::default().header_template().unwrap();
        assert_eq!(header.model.name(), "rockx_face_detect");
        assert_eq!(header.output_type, OutputType::FixedRecord);
        assert_eq!(header.geometry, DEFAULT_MODEL_GEOMETRY);
    }

    #[test]
    fn test_defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.host.reuse_window_ms, 500);
        assert_eq!(config.queues.picture_depth, 2);
        assert_eq!(config.queues.result_depth, 1);
    }

    #[test]
    fn test_toml_partial_sections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("link.toml");
        std::fs::write(
            &path,
            "[device]\nmodel = \"rockx_face_gender_age:300x300\"\n\n[host]\nrotation = 270\n",
        )
        .unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.device.model.name, "rockx_face_gender_age");
        assert_eq!(config.host.rotation, Rotation::Deg270);
        assert_eq!(config.host.display_width, 1280);
    }

    #[test]
    fn test_illegal_rotation_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("link.toml");
        std::fs::write(&path, "[host]\nrotation = 45\n").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.device.render_result = true;
        config.host.rotation = Rotation::Deg90;
        config.logging.directory = Some(PathBuf::from("/var/log/npu"));

        for name in ["c.toml", "nested/c.json"] {
            let path = dir.path().join(name);
            config.save(&path).unwrap();
            assert_eq!(AppConfig::load(&path).unwrap(), config);
        }
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = AppConfig::default();
        config.queues.picture_depth = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.device.model = ModelSelection::new("yolo", Geometry::new(1, 1));
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.device.model.geometry = Geometry::new(0, 300);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_extension_and_fallback() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.yaml");
        assert!(AppConfig::default().save(&path).is_err());
        assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
    }
}
