//! Pipeline configuration
//!
//! One immutable value, loaded from JSON (every field optional) and
//! overridden by command-line flags, then passed by reference to each stage.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Report password; never written back out
    #[serde(skip_serializing)]
    pub password: String,
    pub obfuscate: bool,
    /// IANA time zone name for watermarks and report names
    pub timezone: String,
    pub output_dir: PathBuf,
    pub search_marker: String,
    pub document_extension: String,
    pub raster_dpi: u32,
    pub rasterizer_program: String,
    pub recovery_program: String,
    /// Searched before the default font locations
    pub font_dirs: Vec<PathBuf>,
    pub evidence_extensions: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            password: String::new(),
            obfuscate: false,
            timezone: "Europe/Warsaw".to_string(),
            output_dir: PathBuf::from("."),
            search_marker: "pdf".to_string(),
            document_extension: "pdf".to_string(),
            raster_dpi: 100,
            rasterizer_program: "pdftoppm".to_string(),
            recovery_program: "foremost".to_string(),
            font_dirs: Vec::new(),
            evidence_extensions: vec!["E01".to_string(), "dmg".to_string()],
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("password", &if self.password.is_empty() { "<unset>" } else { "<redacted>" })
            .field("obfuscate", &self.obfuscate)
            .field("timezone", &self.timezone)
            .field("output_dir", &self.output_dir)
            .field("search_marker", &self.search_marker)
            .field("document_extension", &self.document_extension)
            .field("raster_dpi", &self.raster_dpi)
            .field("rasterizer_program", &self.rasterizer_program)
            .field("recovery_program", &self.recovery_program)
            .field("font_dirs", &self.font_dirs)
            .field("evidence_extensions", &self.evidence_extensions)
            .finish()
    }
}

impl PipelineConfig {
    /// Read a JSON config file; absent fields take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))
    }

    /// Checks needed before anything is sealed
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.password.is_empty() {
            return Err(ConfigError::EmptyPassword);
        }
        self.tz()?;
        if self.raster_dpi == 0 {
            return Err(ConfigError::InvalidDpi);
        }
        Ok(())
    }
}
