//! Service configuration.
//!
//! Loaded from a TOML file:
//!
//! ```toml
//! [pki]
//! ocsp_url = "http://ocsp.pki.gov.kz"
//! ocsp_timeout_secs = 10
//!
//! [crl]
//! enabled = true
//! dir = "/var/lib/kzpki/crl"
//! refresh_interval_secs = 3600
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub pki: PkiConfig,

    #[serde(default)]
    pub crl: CrlConfig,
}

/// OCSP responder settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PkiConfig {
    /// OCSP responder URL, consulted once per check.
    #[serde(default = "default_ocsp_url")]
    pub ocsp_url: String,

    /// Upper bound for one OCSP HTTP round-trip (seconds).
    #[serde(default = "default_ocsp_timeout")]
    pub ocsp_timeout_secs: u64,
}

/// Settings for the file-backed CRL store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrlConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Directory holding `.crl` files (DER or PEM).
    pub dir: Option<PathBuf>,

    /// Age after which the cached CRLs are reloaded (seconds).
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

impl Default for PkiConfig {
    fn default() -> Self {
        Self {
            ocsp_url: default_ocsp_url(),
            ocsp_timeout_secs: default_ocsp_timeout(),
        }
    }
}

impl Default for CrlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: None,
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

impl PkiConfig {
    pub fn ocsp_timeout(&self) -> Duration {
        Duration::from_secs(self.ocsp_timeout_secs)
    }
}

impl CrlConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Config {
    /// Load config from a TOML file, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self, Error> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml_str(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.pki.ocsp_url.trim().is_empty() {
            return Err(Error::Config("pki.ocsp_url must not be empty".to_string()));
        }
        if self.pki.ocsp_timeout_secs == 0 {
            return Err(Error::Config(
                "pki.ocsp_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.crl.enabled && self.crl.dir.is_none() {
            return Err(Error::Config(
                "crl.dir is required when crl.enabled = true".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_ocsp_url() -> String {
    String::from("http://ocsp.pki.gov.kz")
}

const fn default_ocsp_timeout() -> u64 {
    10
}

const fn default_refresh_interval() -> u64 {
    3600
}
