use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use crate::drm::Pssh;
use crate::error::Error;
use crate::media::LanguagePreference;
use crate::service::SessionCredentials;

/// Device fingerprint sent to the `html` license backend.
pub const DEFAULT_BUILD_INFO: &str =
    "google/sdk_gphone_x86/generic_x86:8.1.0/OSM1.180201.037/6739391:userdebug/dev-keys";

/**
    Which license-acquisition service answers key requests.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LicenseBackendKind {
    /// JSON request, HTML response with the key in a list item
    #[default]
    Html,
    /// CDRM-style JSON request and `{ "message": ... }` response
    Cdrm,
    /// JSON request, plain-text response with `KEY:` lines
    Plain,
}

impl LicenseBackendKind {
    pub fn requires_endpoint(self) -> bool {
        !matches!(self, LicenseBackendKind::Cdrm)
    }
}

/**
    What to do when a DRM-protected stream yields no usable PSSH.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum MissingPsshPolicy {
    /// Use the configured override if there is one, otherwise treat the stream as unprotected
    #[default]
    OverrideOrUnprotected,
    /// Always treat the stream as unprotected
    Unprotected,
    /// Use the configured override if there is one, otherwise fail
    OverrideOrFail,
}

#[derive(Debug, Clone)]
pub struct LicenseConfig {
    pub backend: LicenseBackendKind,
    pub endpoint: Option<String>,
    pub build_info: String,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            backend: LicenseBackendKind::default(),
            endpoint: None,
            build_info: DEFAULT_BUILD_INFO.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub downloader: PathBuf,
    pub decryptor: PathBuf,
    pub muxer: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            downloader: PathBuf::from("yt-dlp"),
            decryptor: PathBuf::from("mp4decrypt"),
            muxer: PathBuf::from("ffmpeg"),
        }
    }
}

/**
    Everything a pipeline run needs, resolved and validated once at startup.

    Only one process may work on a given title in `output_dir` at a time.
*/
#[derive(Debug, Clone)]
pub struct Config {
    pub output_dir: PathBuf,
    pub tools: ToolPaths,
    pub sessions: SessionCredentials,
    pub license: LicenseConfig,
    pub pssh_override: Option<Pssh>,
    pub missing_pssh: MissingPsshPolicy,
    pub languages: LanguagePreference,
    pub require_audio: bool,
    pub http_timeout: Duration,
    pub tool_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            tools: ToolPaths::default(),
            sessions: SessionCredentials::default(),
            license: LicenseConfig::default(),
            pssh_override: None,
            missing_pssh: MissingPsshPolicy::default(),
            languages: LanguagePreference::default(),
            require_audio: true,
            http_timeout: Duration::from_secs(30),
            tool_timeout: Duration::from_secs(4 * 60 * 60),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));

        for (name, path) in [
            ("downloader", &self.tools.downloader),
            ("decryptor", &self.tools.decryptor),
            ("muxer", &self.tools.muxer),
        ] {
            if path.as_os_str().is_empty() {
                return Err(Error::InvalidConfig(format!("{name} path is empty")));
            }
        }

        if self.output_dir.as_os_str().is_empty() {
            return invalid("output directory is empty");
        }

        let has_endpoint = self
            .license
            .endpoint
            .as_deref()
            .is_some_and(|e| !e.trim().is_empty());
        if self.license.backend.requires_endpoint() && !has_endpoint {
            return invalid("the selected license backend requires a license endpoint");
        }

        if self.languages.preferred.is_empty() && self.languages.fallback.is_empty() {
            return invalid("at least one audio language code is required");
        }

        if self.http_timeout.is_zero() || self.tool_timeout.is_zero() {
            return invalid("timeouts must be non-zero");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_html_backend_needs_endpoint() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = Config {
            license: LicenseConfig {
                endpoint: Some("http://127.0.0.1:8080/wv".to_string()),
                ..LicenseConfig::default()
            },
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cdrm_has_default_endpoint() {
        let config = Config {
            license: LicenseConfig {
                backend: LicenseBackendKind::Cdrm,
                ..LicenseConfig::default()
            },
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_timeout_and_empty_tool() {
        let base = Config {
            license: LicenseConfig {
                backend: LicenseBackendKind::Cdrm,
                ..LicenseConfig::default()
            },
            ..Config::default()
        };

        let config = Config {
            tool_timeout: Duration::ZERO,
            ..base.clone()
        };
        assert!(config.validate().is_err());

        let mut config = base;
        config.tools.muxer = PathBuf::new();
        assert!(config.validate().is_err());
    }
}
