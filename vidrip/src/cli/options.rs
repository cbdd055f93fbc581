use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use crate::config::{
    Config, DEFAULT_BUILD_INFO, LicenseBackendKind, LicenseConfig, MissingPsshPolicy, ToolPaths,
};
use crate::drm::Pssh;
use crate::media::LanguagePreference;
use crate::service::SessionCredentials;

/**
    Flags shared by every command that talks to a service.

    Each flag falls back to an environment variable, which may also come
    from a `.env` file in the working directory.
*/
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Directory for intermediate and final files
    #[arg(short, long, env = "OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Downloader binary
    #[arg(long, env = "YTDLP_PATH", default_value = "yt-dlp")]
    pub ytdlp: PathBuf,

    /// Decryptor binary
    #[arg(long, env = "MP4DECRYPT_PATH", default_value = "mp4decrypt")]
    pub mp4decrypt: PathBuf,

    /// Muxer binary
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Telia PHPSESSID cookie value
    #[arg(long, env = "SESSION_ID", hide_env_values = true)]
    pub telia_session: Option<String>,

    /// Go3 JSESSIONID cookie value
    #[arg(long, env = "GO3_SESSION_ID", hide_env_values = true)]
    pub go3_session: Option<String>,

    /// Base64 PSSH box used when the manifest has none
    #[arg(long, env = "PSSH")]
    pub pssh: Option<String>,

    /// What to do when a protected stream has no PSSH in its manifest
    #[arg(long, value_enum, env = "MISSING_PSSH", default_value_t)]
    pub missing_pssh: MissingPsshPolicy,

    /// License backend protocol
    #[arg(long, value_enum, env = "LICENSE_BACKEND", default_value_t)]
    pub license_backend: LicenseBackendKind,

    /// License backend URL (optional for cdrm)
    #[arg(long, env = "LICENSE_ENDPOINT")]
    pub license_endpoint: Option<String>,

    /// Device build fingerprint sent to the html backend
    #[arg(long, env = "BUILD_INFO", default_value = DEFAULT_BUILD_INFO)]
    pub build_info: String,

    /// Preferred audio language codes
    #[arg(long = "lang", value_delimiter = ',', default_values = ["est", "et"])]
    pub languages: Vec<String>,

    /// Audio language codes used when no preferred track exists
    #[arg(long = "fallback-lang", value_delimiter = ',', default_values = ["eng", "en"])]
    pub fallback_languages: Vec<String>,

    /// Produce a video-only file when no audio track matches
    #[arg(long)]
    pub allow_missing_audio: bool,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "30")]
    pub http_timeout: u64,

    /// Timeout for each external tool run, in seconds
    #[arg(long, default_value = "14400")]
    pub tool_timeout: u64,
}

impl ConfigArgs {
    /**
        Build the run configuration. Does not validate it.
    */
    pub fn into_config(self) -> Result<Config> {
        let pssh_override = non_blank(self.pssh)
            .map(|pssh| Pssh::from_base64(&pssh))
            .transpose()
            .context("Invalid PSSH override")?;

        Ok(Config {
            output_dir: self.output_dir,
            tools: ToolPaths {
                downloader: self.ytdlp,
                decryptor: self.mp4decrypt,
                muxer: self.ffmpeg,
            },
            sessions: SessionCredentials {
                telia: non_blank(self.telia_session),
                go3: non_blank(self.go3_session),
            },
            license: LicenseConfig {
                backend: self.license_backend,
                endpoint: non_blank(self.license_endpoint),
                build_info: self.build_info,
            },
            pssh_override,
            missing_pssh: self.missing_pssh,
            languages: LanguagePreference {
                preferred: self.languages,
                fallback: self.fallback_languages,
            },
            require_audio: !self.allow_missing_audio,
            http_timeout: Duration::from_secs(self.http_timeout),
            tool_timeout: Duration::from_secs(self.tool_timeout),
        })
    }
}

/// Empty environment variables count as unset.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ConfigArgs,
    }

    fn parse(args: &[&str]) -> Result<Config> {
        let cli = TestCli::try_parse_from(std::iter::once("vidrip").chain(args.iter().copied()))?;
        cli.config.into_config()
    }

    #[test]
    fn test_flags_build_config() {
        let config = parse(&[
            "--go3-session",
            "abc",
            "--license-backend",
            "cdrm",
            "--lang",
            "fin,fi",
            "--allow-missing-audio",
            "--output-dir",
            "/tmp/out",
        ])
        .unwrap();

        assert_eq!(config.sessions.go3.as_deref(), Some("abc"));
        assert_eq!(config.license.backend, LicenseBackendKind::Cdrm);
        assert_eq!(config.languages.preferred, ["fin", "fi"]);
        assert_eq!(config.languages.fallback, ["eng", "en"]);
        assert!(!config.require_audio);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_policy_flag() {
        let config = parse(&["--missing-pssh", "override-or-fail"]).unwrap();
        assert_eq!(config.missing_pssh, MissingPsshPolicy::OverrideOrFail);
    }

    #[test]
    fn test_blank_values_are_unset() {
        assert_eq!(non_blank(Some("  ".to_string())), None);
        assert_eq!(non_blank(Some(" x ".to_string())), Some("x".to_string()));
    }

    #[test]
    fn test_rejects_malformed_pssh() {
        assert!(parse(&["--pssh", "not base64!"]).is_err());

        let config = parse(&["--pssh", "AAAAJHBzc2gAAAAA7e+LqXnWSs6jyCfc1R0h7QAAAAQSAqvN"]).unwrap();
        assert!(config.pssh_override.unwrap().is_widevine());
    }
}
