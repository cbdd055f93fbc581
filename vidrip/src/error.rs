use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::service::Service;

/**
    Errors produced while acquiring a title.

    Each variant maps to one failure kind of the acquisition pipeline.
    `ProtectionMetadataUnavailable` is the only one that the pipeline
    recovers from, through the configured fallback policy.
*/
#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported service: {0}")]
    UnsupportedService(String),

    #[error("invalid content url '{url}': {reason}")]
    InvalidContentUrl { url: String, reason: String },

    #[error("no session credential configured for {0}")]
    MissingCredential(Service),

    #[error("no supported stream found for {service} (tried {tried})")]
    StreamNotFound {
        service: Service,
        tried: &'static str,
    },

    #[error("{context} returned HTTP {status}")]
    Upstream { context: String, status: u16 },

    #[error("request to {context} failed")]
    Http {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response from {context}: {reason}")]
    UnexpectedResponse { context: String, reason: String },

    #[error("protection metadata unavailable: {0}")]
    ProtectionMetadataUnavailable(String),

    #[error("invalid key format: {0}")]
    KeyFormat(String),

    #[error("license acquisition failed: {0}")]
    LicenseAcquisition(String),

    #[error("no video track found in format report")]
    VideoNotFound,

    #[error("no audio track in a preferred or fallback language")]
    AudioNotFound,

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("mux failed: {0}")]
    MuxFailed(String),

    #[error("expected artifact is missing: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/**
    Pipeline stage that an error originated from.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Discover,
    Select,
    Download,
    License,
    Decrypt,
    Mux,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Resolve => "resolve",
            Stage::Discover => "discover",
            Stage::Select => "select",
            Stage::Download => "download",
            Stage::License => "license",
            Stage::Decrypt => "decrypt",
            Stage::Mux => "mux",
        };
        f.write_str(name)
    }
}

/**
    An [`Error`] tagged with the stage it aborted.
*/
#[derive(Debug, Error)]
#[error("{stage} stage failed")]
pub struct PipelineError {
    pub stage: Stage,
    pub source: Error,
}

pub trait StageExt<T> {
    fn stage(self, stage: Stage) -> Result<T, PipelineError>;
}

impl<T> StageExt<T> for Result<T, Error> {
    fn stage(self, stage: Stage) -> Result<T, PipelineError> {
        self.map_err(|source| PipelineError { stage, source })
    }
}
