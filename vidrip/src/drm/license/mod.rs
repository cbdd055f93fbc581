use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::config::{LicenseBackendKind, LicenseConfig};
use crate::error::Error;
use crate::service::{ContentIdentity, SessionCredentials};

use super::key::DecryptionKey;
use super::pssh::Pssh;

mod cdrm;
mod html;
mod plain;

pub use cdrm::CdrmBackend;
pub use html::HtmlBackend;
pub use plain::PlainBackend;

/**
    What every backend needs to negotiate a key for one title.
*/
#[derive(Debug, Clone)]
pub struct LicenseRequest {
    /// The service's own license server URL
    pub license_url: String,
    /// `name=value` session cookie for the license server
    pub cookie: String,
    pub pssh: Pssh,
}

impl LicenseRequest {
    pub fn new(
        identity: &ContentIdentity,
        pssh: &Pssh,
        sessions: &SessionCredentials,
    ) -> Result<Self, Error> {
        let profile = identity.service.profile();
        Ok(Self {
            license_url: (profile.license_url)(&identity.content_id),
            cookie: sessions.cookie_for(identity.service)?,
            pssh: pssh.clone(),
        })
    }
}

/**
    Anything that can turn a license request into a decryption key set.
*/
pub trait KeySource {
    async fn acquire_key(&self, request: &LicenseRequest) -> Result<DecryptionKey, Error>;
}

/**
    The configured license backend. Chosen once from configuration.
*/
pub enum LicenseClient {
    Html(HtmlBackend),
    Cdrm(CdrmBackend),
    Plain(PlainBackend),
}

impl LicenseClient {
    pub fn from_config(config: &LicenseConfig, timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| Error::Http {
                context: "license client setup".to_string(),
                source,
            })?;

        let endpoint = || {
            config
                .endpoint
                .clone()
                .ok_or_else(|| Error::InvalidConfig("license endpoint is not set".to_string()))
        };

        Ok(match config.backend {
            LicenseBackendKind::Html => LicenseClient::Html(HtmlBackend::new(
                client,
                endpoint()?,
                config.build_info.clone(),
            )),
            LicenseBackendKind::Cdrm => {
                LicenseClient::Cdrm(CdrmBackend::new(client, config.endpoint.clone()))
            }
            LicenseBackendKind::Plain => LicenseClient::Plain(PlainBackend::new(client, endpoint()?)),
        })
    }
}

impl KeySource for LicenseClient {
    async fn acquire_key(&self, request: &LicenseRequest) -> Result<DecryptionKey, Error> {
        match self {
            LicenseClient::Html(backend) => backend.acquire_key(request).await,
            LicenseClient::Cdrm(backend) => backend.acquire_key(request).await,
            LicenseClient::Plain(backend) => backend.acquire_key(request).await,
        }
    }
}

/**
    POST a JSON body to a backend and return the response text.
*/
async fn post_json<T: Serialize>(
    client: &Client,
    endpoint: &str,
    body: &T,
) -> Result<String, Error> {
    let context = format!("license backend {endpoint}");
    debug!(%endpoint, "requesting decryption key");

    let resp = client
        .post(endpoint)
        .json(body)
        .send()
        .await
        .map_err(|source| Error::Http {
            context: context.clone(),
            source,
        })?;

    if !resp.status().is_success() {
        return Err(Error::Upstream {
            context,
            status: resp.status().as_u16(),
        });
    }

    resp.text()
        .await
        .map_err(|source| Error::Http { context, source })
}

/**
    Detect a backend-reported failure in an otherwise successful response.
*/
fn reported_failure(text: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    if !(lower.contains("error") || lower.contains("not found")) {
        return None;
    }

    let line = text
        .lines()
        .map(str::trim)
        .find(|line| {
            let line = line.to_ascii_lowercase();
            line.contains("error") || line.contains("not found")
        })
        .unwrap_or_default();

    Some(line.chars().take(200).collect())
}
