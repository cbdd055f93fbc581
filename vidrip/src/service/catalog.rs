use std::fmt;
use std::time::Duration;

use reqwest::header::COOKIE;
use reqwest::{Client, redirect};
use tracing::debug;

use crate::error::Error;

use super::{ContentIdentity, PlaybackMethod, SessionCredentials};

/**
    Packaging format of a playable source.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Dash,
    Hls,
    SmoothStreaming,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Dash => f.write_str("dash"),
            Transport::Hls => f.write_str("hls"),
            Transport::SmoothStreaming => f.write_str("ss"),
        }
    }
}

/**
    The source chosen from a service's playback API for one run.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub url: String,
    pub transport: Transport,
    pub drm_protected: bool,
}

/**
    Network side of discovery: playback lookup and manifest fetch.
*/
pub trait Catalog {
    async fn stream_info(&self, identity: &ContentIdentity) -> Result<StreamDescriptor, Error>;

    /**
        Fetch the manifest document behind a stream URL.
    */
    async fn fetch_manifest(&self, identity: &ContentIdentity, url: &str) -> Result<String, Error>;
}

/**
    Catalog backed by the services' HTTP APIs, authenticated by session cookie.
*/
pub struct HttpCatalog {
    client: Client,
    manifest_client: Client,
    sessions: SessionCredentials,
}

impl HttpCatalog {
    pub fn new(sessions: SessionCredentials, timeout: Duration) -> Result<Self, Error> {
        let build_error = |source| Error::Http {
            context: "http client setup".to_string(),
            source,
        };

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(build_error)?;

        // Manifests follow at most one redirect.
        let manifest_client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::limited(1))
            .build()
            .map_err(build_error)?;

        Ok(Self {
            client,
            manifest_client,
            sessions,
        })
    }
}

impl Catalog for HttpCatalog {
    async fn stream_info(&self, identity: &ContentIdentity) -> Result<StreamDescriptor, Error> {
        let profile = identity.service.profile();
        let cookie = self.sessions.cookie_for(identity.service)?;
        let url = (profile.playback_url)(&identity.content_id);
        let context = format!("{} playback api", identity.service);

        debug!(%url, "requesting playback info");

        let request = match profile.playback_method {
            PlaybackMethod::Get => self.client.get(&url),
            PlaybackMethod::Post => self.client.post(&url),
        };

        let resp = request
            .header(COOKIE, cookie)
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

        let body = resp.text().await.map_err(|source| Error::Http {
            context: context.clone(),
            source,
        })?;

        (profile.parse_playback)(&body)
    }

    async fn fetch_manifest(&self, identity: &ContentIdentity, url: &str) -> Result<String, Error> {
        let cookie = self.sessions.cookie_for(identity.service)?;

        let resp = self
            .manifest_client
            .get(url)
            .header(COOKIE, cookie)
            .send()
            .await
            .map_err(|e| Error::ProtectionMetadataUnavailable(format!("manifest fetch: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::ProtectionMetadataUnavailable(format!(
                "manifest fetch returned HTTP {}",
                resp.status()
            )));
        }

        resp.text()
            .await
            .map_err(|e| Error::ProtectionMetadataUnavailable(format!("manifest body: {e}")))
    }
}
