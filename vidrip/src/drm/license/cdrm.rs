use std::collections::BTreeMap;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::drm::key::{ContentKey, DecryptionKey};
use crate::error::Error;

use super::{LicenseRequest, post_json, reported_failure};

const CDRM_API_URL: &str = "https://cdrm-project.com/api/decrypt";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

#[derive(Debug, Serialize)]
struct CdrmRequest<'a> {
    pssh: &'a str,
    licurl: &'a str,
    headers: String,
}

#[derive(Debug, Deserialize)]
struct CdrmResponse {
    message: String,
}

/**
    CDRM-style backend: keys come back one per line in a JSON `message`.
*/
pub struct CdrmBackend {
    client: Client,
    endpoint: String,
}

impl CdrmBackend {
    pub fn new(client: Client, endpoint: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.unwrap_or_else(|| CDRM_API_URL.to_string()),
        }
    }

    pub async fn acquire_key(&self, request: &LicenseRequest) -> Result<DecryptionKey, Error> {
        info!("requesting decryption key from CDRM API");

        let body = CdrmRequest {
            pssh: request.pssh.as_str(),
            licurl: &request.license_url,
            headers: format!(
                "{:?}",
                BTreeMap::from([
                    ("Accept", "*/*"),
                    ("Cookie", request.cookie.as_str()),
                    ("User-Agent", USER_AGENT),
                ])
            ),
        };

        let response = post_json(&self.client, &self.endpoint, &body).await?;
        parse_response(&response)
    }
}

fn parse_response(body: &str) -> Result<DecryptionKey, Error> {
    let response: CdrmResponse =
        serde_json::from_str(body).map_err(|e| Error::UnexpectedResponse {
            context: "CDRM API".to_string(),
            reason: e.to_string(),
        })?;

    if let Some(reason) = reported_failure(&response.message) {
        return Err(Error::LicenseAcquisition(reason));
    }

    // Messages mix labels and other text with the key lines.
    let lines: Vec<&str> = response
        .message
        .lines()
        .map(|line| line.trim().trim_start_matches("--key").trim())
        .filter(|line| line.parse::<ContentKey>().is_ok())
        .collect();

    if lines.is_empty() {
        return Err(Error::LicenseAcquisition(
            "no decryption keys found in CDRM response".to_string(),
        ));
    }

    DecryptionKey::parse(lines)
}
