use std::sync::OnceLock;

use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use crate::drm::key::DecryptionKey;
use crate::error::Error;

use super::{LicenseRequest, post_json, reported_failure};

#[derive(Debug, Serialize)]
struct PlainKeyRequest<'a> {
    pssh: &'a str,
    license_url: &'a str,
    cookie: &'a str,
}

/**
    Backend answering in plain text, one `KEY: kid:key` line per key.
*/
pub struct PlainBackend {
    client: Client,
    endpoint: String,
}

impl PlainBackend {
    pub fn new(client: Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }

    pub async fn acquire_key(&self, request: &LicenseRequest) -> Result<DecryptionKey, Error> {
        info!("requesting decryption key from plain-text backend");

        let body = PlainKeyRequest {
            pssh: request.pssh.as_str(),
            license_url: &request.license_url,
            cookie: &request.cookie,
        };

        let response = post_json(&self.client, &self.endpoint, &body).await?;
        parse_response(&response)
    }
}

fn key_line() -> &'static Regex {
    static KEY_LINE: OnceLock<Regex> = OnceLock::new();
    KEY_LINE.get_or_init(|| {
        Regex::new(r"(?im)^\s*key\s*:\s*(\S+)\s*$").expect("key line pattern is valid")
    })
}

fn parse_response(body: &str) -> Result<DecryptionKey, Error> {
    if let Some(reason) = reported_failure(body) {
        return Err(Error::LicenseAcquisition(reason));
    }

    let entries: Vec<&str> = key_line()
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect();

    if entries.is_empty() {
        return Err(Error::LicenseAcquisition(
            "response has no KEY line".to_string(),
        ));
    }

    DecryptionKey::parse(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_labeled_lines() {
        let body = "PSSH accepted\nKEY: 11223344556677889900aabbccddeeff:aabbccddeeff00112233445566778899\nkey:aa:bb\n";
        let key = parse_response(body).unwrap();
        assert_eq!(key.len(), 2);
        assert_eq!(key.keys()[1].to_string(), "aa:bb");
    }

    #[test]
    fn test_not_found_marker() {
        assert!(matches!(
            parse_response("Keys not found for this PSSH"),
            Err(Error::LicenseAcquisition(_))
        ));
    }

    #[test]
    fn test_unlabeled_response() {
        assert!(matches!(
            parse_response("aabb:ccdd"),
            Err(Error::LicenseAcquisition(_))
        ));
    }

    #[test]
    fn test_malformed_labeled_key() {
        assert!(matches!(
            parse_response("KEY: aabbccdd"),
            Err(Error::KeyFormat(_))
        ));
    }
}
