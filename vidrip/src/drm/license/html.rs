use reqwest::Client;
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::info;

use crate::drm::key::DecryptionKey;
use crate::error::Error;

use super::{LicenseRequest, post_json, reported_failure};

const SUCCESS_MARKER: &str = "SUCCESS";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HtmlKeyRequest<'a> {
    license: &'a str,
    headers: String,
    pssh: &'a str,
    build_info: &'a str,
    proxy: &'a str,
    cache: bool,
}

/**
    Backend that answers with an HTML page listing the keys in
    Courier-styled list items.
*/
pub struct HtmlBackend {
    client: Client,
    endpoint: String,
    build_info: String,
}

impl HtmlBackend {
    pub fn new(client: Client, endpoint: String, build_info: String) -> Self {
        Self {
            client,
            endpoint,
            build_info,
        }
    }

    pub async fn acquire_key(&self, request: &LicenseRequest) -> Result<DecryptionKey, Error> {
        info!("requesting decryption key from html backend");

        let body = HtmlKeyRequest {
            license: &request.license_url,
            headers: format!("Cookie: {}", request.cookie),
            pssh: request.pssh.as_str(),
            build_info: &self.build_info,
            proxy: "",
            cache: true,
        };

        let response = post_json(&self.client, &self.endpoint, &body).await?;
        parse_response(&response)
    }
}

fn parse_response(body: &str) -> Result<DecryptionKey, Error> {
    if !body.contains(SUCCESS_MARKER) {
        let reason = reported_failure(body)
            .unwrap_or_else(|| format!("response has no {SUCCESS_MARKER} marker"));
        return Err(Error::LicenseAcquisition(reason));
    }

    let document = Html::parse_document(body);
    let selector = Selector::parse("li[style]")
        .map_err(|e| Error::LicenseAcquisition(format!("invalid key selector: {e:?}")))?;

    let entries: Vec<String> = document
        .select(&selector)
        .filter(|li| {
            li.value()
                .attr("style")
                .is_some_and(|style| style.contains("Courier"))
        })
        .map(|li| li.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();

    if entries.is_empty() {
        return Err(Error::LicenseAcquisition(
            "key not found in response".to_string(),
        ));
    }

    DecryptionKey::parse(entries.iter().map(String::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUCCESS_PAGE: &str = r#"<html><body>
        <h3>SUCCESS</h3>
        <ol>
            <li style="font-family:'Courier'">11223344556677889900aabbccddeeff:aabbccddeeff00112233445566778899</li>
        </ol>
    </body></html>"#;

    #[test]
    fn test_parses_key_from_list_item() {
        let key = parse_response(SUCCESS_PAGE).unwrap();
        assert_eq!(
            key.keys()[0].to_string(),
            "11223344556677889900aabbccddeeff:aabbccddeeff00112233445566778899"
        );
    }

    #[test]
    fn test_missing_success_marker() {
        let err = parse_response("<html><body><p>Error: wrong pssh</p></body></html>").unwrap_err();
        assert!(matches!(err, Error::LicenseAcquisition(reason) if reason.contains("wrong pssh")));
    }

    #[test]
    fn test_success_without_key() {
        let err = parse_response("<html><body>SUCCESS<ul><li>nothing</li></ul></body></html>")
            .unwrap_err();
        assert!(matches!(err, Error::LicenseAcquisition(_)));
    }

    #[test]
    fn test_malformed_key() {
        let page = SUCCESS_PAGE.replace(
            "11223344556677889900aabbccddeeff:",
            "11223344556677889900aabbccddeeff",
        );
        assert!(matches!(parse_response(&page), Err(Error::KeyFormat(_))));
    }
}
