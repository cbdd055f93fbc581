use std::collections::HashMap;

use serde::Deserialize;

use crate::error::Error;

use super::catalog::{StreamDescriptor, Transport};
use super::{PlaybackMethod, Service, ServiceProfile};

const API_BASE_URL: &str = "https://go3.tv/api";

pub static PROFILE: ServiceProfile = ServiceProfile {
    service: Service::Go3,
    domains: &["go3.tv"],
    session_cookie: "JSESSIONID",
    playback_method: PlaybackMethod::Get,
    playback_url,
    parse_path,
    parse_playback,
    license_url,
};

fn playback_url(content_id: &str) -> String {
    format!(
        "{API_BASE_URL}/products/{content_id}/videos/playlist?platform=BROWSER&videoType=MOVIE&lang=ET&tenant=OM_EE"
    )
}

fn license_url(content_id: &str) -> String {
    format!(
        "{API_BASE_URL}/products/{content_id}/drm/widevine?platform=BROWSER&type=MOVIE&tenant=OM_EE"
    )
}

/// `/watch/{title},vod-{numeric id}`
fn parse_path(segments: &[&str]) -> Result<(String, String), String> {
    let last = segments.last().ok_or("empty path")?;
    let (title, tagged_id) = last
        .rsplit_once(',')
        .ok_or("expected a segment of the form {title},vod-{id}")?;
    let content_id = tagged_id
        .strip_prefix("vod-")
        .ok_or("expected an id of the form vod-{id}")?;

    if content_id.is_empty() || !content_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("content id '{content_id}' is not numeric"));
    }

    Ok((content_id.to_string(), title.to_string()))
}

#[derive(Debug, Deserialize)]
struct PlaylistResponse {
    #[serde(default)]
    sources: HashMap<String, Vec<PlaylistSource>>,
    #[serde(default)]
    drm: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PlaylistSource {
    src: String,
}

/// Source groups in order of preference.
const SOURCE_PRIORITY: [(&str, Transport); 2] = [
    ("DASH", Transport::Dash),
    ("SS", Transport::SmoothStreaming),
];

fn parse_playback(body: &str) -> Result<StreamDescriptor, Error> {
    let response: PlaylistResponse =
        serde_json::from_str(body).map_err(|e| Error::UnexpectedResponse {
            context: "go3 playlist api".to_string(),
            reason: e.to_string(),
        })?;

    let drm_protected = response.drm.is_some();

    for (group, transport) in SOURCE_PRIORITY {
        if let Some(source) = response.sources.get(group).and_then(|s| s.first()) {
            return Ok(StreamDescriptor {
                url: absolutize(&source.src),
                transport,
                drm_protected,
            });
        }
    }

    Err(Error::StreamNotFound {
        service: Service::Go3,
        tried: "DASH, SS",
    })
}

/// Sources are frequently protocol-relative.
fn absolutize(src: &str) -> String {
    if src.starts_with("//") {
        format!("https:{src}")
    } else {
        src.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path() {
        assert_eq!(
            parse_path(&["watch", "some-show,vod-1022921"]).unwrap(),
            ("1022921".to_string(), "some-show".to_string())
        );
        assert!(parse_path(&["watch", "some-show"]).is_err());
        assert!(parse_path(&["watch", "some-show,vod"]).is_err());
        assert!(parse_path(&["watch", "some-show,live-1022921"]).is_err());
        assert!(parse_path(&[]).is_err());
    }

    #[test]
    fn test_prefers_dash_and_absolutizes() {
        let body = r#"{
            "sources": {
                "SS": [{"src": "//cdn.example/a.ism/manifest"}],
                "DASH": [{"src": "//cdn.example/a.mpd"}]
            },
            "drm": {"WIDEVINE": {"src": "x"}}
        }"#;
        let descriptor = parse_playback(body).unwrap();
        assert_eq!(descriptor.url, "https://cdn.example/a.mpd");
        assert_eq!(descriptor.transport, Transport::Dash);
        assert!(descriptor.drm_protected);
    }

    #[test]
    fn test_falls_back_to_smooth_streaming() {
        let body = r#"{"sources": {"SS": [{"src": "https://cdn.example/a.ism/manifest"}]}}"#;
        let descriptor = parse_playback(body).unwrap();
        assert_eq!(descriptor.transport, Transport::SmoothStreaming);
        assert_eq!(descriptor.url, "https://cdn.example/a.ism/manifest");
        assert!(!descriptor.drm_protected);
    }

    #[test]
    fn test_empty_sources() {
        let body = r#"{"sources": {"DASH": []}}"#;
        assert!(matches!(
            parse_playback(body),
            Err(Error::StreamNotFound {
                service: Service::Go3,
                ..
            })
        ));
    }
}
