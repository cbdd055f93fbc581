use serde::Deserialize;

use crate::error::Error;

use super::catalog::{StreamDescriptor, Transport};
use super::{PlaybackMethod, Service, ServiceProfile};

const API_BASE_URL: &str = "https://api.teliatv.ee";

pub static PROFILE: ServiceProfile = ServiceProfile {
    service: Service::Telia,
    domains: &["teliatv.ee"],
    session_cookie: "PHPSESSID",
    playback_method: PlaybackMethod::Post,
    playback_url,
    parse_path,
    parse_playback,
    license_url,
};

fn playback_url(content_id: &str) -> String {
    format!("{API_BASE_URL}/dtv-api/3.0/et/assets/{content_id}/play")
}

fn license_url(content_id: &str) -> String {
    format!("{API_BASE_URL}/dtv-api/3.0/et/drm-license/widevine/vod_asset/{content_id}")
}

/// `/…/{content_id}/{title}`
fn parse_path(segments: &[&str]) -> Result<(String, String), String> {
    match segments {
        [.., content_id, title] => {
            if !content_id.bytes().all(|b| b.is_ascii_digit()) {
                return Err(format!("content id '{content_id}' is not numeric"));
            }
            Ok((content_id.to_string(), title.to_string()))
        }
        _ => Err("expected a path ending in /{id}/{title}".to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct PlayResponse {
    playable: Playable,
}

#[derive(Debug, Deserialize)]
struct Playable {
    #[serde(default)]
    streams: Vec<PlayableStream>,
    #[serde(default)]
    drm: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PlayableStream {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    sources: Vec<String>,
}

/// Stream types in order of preference.
const STREAM_PRIORITY: [(&str, Transport); 2] =
    [("multiformat_dash", Transport::Dash), ("hls", Transport::Hls)];

fn parse_playback(body: &str) -> Result<StreamDescriptor, Error> {
    let response: PlayResponse =
        serde_json::from_str(body).map_err(|e| Error::UnexpectedResponse {
            context: "telia playback api".to_string(),
            reason: e.to_string(),
        })?;

    let playable = response.playable;
    let drm_protected = playable.drm.is_some();

    for (kind, transport) in STREAM_PRIORITY {
        let source = playable
            .streams
            .iter()
            .filter(|stream| stream.kind == kind)
            .find_map(|stream| stream.sources.first());

        if let Some(url) = source {
            return Ok(StreamDescriptor {
                url: url.clone(),
                transport,
                drm_protected,
            });
        }
    }

    Err(Error::StreamNotFound {
        service: Service::Telia,
        tried: "DASH, HLS",
    })
}
