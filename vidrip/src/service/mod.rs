use std::fmt;

use url::Url;

use crate::error::Error;

pub mod catalog;
mod go3;
mod telia;

pub use catalog::{Catalog, HttpCatalog, StreamDescriptor, Transport};

/**
    A streaming service this tool knows how to acquire from.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Telia,
    Go3,
}

impl Service {
    pub fn profile(self) -> &'static ServiceProfile {
        match self {
            Service::Telia => &telia::PROFILE,
            Service::Go3 => &go3::PROFILE,
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Telia => f.write_str("telia"),
            Service::Go3 => f.write_str("go3"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMethod {
    Get,
    Post,
}

/**
    Everything that differs between services, in one registration entry.
*/
pub struct ServiceProfile {
    pub service: Service,
    /// Catalog domains, matched exactly or as a dot-suffix of the URL host
    pub domains: &'static [&'static str],
    /// Name of the session cookie carrying the user's credential
    pub session_cookie: &'static str,
    pub playback_method: PlaybackMethod,
    pub playback_url: fn(&str) -> String,
    /// Maps non-empty path segments to `(content_id, title)`
    pub parse_path: fn(&[&str]) -> Result<(String, String), String>,
    pub parse_playback: fn(&str) -> Result<StreamDescriptor, Error>,
    pub license_url: fn(&str) -> String,
}

static SERVICES: [&ServiceProfile; 2] = [&telia::PROFILE, &go3::PROFILE];

impl ServiceProfile {
    pub fn for_host(host: &str) -> Option<&'static ServiceProfile> {
        let host = host.to_ascii_lowercase();
        SERVICES.iter().copied().find(|profile| {
            profile
                .domains
                .iter()
                .any(|d| host == *d || host.ends_with(&format!(".{d}")))
        })
    }
}

/**
    Stable identity of a piece of content, resolved from its page URL.

    The title doubles as the file name stem of every artifact on disk.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentIdentity {
    pub service: Service,
    pub content_id: String,
    pub title: String,
}

/**
    Resolve a content page URL into its service, content id and title.

    Pure function of the URL string: no network access.
*/
pub fn resolve_identity(url: &str) -> Result<ContentIdentity, Error> {
    let invalid = |reason: String| Error::InvalidContentUrl {
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    let host = parsed.host_str().unwrap_or_default();
    let profile =
        ServiceProfile::for_host(host).ok_or_else(|| Error::UnsupportedService(host.to_string()))?;

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let (content_id, title) = (profile.parse_path)(&segments).map_err(invalid)?;

    if content_id.is_empty() {
        return Err(invalid("empty content id".to_string()));
    }
    if title.is_empty() || title == "." || title == ".." {
        return Err(invalid(format!("'{title}' cannot be used as a title")));
    }

    Ok(ContentIdentity {
        service: profile.service,
        content_id,
        title,
    })
}

/**
    Session credentials per service, supplied by the hosting environment.
*/
#[derive(Debug, Clone, Default)]
pub struct SessionCredentials {
    pub telia: Option<String>,
    pub go3: Option<String>,
}

impl SessionCredentials {
    /**
        The `Cookie` header value that authenticates requests to `service`.
    */
    pub fn cookie_for(&self, service: Service) -> Result<String, Error> {
        let value = match service {
            Service::Telia => self.telia.as_deref(),
            Service::Go3 => self.go3.as_deref(),
        };

        match value {
            Some(value) if !value.trim().is_empty() => Ok(format!(
                "{}={}",
                service.profile().session_cookie,
                value.trim()
            )),
            _ => Err(Error::MissingCredential(service)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_go3_identity() {
        let identity = resolve_identity("https://go3.tv/watch/some-show,vod-1022921").unwrap();
        assert_eq!(identity.service, Service::Go3);
        assert_eq!(identity.content_id, "1022921");
        assert_eq!(identity.title, "some-show");
    }

    #[test]
    fn test_resolve_telia_identity() {
        let identity =
            resolve_identity("https://www.teliatv.ee/watch/vod/4415577/some-movie/").unwrap();
        assert_eq!(identity.service, Service::Telia);
        assert_eq!(identity.content_id, "4415577");
        assert_eq!(identity.title, "some-movie");
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let url = "https://go3.tv/watch/another,show,vod-77";
        assert_eq!(resolve_identity(url).unwrap(), resolve_identity(url).unwrap());
        assert_eq!(resolve_identity(url).unwrap().title, "another,show");
    }

    #[test]
    fn test_unsupported_host() {
        let err = resolve_identity("https://example.com/watch/x,vod-1").unwrap_err();
        assert!(matches!(err, Error::UnsupportedService(host) if host == "example.com"));

        let err = resolve_identity("https://notgo3.tv/watch/x,vod-1").unwrap_err();
        assert!(matches!(err, Error::UnsupportedService(_)));
    }

    #[test]
    fn test_malformed_paths() {
        for url in [
            "https://go3.tv/watch/some-show",
            "https://go3.tv/watch/some-show,vod-abc",
            "https://go3.tv/",
            "https://teliatv.ee/4415577",
            "https://teliatv.ee/watch/some-movie",
            "https://go3.tv/watch/some-show,live-1022921",
            "https://teliatv.ee/watch/1/..",
            "not a url",
        ] {
            let err = resolve_identity(url).unwrap_err();
            assert!(
                matches!(err, Error::InvalidContentUrl { .. }),
                "{url} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_cookie_for_service() {
        let sessions = SessionCredentials {
            telia: Some("abc".to_string()),
            go3: None,
        };
        assert_eq!(sessions.cookie_for(Service::Telia).unwrap(), "PHPSESSID=abc");
        assert!(matches!(
            sessions.cookie_for(Service::Go3),
            Err(Error::MissingCredential(Service::Go3))
        ));
    }
}
