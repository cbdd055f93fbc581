use tracing::warn;

use crate::config::MissingPsshPolicy;
use crate::error::Error;

pub mod key;
pub mod license;
pub mod pssh;

pub use key::DecryptionKey;
pub use license::{KeySource, LicenseClient, LicenseRequest};
pub use pssh::{Pssh, extract_pssh};

/**
    How a run must treat the stream it downloads.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Protection {
    Unprotected,
    Protected(Pssh),
}

/**
    Decide between protected and unprotected handling.

    `extracted` is the PSSH found in the manifest, if any. The override and
    policy only come into play when a DRM-protected stream has none.
*/
pub fn resolve_protection(
    drm_protected: bool,
    extracted: Option<Pssh>,
    override_pssh: Option<&Pssh>,
    policy: MissingPsshPolicy,
) -> Result<Protection, Error> {
    if !drm_protected {
        return Ok(Protection::Unprotected);
    }
    if let Some(pssh) = extracted {
        return Ok(Protection::Protected(pssh));
    }

    match (policy, override_pssh) {
        (MissingPsshPolicy::Unprotected, _) => {
            warn!("no PSSH available, treating stream as unprotected");
            Ok(Protection::Unprotected)
        }
        (MissingPsshPolicy::OverrideOrUnprotected | MissingPsshPolicy::OverrideOrFail, Some(pssh)) => {
            warn!("no PSSH in manifest, using configured override");
            Ok(Protection::Protected(pssh.clone()))
        }
        (MissingPsshPolicy::OverrideOrUnprotected, None) => {
            warn!("no PSSH in manifest and no override, treating stream as unprotected");
            Ok(Protection::Unprotected)
        }
        (MissingPsshPolicy::OverrideOrFail, None) => Err(Error::ProtectionMetadataUnavailable(
            "stream is DRM-protected but no PSSH was found and no override is configured"
                .to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDEVINE_PSSH: &str = "AAAAJHBzc2gAAAAA7e+LqXnWSs6jyCfc1R0h7QAAAAQSAqvN";

    fn pssh() -> Pssh {
        Pssh::from_base64(WIDEVINE_PSSH).unwrap()
    }

    #[test]
    fn test_unprotected_stream_ignores_everything() {
        let result =
            resolve_protection(false, Some(pssh()), None, MissingPsshPolicy::OverrideOrFail);
        assert_eq!(result.unwrap(), Protection::Unprotected);
    }

    #[test]
    fn test_extracted_wins_over_override() {
        let other = Pssh::from_base64("AAAAJHBzc2gAAAAAmgTweZhAQoarkuZb4IhflQAAAAQBAgME").unwrap();
        let result = resolve_protection(
            true,
            Some(pssh()),
            Some(&other),
            MissingPsshPolicy::OverrideOrUnprotected,
        );
        assert_eq!(result.unwrap(), Protection::Protected(pssh()));
    }

    #[test]
    fn test_missing_pssh_policies() {
        let over = pssh();

        assert_eq!(
            resolve_protection(true, None, Some(&over), MissingPsshPolicy::OverrideOrUnprotected)
                .unwrap(),
            Protection::Protected(pssh())
        );
        assert_eq!(
            resolve_protection(true, None, None, MissingPsshPolicy::OverrideOrUnprotected).unwrap(),
            Protection::Unprotected
        );
        assert_eq!(
            resolve_protection(true, None, Some(&over), MissingPsshPolicy::Unprotected).unwrap(),
            Protection::Unprotected
        );
        assert_eq!(
            resolve_protection(true, None, Some(&over), MissingPsshPolicy::OverrideOrFail).unwrap(),
            Protection::Protected(pssh())
        );
        assert!(matches!(
            resolve_protection(true, None, None, MissingPsshPolicy::OverrideOrFail),
            Err(Error::ProtectionMetadataUnavailable(_))
        ));
    }
}
