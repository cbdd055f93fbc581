use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/**
    One content key in canonical `kid:key` hex form.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentKey {
    pub kid: String,
    pub key: String,
}

impl FromStr for ContentKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut parts = s.split(':');

        match (parts.next(), parts.next(), parts.next()) {
            (Some(kid), Some(key), None) => {
                // Key ids are sometimes printed in UUID form.
                let kid = kid.trim().replace('-', "");
                let key = key.trim();

                if !is_hex(&kid) || !is_hex(key) {
                    return Err(Error::KeyFormat(format!(
                        "'{s}' must be a non-empty hex key id and key"
                    )));
                }

                Ok(ContentKey {
                    kid: kid.to_ascii_lowercase(),
                    key: key.to_ascii_lowercase(),
                })
            }
            _ => Err(Error::KeyFormat(format!(
                "'{s}' must contain exactly one ':' separator"
            ))),
        }
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kid, self.key)
    }
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/**
    The normalized key set returned by a license backend.

    Always holds at least one key. Never written to disk.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionKey {
    keys: Vec<ContentKey>,
}

impl DecryptionKey {
    /**
        Normalize raw backend entries, rejecting the whole set if any entry is malformed.
    */
    pub fn parse<'a>(entries: impl IntoIterator<Item = &'a str>) -> Result<Self, Error> {
        let keys = entries
            .into_iter()
            .map(str::parse::<ContentKey>)
            .collect::<Result<Vec<_>, _>>()?;

        if keys.is_empty() {
            return Err(Error::KeyFormat("no key entries".to_string()));
        }

        Ok(Self { keys })
    }

    pub fn keys(&self) -> &[ContentKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}
