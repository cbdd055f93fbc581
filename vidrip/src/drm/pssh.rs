use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sxd_xpath::nodeset::Node;
use sxd_xpath::{Context, Factory, Value};
use tracing::debug;

use crate::error::Error;

/// DASH `schemeIdUri` of the Widevine protection system.
pub const WIDEVINE_SCHEME_ID: &str = "urn:uuid:edef8ba9-79d6-4ace-a3c8-27dcd51d21ed";

const WIDEVINE_SYSTEM_ID: [u8; 16] = [
    0xed, 0xef, 0x8b, 0xa9, 0x79, 0xd6, 0x4a, 0xce, 0xa3, 0xc8, 0x27, 0xdc, 0xd5, 0x1d, 0x21, 0xed,
];

/**
    A base64-encoded PSSH box, checked to be structurally sound.

    Box layout:
      [0..4]    box_size: u32 big-endian
      [4..8]    box_type: "pssh"
      [8]       version: u8 (0 or 1)
      [9..12]   flags
      [12..28]  system_id: 16 bytes
      [..]      v1 key ids, data_size, data
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pssh {
    base64: String,
    system_id: [u8; 16],
}

impl Pssh {
    pub fn from_base64(input: &str) -> Result<Self, Error> {
        let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = BASE64
            .decode(compact.as_bytes())
            .map_err(|e| Error::ProtectionMetadataUnavailable(format!("invalid PSSH base64: {e}")))?;

        let system_id = parse_box_header(&bytes)
            .map_err(|e| Error::ProtectionMetadataUnavailable(format!("malformed PSSH box: {e}")))?;

        Ok(Self {
            base64: compact,
            system_id,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.base64
    }

    pub fn is_widevine(&self) -> bool {
        self.system_id == WIDEVINE_SYSTEM_ID
    }
}

fn parse_box_header(input: &[u8]) -> Result<[u8; 16], String> {
    // 4 (size) + 4 (type) + 1 (ver) + 3 (flags) + 16 (sysid) + 4 (data_size)
    if input.len() < 32 {
        return Err("input too short for PSSH box header".to_string());
    }

    let box_size = read_u32_be(input, 0) as usize;
    if box_size > input.len() {
        return Err("box_size exceeds input length".to_string());
    }
    if &input[4..8] != b"pssh" {
        return Err("box_type is not 'pssh'".to_string());
    }
    if input[8] > 1 {
        return Err(format!("unsupported version {}", input[8]));
    }

    let mut system_id = [0u8; 16];
    system_id.copy_from_slice(&input[12..28]);
    Ok(system_id)
}

fn read_u32_be(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/**
    Extract the Widevine PSSH from a DASH manifest.

    Returns `Ok(None)` when the manifest carries no usable Widevine entry.
    Only a document that cannot be parsed at all is an error.
*/
pub fn extract_pssh(manifest: &str) -> Result<Option<Pssh>, Error> {
    let package = sxd_document::parser::parse(manifest).map_err(|e| {
        Error::ProtectionMetadataUnavailable(format!("manifest is not valid XML: {e:?}"))
    })?;
    let document = package.as_document();

    for node in select(document.root(), "//*[local-name()='ContentProtection']")? {
        let Node::Element(element) = node else {
            continue;
        };

        let scheme = element.attribute_value("schemeIdUri").unwrap_or_default();
        if !scheme.trim().eq_ignore_ascii_case(WIDEVINE_SCHEME_ID) {
            continue;
        }

        for pssh_node in select(node, "*[local-name()='pssh']")? {
            match Pssh::from_base64(&pssh_node.string_value()) {
                Ok(pssh) if pssh.is_widevine() => return Ok(Some(pssh)),
                Ok(_) => debug!("skipping PSSH with a foreign system id"),
                Err(e) => debug!("skipping PSSH entry: {e}"),
            }
        }
    }

    Ok(None)
}

fn select<'d>(node: impl Into<Node<'d>>, path: &str) -> Result<Vec<Node<'d>>, Error> {
    let xpath_error = |reason: String| Error::ProtectionMetadataUnavailable(reason);

    let xpath = Factory::new()
        .build(path)
        .map_err(|e| xpath_error(format!("invalid XPath '{path}': {e:?}")))?
        .ok_or_else(|| xpath_error(format!("XPath '{path}' is empty")))?;

    let context = Context::new();
    let value = xpath
        .evaluate(&context, node)
        .map_err(|e| xpath_error(format!("XPath evaluation failed: {e:?}")))?;

    match value {
        Value::Nodeset(nodes) => Ok(nodes.document_order()),
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = include_str!("fixtures/widevine.mpd");

    fn widevine_box() -> String {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&36u32.to_be_bytes());
        bytes.extend_from_slice(b"pssh");
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(&WIDEVINE_SYSTEM_ID);
        bytes.extend_from_slice(&4u32.to_be_bytes());
        bytes.extend_from_slice(&[0x12, 0x02, 0xab, 0xcd]);
        BASE64.encode(bytes)
    }

    #[test]
    fn test_extract_widevine_pssh() {
        let pssh = extract_pssh(MANIFEST).unwrap().unwrap();
        assert_eq!(pssh.as_str(), widevine_box());
        assert!(pssh.is_widevine());
    }

    #[test]
    fn test_no_matching_entry_is_absent() {
        let manifest = MANIFEST.replace(WIDEVINE_SCHEME_ID, "urn:uuid:00000000-0000-0000-0000-000000000000");
        assert_eq!(extract_pssh(&manifest).unwrap(), None);

        let bare = r#"<?xml version="1.0"?><MPD xmlns="urn:mpeg:dash:schema:mpd:2011"><Period/></MPD>"#;
        assert_eq!(extract_pssh(bare).unwrap(), None);
    }

    #[test]
    fn test_scheme_comparison_ignores_case() {
        let manifest = MANIFEST.replace(WIDEVINE_SCHEME_ID, &WIDEVINE_SCHEME_ID.to_uppercase());
        assert!(extract_pssh(&manifest).unwrap().is_some());
    }

    #[test]
    fn test_unparsable_manifest() {
        assert!(matches!(
            extract_pssh("#EXTM3U\n#EXT-X-VERSION:3"),
            Err(Error::ProtectionMetadataUnavailable(_))
        ));
    }

    #[test]
    fn test_pssh_validation() {
        assert!(Pssh::from_base64(&widevine_box()).is_ok());
        assert!(Pssh::from_base64("not base64!").is_err());
        assert!(Pssh::from_base64(&BASE64.encode(b"too short")).is_err());
    }
}
