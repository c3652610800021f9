use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Handle to one image element inside a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ImageRef {
    /// Document-native attributes of the element (`src`, `alt`, ...)
    pub attributes: BTreeMap<String, String>,
    /// Content part holding the image; always 0 for flat documents
    pub part: usize,
    /// Position of the image within its part's linear content order
    pub position: usize,
}

impl ImageRef {
    pub fn new(part: usize, position: usize, attributes: BTreeMap<String, String>) -> Self {
        Self {
            attributes,
            part,
            position,
        }
    }

    /// The `src` attribute, used as the lookup key for everything else
    pub fn source(&self) -> Option<&str> {
        self.attributes.get("src").map(String::as_str)
    }

    pub fn alt(&self) -> Option<&str> {
        self.attributes.get("alt").map(String::as_str)
    }

    /// True when there is no `alt`, or it only holds whitespace
    pub fn is_missing_description(&self) -> bool {
        self.alt().is_none_or(|alt| alt.trim().is_empty())
    }
}

/// Nearest non-empty text flanking an image in document order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Context {
    pub before: Option<String>,
    pub after: Option<String>,
}

impl Context {
    pub fn new(before: Option<String>, after: Option<String>) -> Self {
        Self { before, after }
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.after.is_none()
    }
}

/// Generated alt-text for one image, ready to be applied back to its document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Association {
    pub src: String,
    pub alt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<u64>,
    /// Refined description produced alongside version 1 alt-text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refined_description: Option<String>,
}

impl Association {
    pub fn new(src: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            alt: alt.into(),
            hash: None,
            refined_description: None,
        }
    }

    pub fn with_hash(mut self, hash: u64) -> Self {
        self.hash = Some(hash);
        self
    }
}

/// Deterministic content hash: the leading 8 bytes of the SHA-256 digest
pub fn content_hash(bytes: &[u8]) -> u64 {
    let digest = Sha256::digest(bytes);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(attrs: &[(&str, &str)]) -> ImageRef {
        let attributes = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ImageRef::new(0, 0, attributes)
    }

    #[test]
    fn test_missing_description_classification() {
        assert!(image(&[("src", "a.png")]).is_missing_description());
        assert!(image(&[("src", "a.png"), ("alt", "")]).is_missing_description());
        assert!(image(&[("src", "a.png"), ("alt", "  \n\t ")]).is_missing_description());
        assert!(!image(&[("src", "a.png"), ("alt", "A red barn")]).is_missing_description());
    }

    #[test]
    fn test_content_hash_is_deterministic() {
        let a = content_hash(b"image bytes");
        let b = content_hash(b"image bytes");
        let c = content_hash(b"other bytes");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_association_serialization_skips_absent_fields() {
        let json = serde_json::to_value(Association::new("img1.png", "A cat")).unwrap();
        assert_eq!(json, serde_json::json!({ "src": "img1.png", "alt": "A cat" }));

        let json = serde_json::to_value(Association::new("img1.png", "A cat").with_hash(7)).unwrap();
        assert_eq!(json["hash"], 7);
    }
}
