//! Share payload model.
//!
//! A payload delivered by the host sharing mechanism advertises one or more
//! representations of the same underlying content. Representations are not
//! mutually exclusive; the resolver picks between them by priority.

use std::path::PathBuf;

/// Type identifier of a single payload representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepresentationKind {
    Image,
    FileReference,
    GenericLocator,
    Document,
    RawBytes,
    PlainText,
}

impl RepresentationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::FileReference => "file-reference",
            Self::GenericLocator => "generic-locator",
            Self::Document => "document",
            Self::RawBytes => "raw-bytes",
            Self::PlainText => "plain-text",
        }
    }
}

impl std::fmt::Display for RepresentationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One concrete representation carried by a payload.
#[derive(Debug, Clone)]
pub enum Representation {
    /// Encoded image bytes (PNG, JPEG, ...).
    Image(Vec<u8>),
    /// Pointer to a file on disk.
    FileReference(PathBuf),
    /// Generic resource locator; `file://` URLs and bare paths are supported.
    GenericLocator(String),
    /// Document bytes (PDF).
    Document(Vec<u8>),
    /// Untyped bytes; format must be sniffed.
    RawBytes(Vec<u8>),
    /// Text shared directly, no decoding needed.
    PlainText(String),
}

impl Representation {
    pub fn kind(&self) -> RepresentationKind {
        match self {
            Self::Image(_) => RepresentationKind::Image,
            Self::FileReference(_) => RepresentationKind::FileReference,
            Self::GenericLocator(_) => RepresentationKind::GenericLocator,
            Self::Document(_) => RepresentationKind::Document,
            Self::RawBytes(_) => RepresentationKind::RawBytes,
            Self::PlainText(_) => RepresentationKind::PlainText,
        }
    }
}

/// Opaque bundle of representations as delivered by the host environment.
#[derive(Debug, Clone, Default)]
pub struct SharePayload {
    representations: Vec<Representation>,
}

impl SharePayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a representation, builder style.
    pub fn with(mut self, representation: Representation) -> Self {
        self.representations.push(representation);
        self
    }

    pub fn push(&mut self, representation: Representation) {
        self.representations.push(representation);
    }

    pub fn is_empty(&self) -> bool {
        self.representations.is_empty()
    }

    /// First representation advertised under the given identifier, if any.
    pub fn get(&self, kind: RepresentationKind) -> Option<&Representation> {
        self.representations.iter().find(|r| r.kind() == kind)
    }

    pub fn has(&self, kind: RepresentationKind) -> bool {
        self.get(kind).is_some()
    }

    /// Identifiers advertised by this payload, in insertion order.
    pub fn kinds(&self) -> Vec<RepresentationKind> {
        self.representations.iter().map(|r| r.kind()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip_strings() {
        assert_eq!(RepresentationKind::FileReference.as_str(), "file-reference");
        assert_eq!(RepresentationKind::RawBytes.to_string(), "raw-bytes");
    }

    #[test]
    fn test_payload_lookup() {
        let payload = SharePayload::new()
            .with(Representation::RawBytes(vec![1, 2, 3]))
            .with(Representation::FileReference(PathBuf::from("/tmp/x.png")));

        assert!(payload.has(RepresentationKind::RawBytes));
        assert!(payload.has(RepresentationKind::FileReference));
        assert!(!payload.has(RepresentationKind::Image));
        assert_eq!(
            payload.kinds(),
            vec![
                RepresentationKind::RawBytes,
                RepresentationKind::FileReference
            ]
        );
    }

    #[test]
    fn test_empty_payload() {
        let payload = SharePayload::new();
        assert!(payload.is_empty());
        assert!(payload.get(RepresentationKind::Image).is_none());
    }
}
