//! Signature kinds and their parse-priority order.

use std::fmt;

/// Cryptographic scheme that produced an artifact signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureKind {
    /// Legacy DSA signatures, still required by Sparkle for Windows.
    Dsa,
    /// `EdDSA` over Curve25519, the scheme modern Sparkle prefers.
    Ed25519,
}

impl SignatureKind {
    /// Kinds in parse-priority order.
    ///
    /// When an enclosure element carries several signature attributes, the
    /// first kind yielded here that is present wins and the rest are dropped.
    pub fn priority() -> impl Iterator<Item = Self> {
        [Self::Ed25519, Self::Dsa].into_iter()
    }

    /// Feed attribute key carrying this kind of signature.
    pub fn feed_key(self) -> &'static str {
        match self {
            Self::Dsa => "sparkle:dsaSignature",
            Self::Ed25519 => "sparkle:edSignature",
        }
    }

    /// Human-readable scheme name.
    pub fn description(self) -> &'static str {
        match self {
            Self::Dsa => "DSA",
            Self::Ed25519 => "Ed25519",
        }
    }
}

impl fmt::Display for SignatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A detached signature attached to an artifact.
///
/// The value is opaque: whatever the external signing tool printed, typically
/// base64. sparkcast never verifies signatures, it only carries them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Scheme that produced the signature.
    pub kind: SignatureKind,
    /// Signature material as emitted by the signer.
    pub value: String,
}

impl Signature {
    /// Tag `value` with the scheme that produced it.
    pub fn new(kind: SignatureKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_outranks_dsa() {
        let first = SignatureKind::priority().next();
        assert_eq!(first, Some(SignatureKind::Ed25519));
    }

    #[test]
    fn feed_keys_use_sparkle_namespace() {
        assert_eq!(SignatureKind::Dsa.feed_key(), "sparkle:dsaSignature");
        assert_eq!(SignatureKind::Ed25519.feed_key(), "sparkle:edSignature");
    }
}
