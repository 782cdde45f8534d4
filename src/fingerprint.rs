//! Content fingerprints for shapes and announcements

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::wire::Encode;

/// SHA256 over the canonical wire encoding of a value.
///
/// Two structurally equal shapes always encode to the same bytes, so they
/// share a fingerprint in any process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint raw encoded bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Fingerprint the canonical encoding of `value`
    pub fn of<T: Encode + ?Sized>(value: &T) -> Self {
        Self::from_bytes(&value.to_wire())
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }

    /// Verify that encoded bytes match this fingerprint
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::from_bytes(data) == *self
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{Field, Shape};

    #[test]
    fn test_fingerprint_consistency() {
        let shape = Shape::Struct(vec![Field::new("a", Shape::Bool)]);
        assert_eq!(shape.fingerprint(), shape.clone().fingerprint());
        assert_eq!(shape.fingerprint().as_str().len(), 64);
    }

    #[test]
    fn test_fingerprint_different_content() {
        let a = Shape::Struct(vec![Field::new("a", Shape::Bool)]);
        let b = Shape::Struct(vec![Field::new("b", Shape::Bool)]);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_verification() {
        let bytes = Shape::String.to_wire();
        let fingerprint = Fingerprint::from_bytes(&bytes);
        assert!(fingerprint.verify(&bytes));
        assert!(!fingerprint.verify(&Shape::Bool.to_wire()));
        assert_eq!(fingerprint.short().len(), 12);
    }

    #[test]
    fn test_short_never_splits_a_character() {
        assert_eq!(Fingerprint::from("aéééééééé".to_string()).short(), "aéééééééé");
        assert_eq!(Fingerprint::from("abc".to_string()).short(), "abc");
    }
}
