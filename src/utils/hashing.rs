//! Identifier Hashing
//!
//! Every identifier that crosses a module boundary (resource names,
//! const-buffer fields, render-target names, vertex-attribute fields) is
//! interned as the 32-bit xxHash of its text. Hashes are what the runtime
//! compares and stores; the original strings are kept only where they are
//! needed for shader code generation and diagnostics.

use xxhash_rust::xxh32::xxh32;

/// Seed for identifier hashing. Changing it invalidates every persisted
/// hash, so it is fixed for the lifetime of the on-disk formats.
const NAME_HASH_SEED: u32 = 0;

/// Hashes an identifier into its 32-bit interned form.
#[inline]
#[must_use]
pub fn name_hash(name: &str) -> u32 {
    xxh32(name.as_bytes(), NAME_HASH_SEED)
}

/// An identifier together with its interned hash.
///
/// Equality and hashing go through the 32-bit hash only; the text rides
/// along for code generation and log messages.
#[derive(Debug, Clone)]
pub struct HashedName {
    text: String,
    hash: u32,
}

impl HashedName {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let hash = name_hash(&text);
        Self { text, hash }
    }

    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> u32 {
        self.hash
    }
}

impl PartialEq for HashedName {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for HashedName {}

impl std::hash::Hash for HashedName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl std::fmt::Display for HashedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl From<&str> for HashedName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable() {
        assert_eq!(name_hash("Camera"), name_hash("Camera"));
        assert_ne!(name_hash("Camera"), name_hash("camera"));
    }

    #[test]
    fn hashed_name_equality_goes_through_hash() {
        let a = HashedName::new("diffuseMap");
        let b = HashedName::new("diffuseMap");
        assert_eq!(a, b);
        assert_eq!(a.text(), "diffuseMap");
    }
}
