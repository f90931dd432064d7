//! Per-function nonce allocation.
//!
//! A nonce collapses parameter names while preserving the binding: every
//! identifier referring to a formal parameter carries its function's nonce,
//! so two parameters named alike in different functions stay distinct in
//! the node-hash key space. Nonce values never enter signature strings.

use rand::rngs::OsRng;
use rand::RngCore;

/// Nonce length in bytes (rendered as 32 lowercase hex chars).
const NONCE_LEN: usize = 16;

/// Policy for allocating per-function parameter nonces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NonceMode {
    /// Fresh random nonce per function per invocation (the default).
    #[default]
    Random,
    /// Nonce derived from the minting site's root-to-node type path and a
    /// per-invocation ordinal; reproducible across invocations on
    /// identical input.
    DerivedFromPath,
}

/// Mints nonces for one signature computation.
///
/// One source feeds both the annotator and structure construction, so the
/// ordinal sequence is a property of the invocation, not of either pass.
pub(crate) struct NonceSource {
    mode: NonceMode,
    minted: u64,
}

impl NonceSource {
    pub(crate) fn new(mode: NonceMode) -> Self {
        Self { mode, minted: 0 }
    }

    /// A fresh 32-hex-char nonce. `path` is the minting site's
    /// root-to-node type path (only read in `DerivedFromPath` mode).
    pub(crate) fn mint(&mut self, path: &str) -> String {
        self.minted += 1;
        match self.mode {
            NonceMode::Random => {
                let mut bytes = [0u8; NONCE_LEN];
                OsRng.fill_bytes(&mut bytes);
                hex::encode(bytes)
            }
            NonceMode::DerivedFromPath => {
                let digest = blake3::hash(format!("{}#{}", path, self.minted).as_bytes());
                hex::encode(&digest.as_bytes()[..NONCE_LEN])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_nonce_shape() {
        let mut source = NonceSource::new(NonceMode::Random);
        let nonce = source.mint("Program");
        assert_eq!(nonce.len(), 2 * NONCE_LEN);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(nonce, source.mint("Program"), "random nonces must differ");
    }

    #[test]
    fn test_derived_nonce_reproducible() {
        let mut first = NonceSource::new(NonceMode::DerivedFromPath);
        let mut second = NonceSource::new(NonceMode::DerivedFromPath);
        let a1 = first.mint("Program");
        let a2 = first.mint("Program");
        assert_ne!(a1, a2, "the ordinal separates repeated mints at one path");
        assert_eq!(a1, second.mint("Program"), "mint sequences must replay");
        assert_eq!(a2, second.mint("Program"));
    }

    #[test]
    fn test_derived_nonce_path_sensitive() {
        let mut first = NonceSource::new(NonceMode::DerivedFromPath);
        let mut second = NonceSource::new(NonceMode::DerivedFromPath);
        assert_ne!(first.mint("Program"), second.mint("ProgramBlockStatement"));
    }
}
