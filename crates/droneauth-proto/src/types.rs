//! Value types carried inside handshake messages.

use std::fmt;

use bytes::Bytes;

use crate::FieldTooLong;

/// Length of a challenge nonce in bytes.
pub const NONCE_LEN: usize = 32;

/// Maximum length of a variable-length field (identity token, signature).
///
/// Always representable by the `u16` length prefix on the wire.
pub const MAX_FIELD_LEN: usize = 1024;

/// Single-use random value issued by the authenticator.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_LEN]);

impl Nonce {
    /// Wrap raw nonce bytes
    #[must_use]
    pub const fn new(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw nonce bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A prefix is enough to tell nonces apart in logs
        write!(f, "Nonce({:02x}{:02x}{:02x}{:02x}..)", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

/// Identity claimed by a drone in `AuthRequest`.
///
/// # Invariants
///
/// - `len() <= MAX_FIELD_LEN`, enforced by [`IdentityToken::new`]. This keeps
///   encoding total.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct IdentityToken(Bytes);

impl IdentityToken {
    /// Create an identity token.
    ///
    /// # Errors
    ///
    /// Returns [`FieldTooLong`] if the token exceeds [`MAX_FIELD_LEN`].
    pub fn new(token: impl Into<Bytes>) -> Result<Self, FieldTooLong> {
        let token = token.into();
        check_len("identity token", token.len())?;
        Ok(Self(token))
    }

    /// Raw token bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Token length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the token is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityToken({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Signed response to a challenge, opaque to the codec.
///
/// # Security
///
/// - **Debug Redaction**: The `Debug` impl prints only the length so that
///   signatures never end up in logs verbatim.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature(Bytes);

impl Signature {
    /// Create a signature.
    ///
    /// # Errors
    ///
    /// Returns [`FieldTooLong`] if the signature exceeds [`MAX_FIELD_LEN`].
    pub fn new(signature: impl Into<Bytes>) -> Result<Self, FieldTooLong> {
        let signature = signature.into();
        check_len("signature", signature.len())?;
        Ok(Self(signature))
    }

    /// Create a signature from a fixed-size array, checked at compile time.
    pub fn from_array<const N: usize>(signature: [u8; N]) -> Self {
        const { assert!(N <= MAX_FIELD_LEN, "signature exceeds MAX_FIELD_LEN") };
        Self(Bytes::copy_from_slice(&signature))
    }

    /// Raw signature bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Signature length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the signature is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(<redacted {} bytes>)", self.0.len())
    }
}

fn check_len(field: &'static str, len: usize) -> Result<(), FieldTooLong> {
    if len > MAX_FIELD_LEN {
        return Err(FieldTooLong { field, len, max: MAX_FIELD_LEN });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_at_limit_is_accepted() {
        let token = IdentityToken::new(vec![b'a'; MAX_FIELD_LEN]).unwrap();
        assert_eq!(token.len(), MAX_FIELD_LEN);
    }

    #[test]
    fn identity_over_limit_is_rejected() {
        let err = IdentityToken::new(vec![b'a'; MAX_FIELD_LEN + 1]).unwrap_err();
        assert_eq!(err, FieldTooLong {
            field: "identity token",
            len: MAX_FIELD_LEN + 1,
            max: MAX_FIELD_LEN
        });
    }

    #[test]
    fn signature_debug_is_redacted() {
        let sig = Signature::new(vec![0xAB; 8]).unwrap();
        let rendered = format!("{sig:?}");
        assert_eq!(rendered, "Signature(<redacted 8 bytes>)");
        assert!(!rendered.contains("ab"));
    }

    #[test]
    fn signature_from_array() {
        let sig = Signature::from_array([7u8; 16]);
        assert_eq!(sig, Signature::new(vec![7u8; 16]).unwrap());
    }

    #[test]
    fn identity_displays_as_text() {
        let token = IdentityToken::new("drone-7").unwrap();
        assert_eq!(token.to_string(), "drone-7");
    }

    #[test]
    fn max_field_len_fits_length_prefix() {
        assert!(u16::try_from(MAX_FIELD_LEN).is_ok());
    }
}
