use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use base64::{DecodeError, DecodeSliceError, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A server-generated record identity.
///
/// Holds 128 random bits and renders as 22 characters of URL-safe base64
/// without padding, which is what travels in the identity cookie.
#[derive(Copy, Clone, Debug, Deserialize, Serialize, Eq, Hash, PartialEq)]
pub struct Id([u8; 16]);

impl Id {
    /// Mints a fresh identity.
    pub fn new() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&BASE64_URL_SAFE_NO_PAD.encode(self.0))
    }
}

impl FromStr for Id {
    type Err = DecodeSliceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // 22 chars decode to exactly 16 bytes.
        if s.len() != 22 {
            return Err(DecodeSliceError::DecodeError(DecodeError::InvalidLength(
                s.len(),
            )));
        }

        let mut decoded = [0; 16];
        let bytes_decoded = BASE64_URL_SAFE_NO_PAD.decode_slice(s.as_bytes(), &mut decoded)?;
        if bytes_decoded != 16 {
            let err = DecodeError::InvalidLength(bytes_decoded);
            return Err(DecodeSliceError::DecodeError(err));
        }

        Ok(Self(decoded))
    }
}
