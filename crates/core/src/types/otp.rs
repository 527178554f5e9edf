//! One-time password codes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`OtpCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpCodeError {
    /// The code does not have exactly six characters.
    #[error("code must be exactly {expected} digits")]
    WrongLength {
        /// Required number of digits.
        expected: usize,
    },
    /// The code contains a non-digit character.
    #[error("code must contain only digits")]
    NonDigit,
}

/// A six-digit one-time password as typed by the user.
///
/// Surrounding whitespace is ignored; anything else must be ASCII digits.
///
/// ```
/// use campus_market_core::OtpCode;
///
/// assert!(OtpCode::parse(" 123456 ").is_ok());
/// assert!(OtpCode::parse("12345").is_err());
/// assert!(OtpCode::parse("12a456").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OtpCode(String);

impl OtpCode {
    /// Number of digits in a code.
    pub const LENGTH: usize = 6;

    /// Parse a code.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is not exactly six ASCII digits.
    pub fn parse(s: &str) -> Result<Self, OtpCodeError> {
        let s = s.trim();
        if s.chars().count() != Self::LENGTH {
            return Err(OtpCodeError::WrongLength {
                expected: Self::LENGTH,
            });
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OtpCodeError::NonDigit);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Codes are credentials; keep them out of logs.
impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(******)")
    }
}

impl TryFrom<String> for OtpCode {
    type Error = OtpCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OtpCode> for String {
    fn from(code: OtpCode) -> Self {
        code.0
    }
}
