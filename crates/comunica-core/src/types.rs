//! Shared newtypes.

use crate::error::ComunicaError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Newtype for tribunal codes (`siglaTribunal`), e.g. `TJSP` or `TRF3`.
///
/// Codes are normalized to uppercase and must be 2-10 ASCII alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TribunalCode(String);

impl TribunalCode {
    /// Create a new `TribunalCode`, trimming and uppercasing the input.
    ///
    /// # Errors
    /// Returns error if the code doesn't match the required format.
    pub fn new(code: impl AsRef<str>) -> Result<Self, ComunicaError> {
        let code = code.as_ref().trim().to_uppercase();
        Self::validate(&code)?;
        Ok(Self(code))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(code: &str) -> Result<(), ComunicaError> {
        static CODE_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex =
            CODE_REGEX.get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9]{1,9}$").expect("valid regex"));

        if regex.is_match(code) {
            Ok(())
        } else {
            Err(ComunicaError::Validation(format!(
                "invalid tribunal code: must be 2-10 alphanumeric characters, got '{code}'"
            )))
        }
    }

    /// Parse a comma-separated list such as `"TJSP, tjam,TRF3"`.
    ///
    /// Empty segments are skipped; duplicates are kept once, in first-seen order.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, ComunicaError> {
        let mut codes: Vec<Self> = Vec::new();
        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let code = Self::new(part)?;
            if !codes.contains(&code) {
                codes.push(code);
            }
        }
        Ok(codes)
    }
}

impl fmt::Display for TribunalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TribunalCode {
    type Err = ComunicaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TribunalCode {
    type Error = ComunicaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TribunalCode> for String {
    fn from(code: TribunalCode) -> Self {
        code.0
    }
}
