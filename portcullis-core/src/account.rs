//! Account identifiers used as throttle keys
//!
//! Every throttle operation is keyed by an [`AccountId`]: an email address that
//! has been trimmed, lowercased and checked against a practical subset of
//! RFC 5322. Two spellings of the same address (`Alice@Example.com` and
//! ` alice@example.com`) always share one attempt record.

use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$").expect("Invalid email regex pattern")
});

const MAX_EMAIL_LENGTH: usize = 254;

/// A normalized account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Normalize and validate a raw identifier.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use portcullis_core::AccountId;
    ///
    /// let id = AccountId::parse("  Alice@Example.COM ").unwrap();
    /// assert_eq!(id.as_str(), "alice@example.com");
    /// assert!(AccountId::parse("not-an-email").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalized = raw.trim().to_lowercase();

        if normalized.is_empty() {
            return Err(ValidationError::MissingField(
                "accountId is required".to_string(),
            ));
        }

        if normalized.len() > MAX_EMAIL_LENGTH {
            return Err(ValidationError::InvalidAccountId(
                "identifier is too long".to_string(),
            ));
        }

        if !EMAIL_REGEX.is_match(&normalized) {
            return Err(ValidationError::InvalidAccountId(normalized));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AccountId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccountId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for AccountId {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}
