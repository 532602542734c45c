//! Identifier service.
//!
//! Every identified object in a graph carries a 128-bit [`Id`], generated
//! randomly at construction (UUID v4) or parsed from its hyphenated text form.

use crate::error::{Result, SeaError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A 128-bit identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(Uuid);

impl Id {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Id(Uuid::new_v4())
    }

    /// Parses an identifier, failing with `InvalidIdentifier` on malformed input.
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Id)
            .map_err(|_| SeaError::InvalidIdentifier(s.to_string()))
    }

    /// Returns true if `s` is a well-formed identifier.
    pub fn is_valid(s: &str) -> bool {
        Uuid::parse_str(s.trim()).is_ok()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for Id {
    fn from(uuid: Uuid) -> Self {
        Id(uuid)
    }
}

impl FromStr for Id {
    type Err = SeaError;

    fn from_str(s: &str) -> Result<Self> {
        Id::parse(s)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}
