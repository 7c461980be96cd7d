use std::collections::BTreeSet;
use std::fmt;

use serde::{Serialize, Serializer};

pub const STATE_CODES: [&str; 52] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA", "KS",
    "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM", "NY",
    "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA", "WV",
    "WI", "WY", "DC", "PR",
];

/// Return-address ZIP codes of the label issuer.
pub const DEFAULT_SENDER_ZIPS: [&str; 6] = ["92841", "91710", "91761", "91708", "30126", "90601"];

/// A destination code from [`STATE_CODES`]. Cannot hold anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateCode(&'static str);

impl StateCode {
    pub fn parse(candidate: &str) -> Option<Self> {
        STATE_CODES
            .into_iter()
            .find(|code| code.eq_ignore_ascii_case(candidate))
            .map(Self)
    }

    pub fn as_str(self) -> &'static str {
        self.0
    }

    #[cfg(test)]
    pub fn all() -> impl Iterator<Item = StateCode> {
        STATE_CODES.into_iter().map(Self)
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for StateCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

pub fn default_sender_zips() -> BTreeSet<String> {
    DEFAULT_SENDER_ZIPS
        .iter()
        .map(|zip| zip.to_string())
        .collect()
}
