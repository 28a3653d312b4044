//! Registry lookup contract.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::entities::QueryOutcome;
use crate::error::ScanError;

/// Registry protocol used to answer availability questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Whois,
    Rdap,
}

impl FromStr for Protocol {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "whois" => Ok(Self::Whois),
            "rdap" => Ok(Self::Rdap),
            _ => Err(ScanError::UnknownProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Whois => f.write_str("whois"),
            Self::Rdap => f.write_str("rdap"),
        }
    }
}

/// Answers whether a domain is available.
///
/// Lookups never fail: transient protocol errors are retried with a jittered
/// pause up to `retry_limit` times, and an exhausted lookup comes back as a
/// failed [`QueryOutcome`] carrying the last error kind.
///
/// # Implementations
///
/// - [`crate::infrastructure::registry::WhoisClient`]
/// - [`crate::infrastructure::registry::RdapClient`]
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn lookup(&self, domain: &str, retry_limit: u32) -> QueryOutcome;

    fn protocol(&self) -> Protocol;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_parse() {
        assert_eq!("whois".parse::<Protocol>().unwrap(), Protocol::Whois);
        assert_eq!("RDAP".parse::<Protocol>().unwrap(), Protocol::Rdap);
        assert!(matches!(
            "dns".parse::<Protocol>(),
            Err(ScanError::UnknownProtocol(_))
        ));
    }
}
