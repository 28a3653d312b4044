//! RDAP client built on the `rdap` command line client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;

use super::command::{CommandOutput, CommandRunner};
use super::lookup::{DEFAULT_MAX_BACKOFF, lookup_with_retry};
use crate::domain::entities::{QueryOutcome, RegistryAnswer};
use crate::domain::registry::{Protocol, RegistryClient};
use crate::error::{LookupError, LookupErrorKind};

const OBJECT_MISSING: &str = "RDAP server returned 404, object does not exist";

#[derive(Debug, Deserialize)]
struct RdapDomain {
    #[serde(default)]
    events: Vec<RdapEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RdapEvent {
    event_action: String,
    event_date: String,
}

/// RDAP protocol client. Runs `rdap -r <domain>` and reads the raw JSON
/// response.
pub struct RdapClient {
    runner: Arc<dyn CommandRunner>,
    program: String,
    max_backoff: Duration,
}

impl RdapClient {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    async fn query(&self, domain: &str) -> Result<RegistryAnswer, LookupError> {
        let args = ["-r".to_string(), domain.to_string()];
        let output = self.runner.run(&self.program, &args).await?;
        classify(&output)
    }
}

#[async_trait]
impl RegistryClient for RdapClient {
    async fn lookup(&self, domain: &str, retry_limit: u32) -> QueryOutcome {
        lookup_with_retry(Protocol::Rdap, domain, retry_limit, self.max_backoff, || {
            self.query(domain)
        })
        .await
    }

    fn protocol(&self) -> Protocol {
        Protocol::Rdap
    }
}

/// Maps an `rdap` run to an answer or an error kind.
///
/// A successful run must carry an `expiration` event; anything else is a
/// [`LookupErrorKind::DecodeError`].
pub fn classify(output: &CommandOutput) -> Result<RegistryAnswer, LookupError> {
    if !output.success() {
        if output.stderr.contains(OBJECT_MISSING) || output.stdout.contains(OBJECT_MISSING) {
            return Ok(RegistryAnswer::Available);
        }
        let message = if output.stderr.trim().is_empty() {
            format!("rdap exited with code {}", output.code)
        } else {
            output.stderr.trim().to_string()
        };
        return Err(LookupError::new(LookupErrorKind::CommandFailed, message));
    }

    let response: RdapDomain = serde_json::from_str(&output.stdout)
        .map_err(|e| LookupError::new(LookupErrorKind::DecodeError, e.to_string()))?;

    let event = response
        .events
        .iter()
        .find(|e| e.event_action == "expiration")
        .ok_or_else(|| LookupError::new(LookupErrorKind::DecodeError, "no expiration event"))?;

    let expiry = DateTime::parse_from_rfc3339(&event.event_date)
        .map_err(|e| {
            LookupError::new(
                LookupErrorKind::DecodeError,
                format!("bad expiration date '{}': {e}", event.event_date),
            )
        })?
        .naive_utc();

    Ok(RegistryAnswer::Registered { expiry })
}
