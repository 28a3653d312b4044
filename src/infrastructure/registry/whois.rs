//! WHOIS client built on the system `whois` command.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use super::command::{CommandOutput, CommandRunner};
use super::lookup::{DEFAULT_MAX_BACKOFF, lookup_with_retry};
use crate::domain::entities::{QueryOutcome, RegistryAnswer};
use crate::domain::registry::{Protocol, RegistryClient};
use crate::error::{LookupError, LookupErrorKind};

static EXPIRY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:registry expiry date|registrar registration expiration date|expiration date|expiry date|expiration time|expire date|expires on|expires|paid-till|valid until|renewal date)[ \t.:]*([^\r\n]*\S)",
    )
    .expect("Invalid expiry line regex")
});

const QUOTA_MARKERS: &[&str] = &[
    "quota exceeded",
    "limit exceeded",
    "rate limit",
    "too many requests",
    "exceeded the maximum",
    "query rate",
];

const UNKNOWN_TLD_MARKERS: &[&str] = &["no whois server is known", "no whois server"];

const PRIVATE_MARKERS: &[&str] = &["private registry", "not available to the public"];

const NOT_FOUND_MARKERS: &[&str] = &[
    "no match",
    "not found",
    "no data found",
    "no entries found",
    "no object found",
    "domain not found",
    "status: available",
    "status: free",
    "is available for registration",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y.%m.%d %H:%M:%S",
    "%d-%b-%Y %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d-%b-%Y",
    "%Y.%m.%d",
    "%d.%m.%Y",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%Y%m%d",
];

/// WHOIS protocol client.
///
/// Every failure kind is retryable: registries answer rate limits, unknown
/// TLDs and unparsable output inconsistently, so a repeated query is worth it.
pub struct WhoisClient {
    runner: Arc<dyn CommandRunner>,
    program: String,
    max_backoff: Duration,
}

impl WhoisClient {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }

    /// Overrides the upper bound of the pause between repeated queries.
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    async fn query(&self, domain: &str) -> Result<RegistryAnswer, LookupError> {
        let output = self
            .runner
            .run(&self.program, &[domain.to_string()])
            .await?;
        classify(&output)
    }
}

#[async_trait]
impl RegistryClient for WhoisClient {
    async fn lookup(&self, domain: &str, retry_limit: u32) -> QueryOutcome {
        lookup_with_retry(Protocol::Whois, domain, retry_limit, self.max_backoff, || {
            self.query(domain)
        })
        .await
    }

    fn protocol(&self) -> Protocol {
        Protocol::Whois
    }
}

/// Maps raw WHOIS output to an answer or an error kind.
pub fn classify(output: &CommandOutput) -> Result<RegistryAnswer, LookupError> {
    let text = if output.stdout.trim().is_empty() {
        output.stderr.as_str()
    } else {
        output.stdout.as_str()
    };

    if text.trim().is_empty() {
        let kind = if output.success() {
            LookupErrorKind::FailedParsing
        } else {
            LookupErrorKind::CommandFailed
        };
        return Err(LookupError::new(
            kind,
            format!("empty output, exit code {}", output.code),
        ));
    }

    // A parseable expiry outranks every marker
    let candidates: Vec<&str> = EXPIRY_LINE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect();

    if let Some(expiry) = candidates.iter().find_map(|c| parse_expiry(c)) {
        return Ok(RegistryAnswer::Registered { expiry });
    }

    let lower = text.to_lowercase();
    let contains_any = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    if contains_any(QUOTA_MARKERS) {
        return Err(LookupError::new(LookupErrorKind::QuotaExceeded, first_line(text)));
    }
    if contains_any(UNKNOWN_TLD_MARKERS) {
        return Err(LookupError::new(LookupErrorKind::UnknownTld, first_line(text)));
    }
    if contains_any(PRIVATE_MARKERS) {
        return Err(LookupError::new(LookupErrorKind::PrivateRegistry, first_line(text)));
    }
    if contains_any(NOT_FOUND_MARKERS) {
        return Ok(RegistryAnswer::Available);
    }

    match candidates.last() {
        Some(last) => Err(LookupError::new(LookupErrorKind::UnknownDateFormat, *last)),
        None => Err(LookupError::new(
            LookupErrorKind::FailedParsing,
            "no expiration date in output",
        )),
    }
}

/// Parses the date formats registries are known to print.
pub fn parse_expiry(raw: &str) -> Option<NaiveDateTime> {
    let value = raw
        .trim()
        .trim_end_matches("(UTC)")
        .trim_end_matches("UTC")
        .trim_end_matches("GMT")
        .trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    // Registries that print a date followed by free text
    let head = value.split_whitespace().next().unwrap_or(value);

    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(head, f).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}
