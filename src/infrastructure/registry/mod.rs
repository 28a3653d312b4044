//! Registry protocol clients.
//!
//! Both clients shell out to a command line tool through a [`CommandRunner`]
//! and share one jittered retry loop.
//!
//! - [`WhoisClient`] - `whois <domain>`, free-text output
//! - [`RdapClient`] - `rdap -r <domain>`, JSON output

pub mod command;
pub mod lookup;
pub mod rdap;
pub mod whois;

use std::sync::Arc;

pub use command::{CommandOutput, CommandRunner, SystemCommand};
pub use rdap::RdapClient;
pub use whois::WhoisClient;

use crate::config::Config;
use crate::domain::registry::{Protocol, RegistryClient};

/// Builds the client for `protocol` with commands and timeouts from `config`.
pub fn client_for(protocol: Protocol, config: &Config) -> Arc<dyn RegistryClient> {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommand::new(config.lookup_timeout()));

    match protocol {
        Protocol::Whois => Arc::new(WhoisClient::new(runner, config.whois_command.clone())),
        Protocol::Rdap => Arc::new(RdapClient::new(runner, config.rdap_command.clone())),
    }
}
