//! Connection-permission configuration.

use crate::permission::{AllowSpec, NetConnectConfig};
use serde::{Deserialize, Serialize};

/// Whether unmatched calls may reach real servers
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetConnectSettings {
    /// Allow every real connection (default true)
    #[serde(default = "default_allow")]
    pub allow: bool,

    /// Allow localhost targets while connections are disabled
    #[serde(default)]
    pub allow_localhost: bool,

    /// Endpoints still reachable while connections are disabled
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow_list: Vec<AllowEntry>,
}

fn default_allow() -> bool {
    true
}

impl Default for NetConnectSettings {
    fn default() -> Self {
        Self {
            allow: default_allow(),
            allow_localhost: false,
            allow_list: Vec::new(),
        }
    }
}

impl NetConnectSettings {
    /// Compile the allow list; an empty list allows nothing.
    pub fn allow_spec(&self) -> Result<Option<AllowSpec>, regex::Error> {
        if self.allow_list.is_empty() {
            return Ok(None);
        }
        let entries = self
            .allow_list
            .iter()
            .map(AllowEntry::to_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(AllowSpec::Any(entries)))
    }

    pub fn to_config(&self) -> Result<NetConnectConfig, regex::Error> {
        Ok(NetConnectConfig {
            allow_net_connect: self.allow,
            allow_localhost: self.allow_localhost,
            allow: self.allow_spec()?,
        })
    }
}

/// One allow-list entry: a host string, `{matches: <regex>}`, or a nested list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AllowEntry {
    Host(String),
    Pattern { matches: String },
    List(Vec<AllowEntry>),
}

impl AllowEntry {
    pub fn to_spec(&self) -> Result<AllowSpec, regex::Error> {
        match self {
            AllowEntry::Host(host) => Ok(AllowSpec::Host(host.clone())),
            AllowEntry::Pattern { matches } => AllowSpec::pattern(matches),
            AllowEntry::List(entries) => entries
                .iter()
                .map(AllowEntry::to_spec)
                .collect::<Result<Vec<_>, _>>()
                .map(AllowSpec::Any),
        }
    }
}
