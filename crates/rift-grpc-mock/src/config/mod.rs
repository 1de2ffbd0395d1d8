//! Configuration files for a mock context.
//!
//! ```yaml
//! enabled: true
//! netConnect:
//!   allow: false
//!   allowLocalhost: true
//!   allowList: [example.com, { matches: "^https://.*\\.internal" }]
//! stubs:
//!   - method: /hello.Hello/Hello
//!     request:
//!       equals: { msg: "hello!" }
//!     responses:
//!       - is: { msg: "hi!" }
//!       - error: { code: UNAVAILABLE, message: "try later" }
//! ```

mod net_connect;
mod stubs;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

pub use net_connect::{AllowEntry, NetConnectSettings};
pub use stubs::{is_method_path, RequestPredicate, ResponseDefinition, StubDefinition};

use crate::context::MockContext;
use crate::permission::NetConnectConfig;
use crate::registry::RequestStub;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockConfig {
    /// Turn interception on when the config is applied
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub net_connect: NetConnectSettings,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stubs: Vec<StubDefinition>,
}

impl MockConfig {
    /// Load configuration from a YAML or JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, anyhow::Error> {
        let config: MockConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Err(e) = self.net_connect.allow_spec() {
            anyhow::bail!("Invalid netConnect.allowList pattern: {}", e);
        }

        for stub in &self.stubs {
            stub.validate()?;
        }

        Ok(())
    }

    pub fn net_connect_config(&self) -> Result<NetConnectConfig, anyhow::Error> {
        Ok(self.net_connect.to_config()?)
    }

    pub fn build_stubs(&self) -> Vec<RequestStub> {
        self.stubs.iter().map(StubDefinition::to_stub).collect()
    }

    /// Apply switches, permissions and stubs to a context.
    ///
    /// Stubs are registered in file order, so a later stub wins over an
    /// earlier one matching the same call.
    pub fn apply(&self, context: &MockContext) -> Result<(), anyhow::Error> {
        self.validate()?;

        let net_connect = self.net_connect_config()?;
        context.disable_net_connect(net_connect.allow_localhost, net_connect.allow);
        if net_connect.allow_net_connect {
            context.allow_net_connect();
        }

        for stub in self.build_stubs() {
            context.register(stub);
        }

        if self.enabled {
            context.enable();
        } else {
            context.disable();
        }

        info!(
            enabled = self.enabled,
            stubs = self.stubs.len(),
            allow_net_connect = net_connect.allow_net_connect,
            "Applied mock configuration"
        );
        Ok(())
    }
}
