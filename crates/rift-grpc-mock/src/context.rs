//! Mock state shared by every client built for one test context.

use crate::config::MockConfig;
use crate::permission::{AllowSpec, NetConnectConfig};
use crate::registry::{RequestStub, StubRegistry};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// On/off switch, connection policy and stub registry for intercepted calls.
///
/// Mocking starts disabled and net connect starts allowed. Share it between
/// clients as an `Arc<MockContext>`; every call reads the state when it
/// starts.
#[derive(Debug, Default)]
pub struct MockContext {
    enabled: AtomicBool,
    net_connect: RwLock<NetConnectConfig>,
    registry: StubRegistry,
}

impl MockContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a loaded configuration file.
    pub fn from_config(config: &MockConfig) -> anyhow::Result<Self> {
        let context = Self::new();
        config.apply(&context)?;
        Ok(context)
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
        debug!("gRPC mocking enabled");
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        debug!("gRPC mocking disabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Block real connections except to localhost (when asked) and `allow`.
    ///
    /// Replaces the whole permission record.
    pub fn disable_net_connect(&self, allow_localhost: bool, allow: Option<AllowSpec>) {
        debug!(allow_localhost, allow = ?allow, "Net connect disabled");
        *self.net_connect.write() = NetConnectConfig {
            allow_net_connect: false,
            allow_localhost,
            allow,
        };
    }

    /// Allow real connections again; the localhost flag and allow list are kept.
    pub fn allow_net_connect(&self) {
        self.net_connect.write().allow_net_connect = true;
        debug!("Net connect allowed");
    }

    /// Snapshot of the current permission record.
    pub fn net_connect_config(&self) -> NetConnectConfig {
        self.net_connect.read().clone()
    }

    pub fn registry(&self) -> &StubRegistry {
        &self.registry
    }

    pub fn register(&self, stub: RequestStub) -> Arc<RequestStub> {
        self.registry.register(stub)
    }
}
