//! Configuration for the sync engine.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use vault_sync_protocol::SyncMode;

/// Environment variable holding the server URL.
pub const ENV_SERVER_URL: &str = "VAULT_SYNC_SERVER_URL";
/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "VAULT_SYNC_API_KEY";
/// Environment variable holding the sync mode (`text` or `full`).
pub const ENV_SYNC_MODE: &str = "VAULT_SYNC_MODE";

const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(3);
const DEFAULT_STATUS_RESET: Duration = Duration::from_secs(3);
const DEFAULT_PERIODIC_INTERVAL: Duration = Duration::from_secs(300);

/// How the engine reacts to the host's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// Push on local change; pulls only when asked.
    PushOnChange,
    /// Additionally pull on resume and every `interval` while foregrounded.
    PeriodicPull {
        /// Time between pulls.
        interval: Duration,
    },
}

impl SyncStrategy {
    /// The periodic strategy with the default interval.
    pub fn periodic() -> Self {
        SyncStrategy::PeriodicPull {
            interval: DEFAULT_PERIODIC_INTERVAL,
        }
    }
}

impl Default for SyncStrategy {
    fn default() -> Self {
        SyncStrategy::PushOnChange
    }
}

/// What happens to pending paths when the transport is not ready at push time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DroppedPushPolicy {
    /// The paths are discarded.
    #[default]
    Discard,
    /// The paths go back into the pending set; the timer is not re-armed.
    Requeue,
}

/// Configuration for one sync engine instance.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Vault scope passed to the transport (e.g. "daily", "chat").
    pub scope: String,
    /// Pattern used by incremental pulls.
    pub pull_pattern: String,
    /// Quiet period before scheduled pushes are sent.
    pub debounce: Duration,
    /// Delay before `success` falls back to `idle`.
    pub status_reset_delay: Duration,
    /// Lifecycle strategy.
    pub strategy: SyncStrategy,
    /// Handling of pushes the transport cannot take.
    pub dropped_push_policy: DroppedPushPolicy,
}

impl SyncConfig {
    /// Creates a configuration for the given scope.
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            pull_pattern: "*".into(),
            debounce: DEFAULT_DEBOUNCE,
            status_reset_delay: DEFAULT_STATUS_RESET,
            strategy: SyncStrategy::default(),
            dropped_push_policy: DroppedPushPolicy::default(),
        }
    }

    /// Sets the pattern used by incremental pulls.
    pub fn with_pull_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pull_pattern = pattern.into();
        self
    }

    /// Sets the push quiet period.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the success-to-idle delay.
    pub fn with_status_reset_delay(mut self, delay: Duration) -> Self {
        self.status_reset_delay = delay;
        self
    }

    /// Sets the lifecycle strategy.
    pub fn with_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the dropped-push policy.
    pub fn with_dropped_push_policy(mut self, policy: DroppedPushPolicy) -> Self {
        self.dropped_push_policy = policy;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("vault")
    }
}

/// User-facing sync settings: where to sync and what.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSettings {
    /// Remote vault endpoint.
    pub server_url: Option<String>,
    /// Credential for the endpoint.
    pub api_key: Option<String>,
    /// Text-only or full sync.
    #[serde(default)]
    pub sync_mode: SyncMode,
}

impl VaultSettings {
    /// Settings pointing at `server_url`.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: Some(server_url.into()),
            ..Self::default()
        }
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the sync mode.
    pub fn with_sync_mode(mut self, mode: SyncMode) -> Self {
        self.sync_mode = mode;
        self
    }

    /// Reads settings from `VAULT_SYNC_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through an arbitrary variable lookup.
    ///
    /// Blank values count as unset; an unknown mode falls back to text-only.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            server_url: non_blank(ENV_SERVER_URL),
            api_key: non_blank(ENV_API_KEY),
            sync_mode: non_blank(ENV_SYNC_MODE)
                .and_then(|value| SyncMode::parse(&value))
                .unwrap_or_default(),
        }
    }

    /// The configured endpoint, if any.
    pub fn endpoint(&self) -> Option<&str> {
        self.server_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Whether binary attachments take part in sync.
    pub fn include_binary(&self) -> bool {
        self.sync_mode.include_binary()
    }
}

/// Supplies the current settings. Read at the start of every operation.
pub trait ConfigSource: Send + Sync {
    /// Returns a snapshot of the current settings.
    fn settings(&self) -> VaultSettings;
}

impl ConfigSource for VaultSettings {
    fn settings(&self) -> VaultSettings {
        self.clone()
    }
}

/// Settings the host can change while the engine runs.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<VaultSettings>>,
}

impl SharedSettings {
    /// Wraps initial settings.
    pub fn new(settings: VaultSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Replaces the settings.
    pub fn update(&self, settings: VaultSettings) {
        *self.inner.write() = settings;
    }
}

impl ConfigSource for SharedSettings {
    fn settings(&self) -> VaultSettings {
        self.inner.read().clone()
    }
}
