//! Runtime configuration for [`InventoryOperations`](crate::InventoryOperations).

use std::time::Duration;

use tracing::warn;

pub const LOCK_TIMEOUT_ENV: &str = "STOCKLEDGER_LOCK_TIMEOUT_MS";
pub const SAME_LOCATION_TRANSFER_ENV: &str = "STOCKLEDGER_SAME_LOCATION_TRANSFER";

/// What a transfer whose source and destination coincide does.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum SameLocationTransfer {
    /// Check availability and log the movement; quantities are unchanged.
    #[default]
    LogOnly,
    /// Refuse with `ValidationFailed`.
    Reject,
}

impl SameLocationTransfer {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "log" | "log_only" | "log-only" => Some(Self::LogOnly),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationsConfig {
    /// Upper bound on waiting for another operation on the same product.
    pub lock_timeout: Duration,
    pub same_location_transfer: SameLocationTransfer,
}

impl Default for OperationsConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(2),
            same_location_transfer: SameLocationTransfer::default(),
        }
    }
}

impl OperationsConfig {
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn with_same_location_transfer(mut self, policy: SameLocationTransfer) -> Self {
        self.same_location_transfer = policy;
        self
    }

    /// Read overrides from the process environment.
    ///
    /// Unset variables keep their defaults; unparsable ones are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(LOCK_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.lock_timeout = Duration::from_millis(ms),
                _ => warn!(var = LOCK_TIMEOUT_ENV, value = %raw, "ignoring invalid lock timeout"),
            }
        }

        if let Some(raw) = lookup(SAME_LOCATION_TRANSFER_ENV) {
            match SameLocationTransfer::parse(&raw) {
                Some(policy) => config.same_location_transfer = policy,
                None => warn!(
                    var = SAME_LOCATION_TRANSFER_ENV,
                    value = %raw,
                    "ignoring invalid same-location transfer policy (expected log or reject)"
                ),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let config = OperationsConfig::from_lookup(lookup(&[]));
        assert_eq!(config, OperationsConfig::default());
        assert_eq!(config.lock_timeout, Duration::from_secs(2));
        assert_eq!(config.same_location_transfer, SameLocationTransfer::LogOnly);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = OperationsConfig::from_lookup(lookup(&[
            (LOCK_TIMEOUT_ENV, "250"),
            (SAME_LOCATION_TRANSFER_ENV, " Reject "),
        ]));
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.same_location_transfer, SameLocationTransfer::Reject);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = OperationsConfig::from_lookup(lookup(&[
            (LOCK_TIMEOUT_ENV, "soon"),
            (SAME_LOCATION_TRANSFER_ENV, "maybe"),
        ]));
        assert_eq!(config, OperationsConfig::default());

        let zero = OperationsConfig::from_lookup(lookup(&[(LOCK_TIMEOUT_ENV, "0")]));
        assert_eq!(zero.lock_timeout, Duration::from_secs(2));
    }
}
