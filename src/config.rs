//! Pool and connection configuration (spec.md §6, §8).

use crate::connection::CallbackMode;
use crate::driver::DriverKind;
use crate::error::{Error, Result};

const DEFAULT_INITIAL_SIZE: usize = 1;
const DEFAULT_MAX_SIZE: usize = 8;

/// Everything needed to create a [`crate::pool::Pool`]: which driver to use,
/// the driver-specific connection string, the resident/transient sizing,
/// and the default callback mode new connections are opened with.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) driver_kind: DriverKind,
    pub(crate) conninfo: String,
    pub(crate) initial_size: usize,
    pub(crate) max_size: usize,
    pub(crate) default_callback_mode: CallbackMode,
}

impl Config {
    pub fn driver_kind(&self) -> DriverKind {
        self.driver_kind
    }

    pub fn conninfo(&self) -> &str {
        &self.conninfo
    }

    pub fn initial_size(&self) -> usize {
        self.initial_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn default_callback_mode(&self) -> CallbackMode {
        self.default_callback_mode
    }
}

/// A builder to override default pool sizing and build the [`Config`].
pub struct ConfigBuilder {
    driver_kind: Option<DriverKind>,
    conninfo: Option<String>,
    initial_size: Option<usize>,
    max_size: Option<usize>,
    default_callback_mode: Option<CallbackMode>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Which driver kind to connect with (spec.md §6).
    pub fn driver_kind(mut self, driver_kind: DriverKind) -> Self {
        self.driver_kind = Some(driver_kind);
        self
    }

    /// The driver-specific connection string.
    pub fn conninfo(mut self, conninfo: impl Into<String>) -> Self {
        self.conninfo = Some(conninfo.into());
        self
    }

    /// The number of connections opened eagerly at pool creation and never
    /// closed for the pool's lifetime (spec.md §4.5).
    ///
    /// Defaults to 1 if not set.
    pub fn initial_size(mut self, initial_size: usize) -> Self {
        self.initial_size = Some(initial_size);
        self
    }

    /// The maximum total number of connections (resident plus transient)
    /// the pool will ever hold at once (spec.md §4.5).
    ///
    /// Defaults to 8 if not set.
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// The callback mode new connections are opened with.
    ///
    /// Defaults to [`CallbackMode::Worker`] if not set.
    pub fn default_callback_mode(mut self, mode: CallbackMode) -> Self {
        self.default_callback_mode = Some(mode);
        self
    }

    pub fn build(self) -> Result<Config> {
        let driver_kind = self
            .driver_kind
            .ok_or(Error::InvalidConfig("driver_kind must be set"))?;
        let conninfo = self
            .conninfo
            .ok_or(Error::InvalidConfig("conninfo must be set"))?;
        if conninfo.is_empty() {
            return Err(Error::InvalidConfig("conninfo must not be empty"));
        }
        let initial_size = self.initial_size.unwrap_or(DEFAULT_INITIAL_SIZE);
        let max_size = self.max_size.unwrap_or(DEFAULT_MAX_SIZE);
        if initial_size == 0 {
            return Err(Error::InvalidConfig("initial_size must be at least 1"));
        }
        if initial_size > max_size {
            return Err(Error::InvalidConfig("initial_size must not exceed max_size"));
        }
        Ok(Config {
            driver_kind,
            conninfo,
            initial_size,
            max_size,
            default_callback_mode: self.default_callback_mode.unwrap_or(CallbackMode::Worker),
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        ConfigBuilder {
            driver_kind: None,
            conninfo: None,
            initial_size: None,
            max_size: None,
            default_callback_mode: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_config() {
        let config = ConfigBuilder::new()
            .driver_kind(DriverKind::Mock)
            .conninfo(":memory:")
            .initial_size(2)
            .max_size(5)
            .default_callback_mode(CallbackMode::Loop)
            .build()
            .unwrap();
        assert_eq!(config.initial_size(), 2);
        assert_eq!(config.max_size(), 5);
        assert_eq!(config.default_callback_mode(), CallbackMode::Loop);
    }

    #[test]
    fn should_build_with_defaults() {
        let config = ConfigBuilder::new()
            .driver_kind(DriverKind::Mock)
            .conninfo(":memory:")
            .build()
            .unwrap();
        assert_eq!(config.initial_size(), 1);
        assert_eq!(config.max_size(), 8);
        assert_eq!(config.default_callback_mode(), CallbackMode::Worker);
    }

    #[test]
    fn should_reject_missing_fields() {
        assert!(ConfigBuilder::new().conninfo(":memory:").build().is_err());
        assert!(ConfigBuilder::new()
            .driver_kind(DriverKind::Mock)
            .build()
            .is_err());
    }

    #[test]
    fn should_reject_initial_size_zero() {
        let err = ConfigBuilder::new()
            .driver_kind(DriverKind::Mock)
            .conninfo(":memory:")
            .initial_size(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn should_reject_initial_size_over_max_size() {
        let err = ConfigBuilder::new()
            .driver_kind(DriverKind::Mock)
            .conninfo(":memory:")
            .initial_size(5)
            .max_size(2)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
