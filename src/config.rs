//! Device acquisition settings.

use crate::error::{Error, Result};

/// Device acquisition settings for a [`DeviceContext`](crate::gpu::DeviceContext).
#[derive(Debug, Clone)]
pub struct Config {
    /// Adapter preference, `WGPU_POWER_PREF` or high performance by default
    pub power_preference: wgpu::PowerPreference,
    /// Backends to search, `WGPU_BACKEND` or all by default
    pub backends: wgpu::Backends,
    /// Only accept a software adapter
    pub force_fallback_adapter: bool,
    /// Label of the requested device
    pub device_label: String,
    /// Features the device must support
    pub required_features: wgpu::Features,
    /// Limits the device must support
    pub required_limits: wgpu::Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            power_preference: wgpu::util::power_preference_from_env()
                .unwrap_or(wgpu::PowerPreference::HighPerformance),
            backends: wgpu::util::backend_bits_from_env().unwrap_or(wgpu::Backends::all()),
            force_fallback_adapter: false,
            device_label: "brr-device".to_string(),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        }
    }
}

impl Config {
    /// Start a builder from the defaults
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Reject settings that can never acquire a device
    pub fn validate(&self) -> Result<()> {
        if self.device_label.trim().is_empty() {
            return Err(Error::config("device_label must not be empty"));
        }

        if self.backends.is_empty() {
            return Err(Error::config("at least one backend must be enabled"));
        }

        Ok(())
    }
}

/// Builder for [`Config`]
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Builder seeded with [`Config::default`]
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Set the adapter power preference
    pub fn power_preference(mut self, preference: wgpu::PowerPreference) -> Self {
        self.config.power_preference = preference;
        self
    }

    /// Set the backends to search
    pub fn backends(mut self, backends: wgpu::Backends) -> Self {
        self.config.backends = backends;
        self
    }

    /// Require a fallback (software) adapter
    pub fn force_fallback_adapter(mut self, force: bool) -> Self {
        self.config.force_fallback_adapter = force;
        self
    }

    /// Set the device label
    pub fn device_label<S: Into<String>>(mut self, label: S) -> Self {
        self.config.device_label = label.into();
        self
    }

    /// Set the required device features
    pub fn required_features(mut self, features: wgpu::Features) -> Self {
        self.config.required_features = features;
        self
    }

    /// Set the required device limits
    pub fn required_limits(mut self, limits: wgpu::Limits) -> Self {
        self.config.required_limits = limits;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = Config::builder()
            .power_preference(wgpu::PowerPreference::LowPower)
            .force_fallback_adapter(true)
            .device_label("test-device")
            .build()
            .unwrap();

        assert_eq!(config.power_preference, wgpu::PowerPreference::LowPower);
        assert!(config.force_fallback_adapter);
        assert_eq!(config.device_label, "test-device");
    }

    #[test]
    fn test_empty_label_rejected() {
        let err = Config::builder().device_label("  ").build().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_empty_backends_rejected() {
        let err = Config::builder()
            .backends(wgpu::Backends::empty())
            .build()
            .unwrap_err();
        assert!(err.is_config());
    }
}
