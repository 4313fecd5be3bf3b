//! Channel configuration.

/// Channel namespace used when neither side specifies one.
pub const DEFAULT_CHANNEL_ID: &str = "marimo-iframe-api";

/// Upper bound on a single encoded frame (8 MiB).
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 8 * 1024 * 1024;

/// Environment variable overriding the channel id in [`ChannelConfig::from_env`].
pub const CHANNEL_ID_ENV: &str = "FRAMELINK_CHANNEL_ID";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Both ends must agree on this to interoperate.
    pub channel_id: String,
    pub max_frame_length: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelConfig {
    pub fn new() -> Self {
        Self {
            channel_id: DEFAULT_CHANNEL_ID.to_string(),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }

    /// Default config with the channel id taken from `FRAMELINK_CHANNEL_ID`
    /// when set and non-empty.
    pub fn from_env() -> Self {
        let config = Self::new();
        match std::env::var(CHANNEL_ID_ENV) {
            Ok(id) if !id.trim().is_empty() => config.with_channel_id(id.trim()),
            _ => config,
        }
    }

    pub fn with_channel_id(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = channel_id.into();
        self
    }

    pub fn with_max_frame_length(mut self, max: usize) -> Self {
        self.max_frame_length = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_well_known_channel() {
        let config = ChannelConfig::default();
        assert_eq!(config.channel_id, "marimo-iframe-api");
        assert_eq!(config.max_frame_length, DEFAULT_MAX_FRAME_LENGTH);
    }

    #[test]
    fn builder_pattern() {
        let config = ChannelConfig::new()
            .with_channel_id("notebook-7")
            .with_max_frame_length(1024);
        assert_eq!(config.channel_id, "notebook-7");
        assert_eq!(config.max_frame_length, 1024);
    }
}
