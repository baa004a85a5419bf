//! SDK configuration handle
//!
//! Holds the remote-execution flag and delegates every other lookup to the
//! shared [`GlobalConfig`]. One value is created per process and passed by
//! reference to each operation.

use std::ops::Deref;

use crate::config::{GlobalConfig, InitOptions};

#[derive(Debug, Clone, Default)]
pub struct SdkConfig {
    remote: bool,
    global: GlobalConfig,
}

impl SdkConfig {
    pub fn new(global: GlobalConfig) -> Self {
        Self {
            remote: false,
            global,
        }
    }

    /// Set the remote flag (when given) and forward `options` to the global config
    ///
    /// `remote: None` keeps the current flag instead of resetting it to
    /// `false`; pass `Some(false)` to clear it.
    pub fn init(&mut self, remote: Option<bool>, options: InitOptions) {
        if let Some(remote) = remote {
            self.remote = remote;
        }
        self.global.init(options);
    }

    /// Whether work should execute remotely
    pub fn remote(&self) -> bool {
        self.remote
    }

    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }
}

impl Deref for SdkConfig {
    type Target = GlobalConfig;

    fn deref(&self) -> &GlobalConfig {
        &self.global
    }
}

impl From<GlobalConfig> for SdkConfig {
    fn from(global: GlobalConfig) -> Self {
        Self::new(global)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_defaults_to_false() {
        let config = SdkConfig::default();
        assert!(!config.remote());
    }

    #[test]
    fn test_init_sets_remote_and_forwards_options() {
        let mut config = SdkConfig::default();
        config.init(
            Some(true),
            InitOptions {
                project: Some("my-project".to_string()),
                ..Default::default()
            },
        );

        assert!(config.remote());
        assert_eq!(config.project.as_deref(), Some("my-project"));
        assert_eq!(config.global().project.as_deref(), Some("my-project"));
    }

    #[test]
    fn test_init_without_remote_keeps_flag() {
        let mut config = SdkConfig::default();
        config.init(Some(true), InitOptions::default());
        config.init(
            None,
            InitOptions {
                location: Some("europe-west4".to_string()),
                ..Default::default()
            },
        );

        assert!(config.remote());
        assert_eq!(config.location, "europe-west4");

        config.init(Some(false), InitOptions::default());
        assert!(!config.remote());
        assert_eq!(config.location, "europe-west4");
    }
}
