//! Capability detection
//!
//! Serialization backends are cargo features. Which of them were compiled in
//! is decided once per process; callers ask for a capability and get either
//! `Ok(())` or an actionable [`Error::MissingOptionalDependency`].

use std::sync::OnceLock;

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Serialization capabilities the SDK can be built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Pickle encoding for sklearn model files
    Pickle,
    /// DataFrame input examples
    Tabular,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::Pickle, Capability::Tabular];

    /// Cargo feature that provides the capability
    pub fn feature(self) -> &'static str {
        match self {
            Capability::Pickle => "pickle",
            Capability::Tabular => "tabular",
        }
    }

    /// Library backing the capability
    pub fn library(self) -> &'static str {
        match self {
            Capability::Pickle => "serde-pickle",
            Capability::Tabular => "polars",
        }
    }

    fn purpose(self) -> &'static str {
        match self {
            Capability::Pickle => "saving and loading sklearn models",
            Capability::Tabular => "DataFrame input examples",
        }
    }

    fn required(self) -> bool {
        matches!(self, Capability::Pickle)
    }

    fn compiled_in(self) -> bool {
        match self {
            Capability::Pickle => cfg!(feature = "pickle"),
            Capability::Tabular => cfg!(feature = "tabular"),
        }
    }

    /// Error describing how to enable this capability
    pub fn missing(self) -> Error {
        Error::MissingOptionalDependency {
            library: self.library(),
            purpose: self.purpose(),
            hint: format!("Please rebuild with `--features {}`.", self.feature()),
        }
    }
}

/// Availability of a capability in this build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    /// Absent, and callers silently skip it
    UnavailableOptional,
    /// Absent, and operations needing it fail
    UnavailableRequired,
}

/// Detected capabilities of the running build
#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    pickle: Availability,
    tabular: Availability,
}

impl Capabilities {
    /// Detect the compiled-in features
    pub fn detect() -> Self {
        let availability = |capability: Capability| {
            if capability.compiled_in() {
                Availability::Available
            } else if capability.required() {
                Availability::UnavailableRequired
            } else {
                debug!(
                    "{} support not compiled in, skipping",
                    capability.library()
                );
                Availability::UnavailableOptional
            }
        };

        Self {
            pickle: availability(Capability::Pickle),
            tabular: availability(Capability::Tabular),
        }
    }

    pub fn get(&self, capability: Capability) -> Availability {
        match capability {
            Capability::Pickle => self.pickle,
            Capability::Tabular => self.tabular,
        }
    }

    pub fn is_available(&self, capability: Capability) -> bool {
        self.get(capability) == Availability::Available
    }

    /// Fail with an install hint when a required capability is absent
    pub fn require(&self, capability: Capability) -> Result<()> {
        match self.get(capability) {
            Availability::UnavailableRequired => Err(capability.missing()),
            Availability::Available | Availability::UnavailableOptional => Ok(()),
        }
    }
}

/// Capabilities of this process, detected on first use
pub fn capabilities() -> &'static Capabilities {
    static CAPABILITIES: OnceLock<Capabilities> = OnceLock::new();
    CAPABILITIES.get_or_init(Capabilities::detect)
}
