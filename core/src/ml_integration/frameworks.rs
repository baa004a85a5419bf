//! Framework adapters
//!
//! Every framework a model can be saved with is a variant of [`Framework`]
//! and has one entry in [`FRAMEWORK_SPECS`]. Serialization is dispatched by
//! an exhaustive match, so adding a framework means adding a variant, a
//! spec and an adapter.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::capability::{capabilities, Capability};
use crate::error::{Error, Result};
use crate::ml_integration::metadata::ModelArtifact;

/// A trained model that can be persisted as an artifact
pub trait Model: Serialize + DeserializeOwned {
    /// Framework the model was built with, e.g. `sklearn`
    fn framework_name(&self) -> &str;

    /// Framework version the model was produced with
    fn framework_version(&self) -> String;

    /// Fully-qualified class name, e.g. `sklearn.tree.DecisionTreeClassifier`
    fn model_class(&self) -> String;

    /// Framework version this build reads models with
    fn runtime_version() -> String
    where
        Self: Sized;
}

/// Frameworks that models can be saved with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    Sklearn,
}

/// Static description of a framework
#[derive(Debug)]
pub struct FrameworkSpec {
    pub framework: Framework,
    pub name: &'static str,
    /// Canonical model filename inside the artifact directory
    pub model_file: &'static str,
    /// Capability needed to (de)serialize the model file
    pub serializer: Capability,
}

static SKLEARN_SPEC: FrameworkSpec = FrameworkSpec {
    framework: Framework::Sklearn,
    name: "sklearn",
    model_file: "model.pkl",
    serializer: Capability::Pickle,
};

/// Registered frameworks
pub static FRAMEWORK_SPECS: &[&FrameworkSpec] = &[&SKLEARN_SPEC];

impl Framework {
    pub fn spec(self) -> &'static FrameworkSpec {
        match self {
            Framework::Sklearn => &SKLEARN_SPEC,
        }
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn model_file(self) -> &'static str {
        self.spec().model_file
    }

    /// Look up a registered framework by name
    pub fn from_name(name: &str) -> Option<Self> {
        FRAMEWORK_SPECS
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.framework)
    }

    /// Framework of a model, or `UnsupportedFramework` naming its class
    pub fn detect<M: Model>(model: &M) -> Result<Self> {
        Self::from_name(model.framework_name())
            .ok_or_else(|| Error::UnsupportedFramework(model.model_class()))
    }

    /// Write `model` to `path` in this framework's format
    pub fn save<M: Model>(self, model: &M, path: &Path) -> Result<()> {
        capabilities().require(self.spec().serializer)?;
        match self {
            Framework::Sklearn => sklearn::save(model, path),
        }
    }

    /// Read a model saved as `artifact` from `path`
    pub fn load<M: Model>(self, path: &Path, artifact: &ModelArtifact) -> Result<M> {
        capabilities().require(self.spec().serializer)?;
        match self {
            Framework::Sklearn => sklearn::load(path, artifact),
        }
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Compare dotted version strings component by component
///
/// Each component is a number with an optional suffix (`0rc1`, `dev0`).
/// Numbers compare numerically. On equal numbers a suffixed component is a
/// pre-release and sorts before the plain one, except `post` suffixes which
/// sort after it. Missing trailing components count as zero.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let mut left_parts = left.split(['.', '-', '+']);
    let mut right_parts = right.split(['.', '-', '+']);

    loop {
        let (l, r) = match (left_parts.next(), right_parts.next()) {
            (None, None) => return Ordering::Equal,
            (l, r) => (version_component(l), version_component(r)),
        };

        let ordering = l.0.cmp(&r.0).then_with(|| compare_suffixes(l.1, r.1));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
}

fn version_component(part: Option<&str>) -> (u64, &str) {
    let part = part.unwrap_or("0");
    let digits = part.len() - part.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let number = part[..digits].parse().unwrap_or(0);
    (number, &part[digits..])
}

fn compare_suffixes(left: &str, right: &str) -> Ordering {
    let rank = |suffix: &str| match suffix {
        "" => 1,
        s if s.starts_with("post") => 2,
        _ => 0,
    };

    rank(left).cmp(&rank(right)).then_with(|| left.cmp(right))
}

/// scikit-learn estimator state
///
/// The estimator's import path, the library version it was fitted with, its
/// constructor parameters and its fitted attributes (the trailing-underscore
/// attributes such as `coef_` or `tree_`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SklearnEstimator {
    pub class_name: String,
    pub sklearn_version: String,
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub fitted: BTreeMap<String, serde_json::Value>,
}

impl SklearnEstimator {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            sklearn_version: sklearn::RUNTIME_VERSION.to_string(),
            params: BTreeMap::new(),
            fitted: BTreeMap::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.sklearn_version = version.into();
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_fitted(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.fitted.insert(name.into(), value.into());
        self
    }

    /// Whether any fitted attribute is present
    pub fn is_fitted(&self) -> bool {
        !self.fitted.is_empty()
    }
}

impl Model for SklearnEstimator {
    fn framework_name(&self) -> &str {
        Framework::Sklearn.name()
    }

    fn framework_version(&self) -> String {
        self.sklearn_version.clone()
    }

    fn model_class(&self) -> String {
        self.class_name.clone()
    }

    fn runtime_version() -> String {
        sklearn::RUNTIME_VERSION.to_string()
    }
}

pub mod sklearn {
    //! sklearn adapter: pickled estimator state

    use super::*;

    /// scikit-learn release whose estimator layout this build reads and writes
    pub const RUNTIME_VERSION: &str = "1.3.2";

    pub(super) fn save<M: Model>(model: &M, path: &Path) -> Result<()> {
        debug!("Saving sklearn model to {:?}", path);
        codec::dump(model, path)
    }

    pub(super) fn load<M: Model>(path: &Path, artifact: &ModelArtifact) -> Result<M> {
        let runtime_version = M::runtime_version();
        if compare_versions(&runtime_version, &artifact.framework_version) == Ordering::Less {
            warn!(
                "The original model was saved via sklearn {}. The current sklearn version is {}. \
                 This might cause compatibility issues.",
                artifact.framework_version, runtime_version
            );
        }

        debug!("Loading sklearn model from {:?}", path);
        codec::load(path)
    }

    #[cfg(feature = "pickle")]
    mod codec {
        use super::*;
        use std::fs::File;
        use std::io::{BufReader, BufWriter, Write};

        pub(super) fn dump<M: Model>(model: &M, path: &Path) -> Result<()> {
            let mut writer = BufWriter::new(File::create(path)?);
            serde_pickle::to_writer(&mut writer, model, serde_pickle::SerOptions::new())?;
            writer.flush()?;
            Ok(())
        }

        pub(super) fn load<M: Model>(path: &Path) -> Result<M> {
            let reader = BufReader::new(File::open(path)?);
            Ok(serde_pickle::from_reader(reader, serde_pickle::DeOptions::new())?)
        }
    }

    #[cfg(not(feature = "pickle"))]
    mod codec {
        use super::*;

        pub(super) fn dump<M: Model>(_model: &M, _path: &Path) -> Result<()> {
            Err(Capability::Pickle.missing())
        }

        pub(super) fn load<M: Model>(_path: &Path) -> Result<M> {
            Err(Capability::Pickle.missing())
        }
    }
}
