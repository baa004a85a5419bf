//! Pre-built serving containers
//!
//! Lookup of the Vertex AI prediction images that serve a framework version.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Hardware a serving container targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accelerator {
    Cpu,
    Gpu,
}

impl Accelerator {
    pub fn as_str(self) -> &'static str {
        match self {
            Accelerator::Cpu => "cpu",
            Accelerator::Gpu => "gpu",
        }
    }
}

impl std::fmt::Display for Accelerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of serving container images
pub trait ContainerCatalog: Send + Sync {
    /// Image serving `framework` at the version closest to `version`
    fn closest_match(
        &self,
        framework: &str,
        version: &str,
        region: &str,
        accelerator: Accelerator,
    ) -> Result<String>;
}

/// One published serving image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrebuiltImage {
    pub framework: &'static str,
    pub accelerator: Accelerator,
    pub version: (u32, u32),
}

impl PrebuiltImage {
    fn repository(&self) -> &'static str {
        match (self.framework, self.version.0) {
            ("tensorflow", 1) => "tf",
            ("tensorflow", _) => "tf2",
            (framework, _) => framework,
        }
    }

    /// Artifact Registry URI of the image in `registry_region` (us, europe or asia)
    pub fn uri(&self, registry_region: &str) -> String {
        format!(
            "{}-docker.pkg.dev/vertex-ai/prediction/{}-{}.{}-{}:latest",
            registry_region,
            self.repository(),
            self.accelerator,
            self.version.0,
            self.version.1
        )
    }
}

/// Multi-region registries the images are published to
const REGISTRY_REGIONS: &[&str] = &["us", "europe", "asia"];

const SKLEARN_VERSIONS: &[(u32, u32)] = &[
    (0, 20),
    (0, 22),
    (0, 23),
    (0, 24),
    (1, 0),
    (1, 2),
    (1, 3),
    (1, 4),
    (1, 5),
];

const XGBOOST_VERSIONS: &[(u32, u32)] = &[
    (0, 82),
    (0, 90),
    (1, 1),
    (1, 2),
    (1, 3),
    (1, 4),
    (1, 5),
    (1, 6),
    (1, 7),
    (2, 0),
    (2, 1),
];

const TENSORFLOW_VERSIONS: &[(u32, u32)] = &[
    (1, 15),
    (2, 1),
    (2, 2),
    (2, 3),
    (2, 4),
    (2, 5),
    (2, 6),
    (2, 7),
    (2, 8),
    (2, 9),
    (2, 10),
    (2, 11),
    (2, 12),
    (2, 13),
    (2, 14),
    (2, 15),
];

/// The published prediction images
#[derive(Debug, Clone)]
pub struct PrebuiltContainers {
    images: Vec<PrebuiltImage>,
}

impl Default for PrebuiltContainers {
    fn default() -> Self {
        Self::new()
    }
}

impl PrebuiltContainers {
    pub fn new() -> Self {
        let families: [(&'static str, &[Accelerator], &[(u32, u32)]); 3] = [
            ("sklearn", &[Accelerator::Cpu], SKLEARN_VERSIONS),
            ("xgboost", &[Accelerator::Cpu], XGBOOST_VERSIONS),
            (
                "tensorflow",
                &[Accelerator::Cpu, Accelerator::Gpu],
                TENSORFLOW_VERSIONS,
            ),
        ];

        let images = families
            .into_iter()
            .flat_map(|(framework, accelerators, versions)| {
                accelerators.iter().flat_map(move |&accelerator| {
                    versions.iter().map(move |&version| PrebuiltImage {
                        framework,
                        accelerator,
                        version,
                    })
                })
            })
            .collect();

        Self { images }
    }

    pub fn images(&self) -> &[PrebuiltImage] {
        &self.images
    }
}

/// `us-central1` → `us`
fn registry_region(region: &str) -> Option<&'static str> {
    let prefix = region.split('-').next()?;
    REGISTRY_REGIONS.iter().copied().find(|r| *r == prefix)
}

/// `1.3.2` → `(1, 3)`
fn major_minor(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.split('.');
    let major = parts.next()?.trim().parse().ok()?;
    let minor = parts
        .next()
        .map(|minor| {
            let digits: String = minor.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        })
        .unwrap_or(Some(0))?;
    Some((major, minor))
}

impl ContainerCatalog for PrebuiltContainers {
    fn closest_match(
        &self,
        framework: &str,
        version: &str,
        region: &str,
        accelerator: Accelerator,
    ) -> Result<String> {
        let not_found = || {
            Error::NoPrebuiltContainer(format!(
                "{} {} ({}) in {}",
                framework, version, accelerator, region
            ))
        };

        let registry = registry_region(region).ok_or_else(not_found)?;
        let wanted = major_minor(version).ok_or_else(not_found)?;

        let candidates: Vec<&PrebuiltImage> = self
            .images
            .iter()
            .filter(|image| image.framework == framework && image.accelerator == accelerator)
            .collect();

        let exact = candidates.iter().find(|image| image.version == wanted);
        let older = candidates
            .iter()
            .filter(|image| image.version.cmp(&wanted) == Ordering::Less)
            .max_by_key(|image| image.version);
        let newer = candidates
            .iter()
            .filter(|image| image.version.cmp(&wanted) == Ordering::Greater)
            .min_by_key(|image| image.version);

        let image = exact.or(older).or(newer).ok_or_else(not_found)?;
        if image.version != wanted {
            warn!(
                "No serving container for {} {}; using {}.{}",
                framework, version, image.version.0, image.version.1
            );
        }

        let uri = image.uri(registry);
        debug!("Serving container for {} {}: {}", framework, version, uri);
        Ok(uri)
    }
}
