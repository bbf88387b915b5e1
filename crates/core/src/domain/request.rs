// Resource Request Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::region::RegionId;
use serde::{Deserialize, Serialize};

/// Default shape for the free-tier ARM offering
pub const DEFAULT_SHAPE_NAME: &str = "VM.Standard.A1.Flex";

/// Default display name for created instances
pub const DEFAULT_DISPLAY_NAME: &str = "AutoCreated-VM";

/// Default attempt budget per job
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1000;

/// Where the caller wants the resource placed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "mode", content = "regions")]
pub enum Placement {
    /// Let the catalog rank every known region
    #[default]
    Any,
    /// Exactly one region, never anything else
    Single(RegionId),
    /// Caller-ordered list of regions
    Ordered(Vec<RegionId>),
}

impl Placement {
    /// Build a placement from the loose API form (one region, a list, or nothing)
    ///
    /// `region` together with `regions` is tried first, ahead of the list.
    /// An explicit empty list stays an empty `Ordered` so validation rejects it.
    pub fn from_parts(region: Option<String>, regions: Option<Vec<String>>) -> Self {
        match (region, regions) {
            (None, None) => Placement::Any,
            (Some(region), None) => Placement::Single(region),
            (_, Some(regions)) if regions.is_empty() => Placement::Ordered(regions),
            (region, Some(regions)) => {
                let mut ordered: Vec<RegionId> = Vec::with_capacity(regions.len() + 1);
                for id in region.into_iter().chain(regions) {
                    if !ordered.contains(&id) {
                        ordered.push(id);
                    }
                }
                if ordered.len() == 1 {
                    Placement::Single(ordered.remove(0))
                } else {
                    Placement::Ordered(ordered)
                }
            }
        }
    }

    /// Regions explicitly named by the caller
    pub fn named_regions(&self) -> &[RegionId] {
        match self {
            Placement::Any => &[],
            Placement::Single(region) => std::slice::from_ref(region),
            Placement::Ordered(regions) => regions,
        }
    }
}

/// Requested VM shape dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceShape {
    pub ocpus: u32,
    pub memory_gb: u32,
    pub storage_gb: u32,
}

impl Default for ResourceShape {
    fn default() -> Self {
        Self {
            ocpus: 2,
            memory_gb: 12,
            storage_gb: 50,
        }
    }
}

/// Inclusive range for one shape dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bound {
    pub min: u32,
    pub max: u32,
}

impl Bound {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: u32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Provider-defined limits for a shape (free-tier A1 Flex by default)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeBounds {
    pub ocpus: Bound,
    pub memory_gb: Bound,
    pub storage_gb: Bound,
}

impl Default for ShapeBounds {
    fn default() -> Self {
        Self {
            ocpus: Bound::new(1, 4),
            memory_gb: Bound::new(6, 24),
            storage_gb: Bound::new(47, 200),
        }
    }
}

impl ShapeBounds {
    /// Check every dimension, reporting the first one out of range
    pub fn check(&self, shape: &ResourceShape) -> Result<()> {
        let dims = [
            ("ocpus", shape.ocpus, self.ocpus),
            ("memory_gb", shape.memory_gb, self.memory_gb),
            ("storage_gb", shape.storage_gb, self.storage_gb),
        ];

        for (name, value, bound) in dims {
            if !bound.contains(value) {
                return Err(DomainError::InvalidConfiguration(format!(
                    "{} = {} out of range [{}, {}]",
                    name, value, bound.min, bound.max
                )));
            }
        }
        Ok(())
    }
}

/// Immutable description of what the caller wants provisioned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub placement: Placement,
    pub shape_name: String,
    pub shape: ResourceShape,
    pub display_name: String,
    pub max_attempts: u32,
}

impl Default for ResourceRequest {
    fn default() -> Self {
        Self {
            placement: Placement::Any,
            shape_name: DEFAULT_SHAPE_NAME.to_string(),
            shape: ResourceShape::default(),
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ResourceRequest {
    /// Request pinned to a single region with default shape
    pub fn in_region(region: impl Into<String>) -> Self {
        Self {
            placement: Placement::Single(region.into()),
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_shape(mut self, shape: ResourceShape) -> Self {
        self.shape = shape;
        self
    }
}
