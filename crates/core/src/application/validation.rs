// Request validation, run before any job exists
use crate::application::region_catalog::RegionCatalog;
use crate::domain::error::{DomainError, Result};
use crate::domain::{Placement, ResourceRequest, ShapeBounds};

/// Longest display name the provider accepts
pub const MAX_DISPLAY_NAME_LEN: usize = 255;

/// Validate a request against shape bounds and the region catalog
///
/// Every failure is `InvalidConfiguration`; nothing is created on error.
pub fn validate_request(
    req: &ResourceRequest,
    bounds: &ShapeBounds,
    catalog: &RegionCatalog,
) -> Result<()> {
    if req.max_attempts == 0 {
        return Err(invalid("max_attempts must be at least 1"));
    }

    validate_display_name(&req.display_name)?;

    if req.shape_name.trim().is_empty() {
        return Err(invalid("shape name cannot be empty"));
    }

    bounds.check(&req.shape)?;

    if let Placement::Ordered(regions) = &req.placement {
        if regions.is_empty() {
            return Err(invalid("region list cannot be empty"));
        }
    }

    let unknown = catalog.unknown_regions(&req.placement);
    if !unknown.is_empty() {
        return Err(invalid(&format!("unknown region(s): {}", unknown.join(", "))));
    }

    Ok(())
}

fn validate_display_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(invalid("display name cannot be empty"));
    }
    if name.len() > MAX_DISPLAY_NAME_LEN {
        return Err(invalid(&format!(
            "display name too long (max {} bytes)",
            MAX_DISPLAY_NAME_LEN
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(invalid("display name contains control characters"));
    }
    Ok(())
}

fn invalid(msg: &str) -> DomainError {
    DomainError::InvalidConfiguration(msg.to_string())
}
