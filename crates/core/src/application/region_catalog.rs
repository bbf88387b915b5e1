// Region catalog: candidate placement targets and their ranking
use crate::domain::error::{DomainError, Result};
use crate::domain::{Placement, PlacementCandidate, RegionInfo};
use std::cmp::Ordering;

/// Known regions with their historical statistics
///
/// Catalog order is the tie-breaker of last resort, so it is kept as given.
#[derive(Debug, Clone)]
pub struct RegionCatalog {
    regions: Vec<RegionInfo>,
}

impl RegionCatalog {
    pub fn new(regions: Vec<RegionInfo>) -> Self {
        Self { regions }
    }

    /// Built-in figures from observed free-tier acquisition times
    pub fn seeded() -> Self {
        Self::new(vec![
            RegionInfo::new("us-phoenix-1", "US West (Phoenix)", 0.90, (180, 200), "3-7 days"),
            RegionInfo::new("us-ashburn-1", "US East (Ashburn)", 0.85, (200, 250), "5-10 days"),
            RegionInfo::new("ap-tokyo-1", "Japan East (Tokyo)", 0.75, (30, 60), "1-3 weeks"),
            RegionInfo::new(
                "ap-singapore-1",
                "Singapore",
                0.65,
                (80, 120),
                "2-4 weeks",
            ),
            RegionInfo::new("ap-seoul-1", "South Korea Central (Seoul)", 0.40, (5, 15), "4-8 weeks+"),
        ])
    }

    /// Replace entries with the same ID, append new ones
    pub fn with_overrides(mut self, overrides: Vec<RegionInfo>) -> Self {
        for info in overrides {
            match self.regions.iter_mut().find(|r| r.id == info.id) {
                Some(existing) => *existing = info,
                None => self.regions.push(info),
            }
        }
        self
    }

    pub fn regions(&self) -> &[RegionInfo] {
        &self.regions
    }

    pub fn get(&self, id: &str) -> Option<&RegionInfo> {
        self.regions.iter().find(|r| r.id == id)
    }

    /// Regions named by `placement` that the catalog does not know
    pub fn unknown_regions<'a>(&self, placement: &'a Placement) -> Vec<&'a str> {
        placement
            .named_regions()
            .iter()
            .filter(|id| self.get(id).is_none())
            .map(String::as_str)
            .collect()
    }

    /// Ordered candidates for a placement
    ///
    /// - `Single` yields exactly that region
    /// - `Ordered` keeps the caller's order (duplicates dropped)
    /// - `Any` sorts by success rate desc, latency class asc, catalog order
    pub fn rank(&self, placement: &Placement) -> Result<Vec<PlacementCandidate>> {
        let unknown = self.unknown_regions(placement);
        if !unknown.is_empty() {
            return Err(DomainError::InvalidConfiguration(format!(
                "unknown region(s): {}",
                unknown.join(", ")
            )));
        }

        match placement {
            Placement::Single(id) => Ok(vec![self.candidate(id)?]),
            Placement::Ordered(ids) => {
                if ids.is_empty() {
                    return Err(DomainError::InvalidConfiguration(
                        "region list is empty".to_string(),
                    ));
                }
                let mut seen = Vec::with_capacity(ids.len());
                for id in ids {
                    if !seen.iter().any(|c: &PlacementCandidate| &c.region == id) {
                        seen.push(self.candidate(id)?);
                    }
                }
                Ok(seen)
            }
            Placement::Any => {
                if self.regions.is_empty() {
                    return Err(DomainError::InvalidConfiguration(
                        "region catalog is empty".to_string(),
                    ));
                }
                let mut ranked: Vec<PlacementCandidate> =
                    self.regions.iter().map(PlacementCandidate::from).collect();
                // sort_by is stable: equal keys keep catalog order
                ranked.sort_by(|a, b| {
                    b.success_rate
                        .partial_cmp(&a.success_rate)
                        .unwrap_or(Ordering::Equal)
                        .then(a.latency.cmp(&b.latency))
                });
                Ok(ranked)
            }
        }
    }

    fn candidate(&self, id: &str) -> Result<PlacementCandidate> {
        self.get(id)
            .map(PlacementCandidate::from)
            .ok_or_else(|| DomainError::InvalidConfiguration(format!("unknown region: {}", id)))
    }
}

impl Default for RegionCatalog {
    fn default() -> Self {
        Self::seeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LatencyClass;

    fn ids(candidates: &[PlacementCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.region.as_str()).collect()
    }

    #[test]
    fn test_any_ranks_by_success_rate() {
        let ranked = RegionCatalog::seeded().rank(&Placement::Any).unwrap();
        assert_eq!(
            ids(&ranked),
            vec!["us-phoenix-1", "us-ashburn-1", "ap-tokyo-1", "ap-singapore-1", "ap-seoul-1"]
        );
        assert_eq!(ranked[2].latency, LatencyClass::Low);
    }

    #[test]
    fn test_ties_break_on_latency_then_catalog_order() {
        let catalog = RegionCatalog::new(vec![
            RegionInfo::new("far", "Far", 0.5, (300, 400), "-"),
            RegionInfo::new("near", "Near", 0.5, (5, 10), "-"),
            RegionInfo::new("near-2", "Near 2", 0.5, (5, 10), "-"),
            RegionInfo::new("best", "Best", 0.9, (300, 400), "-"),
        ]);
        let ranked = catalog.rank(&Placement::Any).unwrap();
        assert_eq!(ids(&ranked), vec!["best", "near", "near-2", "far"]);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let catalog = RegionCatalog::seeded();
        let a = catalog.rank(&Placement::Any).unwrap();
        let b = catalog.rank(&Placement::Any).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_region_yields_exactly_one() {
        let ranked = RegionCatalog::seeded()
            .rank(&Placement::Single("ap-seoul-1".to_string()))
            .unwrap();
        assert_eq!(ids(&ranked), vec!["ap-seoul-1"]);
    }

    #[test]
    fn test_ordered_keeps_caller_order() {
        let placement = Placement::Ordered(vec![
            "ap-seoul-1".to_string(),
            "us-phoenix-1".to_string(),
            "ap-seoul-1".to_string(),
        ]);
        let ranked = RegionCatalog::seeded().rank(&placement).unwrap();
        assert_eq!(ids(&ranked), vec!["ap-seoul-1", "us-phoenix-1"]);
    }

    #[test]
    fn test_unknown_region_is_invalid_configuration() {
        let err = RegionCatalog::seeded()
            .rank(&Placement::Ordered(vec!["ap-tokyo-1".into(), "mars-1".into()]))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidConfiguration(msg) if msg.contains("mars-1")));
    }

    #[test]
    fn test_overrides_replace_and_append() {
        let catalog = RegionCatalog::seeded().with_overrides(vec![
            RegionInfo::new("ap-seoul-1", "Seoul", 0.99, (5, 15), "hours"),
            RegionInfo::new("eu-frankfurt-1", "Frankfurt", 0.5, (150, 200), "?"),
        ]);
        assert_eq!(catalog.regions().len(), 6);
        let ranked = catalog.rank(&Placement::Any).unwrap();
        assert_eq!(ranked[0].region, "ap-seoul-1");
    }
}
