//! Core types for the locality hierarchy.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A top-level locality (a wilaya in the bundled dataset).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: u32,
    pub name_latin: String,
    pub name_arabic: String,
}

/// A locality inside a region (a commune). `id` is unique within its
/// parent group only; `region_id` may point at a region that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subregion {
    pub id: u32,
    pub region_id: u32,
    pub name_latin: String,
    pub name_arabic: String,
}

/// Region id → subregions of that region, in parsed order.
pub type SubregionMap = BTreeMap<u32, Vec<Subregion>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCounts {
    pub regions: usize,
    pub subregions: usize,
}

/// The two-level structure produced by one import.
///
/// Both collections sit behind `Arc` so the store, the cache and any
/// in-flight reader can share one copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hierarchy {
    regions: Arc<Vec<Region>>,
    subregions: Arc<SubregionMap>,
}

impl Hierarchy {
    pub fn regions(&self) -> &Arc<Vec<Region>> {
        &self.regions
    }

    pub fn subregions(&self) -> &Arc<SubregionMap> {
        &self.subregions
    }

    /// Subregions of one region; empty for unknown or childless ids.
    pub fn subregions_of(&self, region_id: u32) -> &[Subregion] {
        self.subregions
            .get(&region_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn region(&self, id: u32) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn counts(&self) -> ImportCounts {
        ImportCounts {
            regions: self.regions.len(),
            subregions: self.subregions.values().map(Vec::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty() && self.subregions.is_empty()
    }
}

/// Accumulates parsed rows into a [`Hierarchy`].
///
/// A repeated id keeps the slot of its first occurrence and takes the
/// names of the latest one.
#[derive(Default)]
pub struct HierarchyBuilder {
    regions: Vec<Region>,
    region_slots: HashMap<u32, usize>,
    subregions: SubregionMap,
    subregion_slots: HashMap<(u32, u32), usize>,
}

impl HierarchyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_region(&mut self, region: Region) {
        match self.region_slots.get(&region.id) {
            Some(&slot) => self.regions[slot] = region,
            None => {
                self.region_slots.insert(region.id, self.regions.len());
                self.regions.push(region);
            }
        }
    }

    pub fn push_subregion(&mut self, subregion: Subregion) {
        let key = (subregion.region_id, subregion.id);
        let group = self.subregions.entry(subregion.region_id).or_default();
        match self.subregion_slots.get(&key) {
            Some(&slot) => group[slot] = subregion,
            None => {
                self.subregion_slots.insert(key, group.len());
                group.push(subregion);
            }
        }
    }

    pub fn build(self) -> Hierarchy {
        Hierarchy {
            regions: Arc::new(self.regions),
            subregions: Arc::new(self.subregions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(id: u32, latin: &str) -> Region {
        Region { id, name_latin: latin.into(), name_arabic: String::new() }
    }

    fn commune(id: u32, region_id: u32, latin: &str) -> Subregion {
        Subregion { id, region_id, name_latin: latin.into(), name_arabic: String::new() }
    }

    #[test]
    fn test_duplicate_region_keeps_first_slot() {
        let mut b = HierarchyBuilder::new();
        b.push_region(region(16, "Alger"));
        b.push_region(region(31, "Oran"));
        b.push_region(region(16, "Algiers"));
        let h = b.build();

        let names: Vec<_> = h.regions().iter().map(|r| r.name_latin.as_str()).collect();
        assert_eq!(names, vec!["Algiers", "Oran"]);
    }

    #[test]
    fn test_subregion_ids_scoped_to_parent() {
        let mut b = HierarchyBuilder::new();
        b.push_subregion(commune(1, 16, "Alger Centre"));
        b.push_subregion(commune(1, 31, "Oran"));
        let h = b.build();

        assert_eq!(h.subregions_of(16).len(), 1);
        assert_eq!(h.subregions_of(31).len(), 1);
        assert_eq!(h.counts(), ImportCounts { regions: 0, subregions: 2 });
    }

    #[test]
    fn test_subregions_of_unknown_region_is_empty() {
        let h = HierarchyBuilder::new().build();
        assert!(h.subregions_of(99).is_empty());
        assert!(h.is_empty());
    }

    #[test]
    fn test_parsed_order_within_group() {
        let mut b = HierarchyBuilder::new();
        b.push_subregion(commune(7, 1, "Tamest"));
        b.push_subregion(commune(2, 1, "Adrar"));
        b.push_subregion(commune(7, 1, "Tamest (new)"));
        let h = b.build();

        let ids: Vec<_> = h.subregions_of(1).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![7, 2]);
        assert_eq!(h.subregions_of(1)[0].name_latin, "Tamest (new)");
    }
}
