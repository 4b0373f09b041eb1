//! Reader/writer interfaces and the `Localities` composition root.

use super::cache::{CacheStats, LocalityCache};
use super::code::{parse_identifier, region_code};
use super::importer::{ImportOutcome, ImportSource, Importer};
use super::label::{BilingualName, LabelConfig};
use super::store::LocalityStore;
use super::types::{ImportCounts, Region, Subregion, SubregionMap};
use crate::error::{LocalityError, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// A selectable region: composite code plus resolved label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionOption {
    pub code: String,
    pub label: String,
}

/// A selectable subregion: id plus resolved label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelOption {
    pub id: u32,
    pub label: String,
}

/// Answer to an identifier lookup. Unknown identifiers and empty regions
/// are answers carrying a message, not failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SubregionLookup {
    Found { success: bool, options: Vec<LabelOption> },
    Missing { success: bool, message: String },
}

/// Read side consumed by checkout/shipping integrations.
pub trait LocalityReader {
    fn regions(&self) -> Arc<Vec<Region>>;
    fn subregions(&self) -> Arc<SubregionMap>;
    /// Empty for unknown or childless regions.
    fn subregions_of(&self, region_id: u32) -> Vec<Subregion>;
    fn counts(&self) -> ImportCounts;
    /// Prefix used in composite region codes ("DZ").
    fn code_prefix(&self) -> &str;

    fn region_options(&self, labels: &LabelConfig) -> Vec<RegionOption> {
        self.regions()
            .iter()
            .map(|r| RegionOption {
                code: region_code(self.code_prefix(), r.id),
                label: r.label(labels),
            })
            .collect()
    }

    /// Resolve an identifier ("DZ-07" or "7") to labelled subregion options.
    fn subregion_options(&self, identifier: &str, labels: &LabelConfig) -> Result<Vec<LabelOption>> {
        let region_id = parse_identifier(identifier)
            .ok_or_else(|| LocalityError::InvalidIdentifier("Invalid region.".into()))?;

        let subs = self.subregions_of(region_id);
        if subs.is_empty() {
            return Err(LocalityError::NotFound("No subregions found for selected region.".into()));
        }

        Ok(subs
            .iter()
            .map(|s| LabelOption { id: s.id, label: s.label(labels) })
            .collect())
    }

    /// Like `subregion_options`, with misses folded into the answer.
    fn lookup_subregions(&self, identifier: &str, labels: &LabelConfig) -> Result<SubregionLookup> {
        match self.subregion_options(identifier, labels) {
            Ok(options) => Ok(SubregionLookup::Found { success: true, options }),
            Err(e) if e.is_not_found() => {
                Ok(SubregionLookup::Missing { success: false, message: e.to_string() })
            }
            Err(e) => Err(e),
        }
    }
}

/// Mutating side, triggered by operators.
pub trait LocalityWriter {
    fn import(&self, source: Option<ImportSource>) -> Result<ImportOutcome>;
    fn delete(&self) -> Result<()>;
}

/// Store + cache + importer, built once at start and shared by `Arc`.
pub struct Localities {
    store: Arc<LocalityStore>,
    cache: LocalityCache,
    importer: Importer,
    code_prefix: String,
}

impl Localities {
    pub fn new(store: Arc<LocalityStore>, cache: LocalityCache, importer: Importer) -> Self {
        Self { store, cache, importer, code_prefix: "DZ".into() }
    }

    pub fn with_code_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.code_prefix = prefix.into();
        self
    }

    pub fn store(&self) -> &LocalityStore {
        &self.store
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop cached collections.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    /// Called after label settings change. Labels are resolved per query
    /// from raw names, so nothing cached depends on them; the flush is kept
    /// so a future label cache is covered.
    pub fn on_label_settings_changed(&self, labels: &LabelConfig) {
        info!(language = %labels.default_language, bilingual = labels.bilingual, "label settings changed");
        self.cache.invalidate();
    }

    /// Import the bundled dataset when the store holds no regions.
    pub fn seed_if_empty(&self) -> Result<Option<ImportOutcome>> {
        if !self.store.regions().is_empty() {
            return Ok(None);
        }
        let outcome = self.importer.import_bundled(&self.store)?;
        self.cache.invalidate();
        Ok(Some(outcome))
    }

    /// Pretty JSON of the whole dataset, Unicode left unescaped.
    pub fn export_json(&self) -> Result<String> {
        let regions = self.regions();
        let subregions = self.subregions();
        let doc = ExportDocument {
            regions: RegionsView(&regions),
            subregions: SubregionsView(&subregions),
            counts: ExportCounts::from(self.counts()),
        };
        serde_json::to_string_pretty(&doc).map_err(|e| LocalityError::Export(e.to_string()))
    }

    /// First `limit` regions and, for the first `limit` groups, their first
    /// `limit` subregions.
    pub fn debug_sample(&self, limit: usize) -> String {
        let mut out = vec![format!("Regions (first {}):", limit)];
        for r in self.regions().iter().take(limit) {
            out.push(format!("  #{}: {} / {}", r.id, r.name_latin, r.name_arabic));
        }

        out.push(String::new());
        out.push(format!("Subregions (first {} by region):", limit));
        for (region_id, subs) in self.subregions().iter().take(limit) {
            out.push(format!("  Region #{}:", region_id));
            for s in subs.iter().take(limit) {
                out.push(format!("    - #{}: {} / {}", s.id, s.name_latin, s.name_arabic));
            }
        }
        out.join("\n")
    }
}

impl LocalityReader for Localities {
    fn regions(&self) -> Arc<Vec<Region>> {
        self.cache.regions()
    }

    fn subregions(&self) -> Arc<SubregionMap> {
        self.cache.subregions()
    }

    fn subregions_of(&self, region_id: u32) -> Vec<Subregion> {
        self.cache.subregions_of(region_id)
    }

    fn counts(&self) -> ImportCounts {
        self.store.counts()
    }

    fn code_prefix(&self) -> &str {
        &self.code_prefix
    }
}

impl LocalityWriter for Localities {
    fn import(&self, source: Option<ImportSource>) -> Result<ImportOutcome> {
        let outcome = self.importer.import(&self.store, source)?;
        self.cache.invalidate();
        Ok(outcome)
    }

    fn delete(&self) -> Result<()> {
        self.store.clear().inspect_err(|e| warn!(error = %e, "locality delete failed"))?;
        self.cache.invalidate();
        info!("locality data deleted");
        Ok(())
    }
}

// ─── Export document ─────────────────────────────────────────────

#[derive(Serialize)]
struct NamePair<'a> {
    latin: &'a str,
    arabic: &'a str,
}

#[derive(Serialize)]
struct ExportCounts {
    regions: usize,
    subregions: usize,
}

impl From<ImportCounts> for ExportCounts {
    fn from(c: ImportCounts) -> Self {
        Self { regions: c.regions, subregions: c.subregions }
    }
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    regions: RegionsView<'a>,
    subregions: SubregionsView<'a>,
    counts: ExportCounts,
}

// Maps keyed by id, written in stored order.
struct RegionsView<'a>(&'a [Region]);
struct SubregionsView<'a>(&'a SubregionMap);
struct GroupView<'a>(&'a [Subregion]);

impl Serialize for RegionsView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for r in self.0 {
            map.serialize_entry(&r.id, &NamePair { latin: &r.name_latin, arabic: &r.name_arabic })?;
        }
        map.end()
    }
}

impl Serialize for SubregionsView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (region_id, subs) in self.0 {
            map.serialize_entry(region_id, &GroupView(subs))?;
        }
        map.end()
    }
}

impl Serialize for GroupView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for s in self.0 {
            map.serialize_entry(&s.id, &NamePair { latin: &s.name_latin, arabic: &s.name_arabic })?;
        }
        map.end()
    }
}
