//! Locality subsystem for dz-localities.
//!
//! Imports the wilaya/commune XML feed, keeps the current hierarchy in a
//! versioned store behind a TTL cache, and resolves bilingual labels.

pub mod cache;
pub mod code;
pub mod importer;
pub mod label;
pub mod normalizer;
pub mod service;
pub mod store;
pub mod types;
mod xml;

pub use cache::{CacheStats, LocalityCache};
pub use code::{parse_identifier, region_code};
pub use importer::{ImportOutcome, ImportSource, Importer, SourceLocations, SourceOrigin};
pub use label::{resolve_label, BilingualName, LabelConfig, Language};
pub use normalizer::XmlSchema;
pub use service::{
    LabelOption, Localities, LocalityReader, LocalityWriter, RegionOption, SubregionLookup,
};
pub use store::{LocalityStore, Snapshot};
pub use types::{Hierarchy, ImportCounts, Region, Subregion, SubregionMap};
