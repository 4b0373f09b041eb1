//! Runtime configuration and persisted label settings.
//!
//! Layout under the data directory (default ~/.dz-localities):
//!   localities.json             committed snapshot
//!   settings.json               label language settings
//!   uploads/algeria-cities.xml  operator fallback feed (optional)

use crate::locality::cache::DEFAULT_TTL_SECS;
use crate::locality::{
    Importer, LabelConfig, Language, Localities, LocalityCache, LocalityStore, SourceLocations,
    XmlSchema,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

pub const FEED_FILE_NAME: &str = "algeria-cities.xml";

/// Everything needed to build the subsystem at process start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub fallback_xml: Option<PathBuf>,
    pub bundled_xml: Option<PathBuf>,
    pub cache_ttl: chrono::Duration,
    pub country_code: String,
    pub schema: XmlSchema,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = Self::default_data_dir();
        Self {
            fallback_xml: Some(data_dir.join("uploads").join(FEED_FILE_NAME)),
            bundled_xml: Some(Self::bundled_dataset_path()),
            data_dir,
            cache_ttl: chrono::Duration::seconds(DEFAULT_TTL_SECS),
            country_code: "DZ".into(),
            schema: XmlSchema::ALGERIA,
        }
    }
}

impl AppConfig {
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dz-localities")
    }

    /// The dataset shipped in the crate's `data/` directory.
    pub fn bundled_dataset_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data").join(FEED_FILE_NAME)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("localities.json")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    /// Wire store, cache and importer together.
    pub fn build_localities(&self) -> Localities {
        let store = Arc::new(LocalityStore::open(self.store_path()));
        let cache = LocalityCache::with_ttl(Arc::clone(&store), self.cache_ttl);
        let importer = Importer::new(
            self.schema,
            SourceLocations {
                fallback: self.fallback_xml.clone(),
                bundled: self.bundled_xml.clone(),
            },
        );
        Localities::new(store, cache, importer).with_code_prefix(self.country_code.clone())
    }
}

// On-disk form; language kept as a string so bad values sanitize to Latin.
#[derive(Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    default_language: String,
    #[serde(default)]
    bilingual: bool,
}

/// Label settings backed by a JSON file.
pub struct LabelSettings {
    path: Option<PathBuf>,
    current: RwLock<LabelConfig>,
}

impl LabelSettings {
    /// Load from `path`; a missing or unreadable file yields defaults.
    pub fn load_from(path: PathBuf) -> Self {
        let current = Self::read_file(&path).unwrap_or_default();
        Self { path: Some(path), current: RwLock::new(current) }
    }

    /// Settings that are never written to disk.
    pub fn in_memory(config: LabelConfig) -> Self {
        Self { path: None, current: RwLock::new(config) }
    }

    fn read_file(path: &Path) -> Option<LabelConfig> {
        let data = fs::read_to_string(path).ok()?;
        let file: SettingsFile = serde_json::from_str(&data).ok()?;
        Some(LabelConfig::new(Language::from_str_lossy(&file.default_language), file.bilingual))
    }

    pub fn get(&self) -> LabelConfig {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the settings and persist them. Returns true when they changed.
    pub fn set(&self, config: LabelConfig) -> std::io::Result<bool> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if *current == config {
            return Ok(false);
        }
        if let Some(path) = &self.path {
            Self::persist(path, &config)?;
        }
        *current = config;
        Ok(true)
    }

    fn persist(path: &Path, config: &LabelConfig) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = SettingsFile {
            default_language: config.default_language.to_string(),
            bilingual: config.bilingual,
        };
        let json = serde_json::to_string_pretty(&file).map_err(|e| {
            warn!(error = %e, "could not encode label settings");
            std::io::Error::new(std::io::ErrorKind::InvalidData, e)
        })?;
        fs::write(path, json)
    }
}
