//! Import orchestrator. Resolves the source of truth and drives the
//! normalizer and the store.
//!
//! Source flow:  explicit upload → well-known fallback file → bundled dataset → error

use super::normalizer::{self, Normalized, XmlSchema};
use super::store::LocalityStore;
use super::types::ImportCounts;
use crate::error::{LocalityError, Result};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A file handed in explicitly, e.g. through an upload form.
#[derive(Debug, Clone)]
pub struct ImportSource {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImportSource {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { file_name: file_name.into(), bytes }
    }

    /// Read a file from disk as an explicit source.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .map_err(|e| LocalityError::File(format!("Cannot read {}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { file_name, bytes })
    }

    /// Extension must be `.xml` and the payload must start with markup.
    fn validate(&self) -> Result<()> {
        let has_xml_ext = Path::new(&self.file_name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        if !has_xml_ext || !looks_like_markup(&self.bytes) {
            return Err(LocalityError::File("Uploaded file must be a valid XML file.".into()));
        }
        Ok(())
    }
}

fn looks_like_markup(bytes: &[u8]) -> bool {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'<')
}

/// Where an import's bytes came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum SourceOrigin {
    Upload(String),
    Fallback(PathBuf),
    Bundled(PathBuf),
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload(name) => write!(f, "upload '{}'", name),
            Self::Fallback(path) => write!(f, "fallback {}", path.display()),
            Self::Bundled(path) => write!(f, "bundled {}", path.display()),
        }
    }
}

/// Well-known locations searched when no explicit source is given.
#[derive(Debug, Clone, Default)]
pub struct SourceLocations {
    /// Operator-managed file outside the package.
    pub fallback: Option<PathBuf>,
    /// Dataset shipped with the crate.
    pub bundled: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub counts: ImportCounts,
    pub source: SourceOrigin,
    pub skipped: usize,
}

pub struct Importer {
    schema: XmlSchema,
    locations: SourceLocations,
}

impl Importer {
    pub fn new(schema: XmlSchema, locations: SourceLocations) -> Self {
        Self { schema, locations }
    }

    pub fn schema(&self) -> &XmlSchema {
        &self.schema
    }

    pub fn locations(&self) -> &SourceLocations {
        &self.locations
    }

    /// Pick the first available source.
    pub fn resolve_source(&self, explicit: Option<ImportSource>) -> Result<(SourceOrigin, Vec<u8>)> {
        if let Some(source) = explicit {
            source.validate()?;
            return Ok((SourceOrigin::Upload(source.file_name), source.bytes));
        }

        if let Some(path) = &self.locations.fallback {
            match fs::read(path) {
                Ok(bytes) => return Ok((SourceOrigin::Fallback(path.clone()), bytes)),
                Err(e) => debug!(path = %path.display(), error = %e, "fallback XML unavailable"),
            }
        }

        self.bundled_source().ok_or_else(|| {
            LocalityError::File(format!(
                "No XML file provided, and neither {} nor the bundled dataset could be found.",
                self.locations
                    .fallback
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "the fallback file".into()),
            ))
        })
    }

    fn bundled_source(&self) -> Option<(SourceOrigin, Vec<u8>)> {
        let path = self.locations.bundled.as_ref()?;
        match fs::read(path) {
            Ok(bytes) => Some((SourceOrigin::Bundled(path.clone()), bytes)),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "bundled XML unavailable");
                None
            }
        }
    }

    /// Resolve, parse and commit. The store is untouched unless every step succeeds.
    pub fn import(&self, store: &LocalityStore, explicit: Option<ImportSource>) -> Result<ImportOutcome> {
        let (origin, bytes) = self.resolve_source(explicit)?;
        self.commit(store, origin, &bytes)
    }

    /// Import the bundled dataset only.
    pub fn import_bundled(&self, store: &LocalityStore) -> Result<ImportOutcome> {
        let (origin, bytes) = self
            .bundled_source()
            .ok_or_else(|| LocalityError::File("Bundled dataset not found.".into()))?;
        self.commit(store, origin, &bytes)
    }

    fn commit(&self, store: &LocalityStore, origin: SourceOrigin, bytes: &[u8]) -> Result<ImportOutcome> {
        let Normalized { hierarchy, counts, skipped } = normalizer::parse(bytes, &self.schema)
            .inspect_err(|e| warn!(source = %origin, error = %e, "locality import rejected"))?;

        if skipped > 0 {
            warn!(source = %origin, skipped, "dropped malformed locality rows");
        }

        store.replace_all(hierarchy, counts)?;
        info!(source = %origin, regions = counts.regions, subregions = counts.subregions, "locality import completed");
        Ok(ImportOutcome { counts, source: origin, skipped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FEED: &str = "<algeria><wilayas><wilaya><wilaya_id>1</wilaya_id><wilaya_name_latin>Adrar</wilaya_name_latin><wilaya_name_arabic>أدرار</wilaya_name_arabic></wilaya></wilayas><communes><commune><commune_id>101</commune_id><wilaya_id>1</wilaya_id><commune_name_latin>Adrar</commune_name_latin><commune_name_arabic>أدرار</commune_name_arabic></commune></communes></algeria>";

    const OTHER_FEED: &str = "<algeria><wilayas><wilaya><wilaya_id>2</wilaya_id><wilaya_name_latin>Chlef</wilaya_name_latin><wilaya_name_arabic>الشلف</wilaya_name_arabic></wilaya><wilaya><wilaya_id>3</wilaya_id><wilaya_name_latin>Laghouat</wilaya_name_latin><wilaya_name_arabic>الأغواط</wilaya_name_arabic></wilaya></wilayas><communes><commune><commune_id>201</commune_id><wilaya_id>2</wilaya_id><commune_name_latin>Chlef</commune_name_latin><commune_name_arabic>الشلف</commune_name_arabic></commune></communes></algeria>";

    fn importer(dir: &TempDir, fallback: Option<&str>, bundled: Option<&str>) -> Importer {
        let mut locations = SourceLocations::default();
        if let Some(content) = fallback {
            let p = dir.path().join("uploads-algeria-cities.xml");
            fs::write(&p, content).unwrap();
            locations.fallback = Some(p);
        } else {
            locations.fallback = Some(dir.path().join("missing.xml"));
        }
        if let Some(content) = bundled {
            let p = dir.path().join("bundled.xml");
            fs::write(&p, content).unwrap();
            locations.bundled = Some(p);
        }
        Importer::new(XmlSchema::ALGERIA, locations)
    }

    #[test]
    fn test_explicit_source_wins() {
        let dir = TempDir::new().unwrap();
        let imp = importer(&dir, Some(OTHER_FEED), Some(OTHER_FEED));
        let store = LocalityStore::in_memory();

        let out = imp.import(&store, Some(ImportSource::new("cities.xml", FEED.into()))).unwrap();
        assert_eq!(out.source, SourceOrigin::Upload("cities.xml".into()));
        assert_eq!(out.counts, ImportCounts { regions: 1, subregions: 1 });
    }

    #[test]
    fn test_fallback_before_bundled() {
        let dir = TempDir::new().unwrap();
        let imp = importer(&dir, Some(OTHER_FEED), Some(FEED));
        let store = LocalityStore::in_memory();

        let out = imp.import(&store, None).unwrap();
        assert!(matches!(out.source, SourceOrigin::Fallback(_)));
        assert_eq!(store.counts().regions, 2);
    }

    #[test]
    fn test_bundled_when_fallback_missing() {
        let dir = TempDir::new().unwrap();
        let imp = importer(&dir, None, Some(FEED));
        let store = LocalityStore::in_memory();

        let out = imp.import(&store, None).unwrap();
        assert!(matches!(out.source, SourceOrigin::Bundled(_)));
    }

    #[test]
    fn test_no_source_is_file_error() {
        let dir = TempDir::new().unwrap();
        let imp = importer(&dir, None, None);
        let err = imp.import(&LocalityStore::in_memory(), None).unwrap_err();
        assert!(matches!(err, LocalityError::File(_)));
    }

    #[test]
    fn test_wrong_extension_is_file_error() {
        let dir = TempDir::new().unwrap();
        let imp = importer(&dir, None, Some(FEED));
        let err = imp
            .import(&LocalityStore::in_memory(), Some(ImportSource::new("cities.csv", FEED.into())))
            .unwrap_err();
        assert!(matches!(err, LocalityError::File(_)));
    }

    #[test]
    fn test_non_markup_payload_is_file_error() {
        let dir = TempDir::new().unwrap();
        let imp = importer(&dir, None, None);
        let err = imp
            .import(&LocalityStore::in_memory(), Some(ImportSource::new("cities.XML", b"id,name".to_vec())))
            .unwrap_err();
        assert!(matches!(err, LocalityError::File(_)));
    }

    #[test]
    fn test_failed_parse_leaves_store_untouched() {
        let dir = TempDir::new().unwrap();
        let imp = importer(&dir, None, None);
        let store = LocalityStore::in_memory();
        imp.import(&store, Some(ImportSource::new("a.xml", FEED.into()))).unwrap();

        let broken = imp.import(&store, Some(ImportSource::new("b.xml", b"<algeria><wilayas>".to_vec())));
        assert!(matches!(broken, Err(LocalityError::Parse(_))));

        let missing = imp.import(&store, Some(ImportSource::new("c.xml", b"<algeria/>".to_vec())));
        assert!(matches!(missing, Err(LocalityError::Structure { .. })));

        let emptied = imp.import(
            &store,
            Some(ImportSource::new("d.xml", b"<algeria><wilayas></wilayas><communes/></algeria>".to_vec())),
        );
        assert!(matches!(emptied, Err(LocalityError::Structure { .. })));

        assert_eq!(store.counts(), ImportCounts { regions: 1, subregions: 1 });
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn test_reimport_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let imp = importer(&dir, None, None);
        let store = LocalityStore::in_memory();

        imp.import(&store, Some(ImportSource::new("a.xml", FEED.into()))).unwrap();
        let first = store.snapshot();
        imp.import(&store, Some(ImportSource::new("a.xml", FEED.into()))).unwrap();
        let second = store.snapshot();

        assert_eq!(first.hierarchy, second.hierarchy);
        assert_eq!(first.counts, second.counts);
    }

    #[test]
    fn test_import_bundled_ignores_fallback() {
        let dir = TempDir::new().unwrap();
        let imp = importer(&dir, Some(OTHER_FEED), Some(FEED));
        let store = LocalityStore::in_memory();

        let out = imp.import_bundled(&store).unwrap();
        assert!(matches!(out.source, SourceOrigin::Bundled(_)));
        assert_eq!(store.counts().regions, 1);
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("feed.xml");
        fs::write(&p, FEED).unwrap();
        let src = ImportSource::from_path(&p).unwrap();
        assert_eq!(src.file_name, "feed.xml");
        assert!(ImportSource::from_path(&dir.path().join("nope.xml")).is_err());
    }
}
