//! XML feed → validated [`Hierarchy`].
//!
//! Malformed rows are dropped one by one; only unreadable markup or a
//! missing top-level section aborts the parse.

use super::types::{Hierarchy, HierarchyBuilder, ImportCounts, Region, Subregion};
use super::xml::{self, Element};
use crate::error::{LocalityError, Result};
use std::fmt;
use std::str::FromStr;

/// Element names used by a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XmlSchema {
    pub regions: &'static str,
    pub region: &'static str,
    pub region_id: &'static str,
    pub region_latin: &'static str,
    pub region_arabic: &'static str,
    pub subregions: &'static str,
    pub subregion: &'static str,
    pub subregion_id: &'static str,
    pub subregion_parent: &'static str,
    pub subregion_latin: &'static str,
    pub subregion_arabic: &'static str,
}

impl XmlSchema {
    /// The wilaya/commune feed shipped in `data/algeria-cities.xml`.
    pub const ALGERIA: XmlSchema = XmlSchema {
        regions: "wilayas",
        region: "wilaya",
        region_id: "wilaya_id",
        region_latin: "wilaya_name_latin",
        region_arabic: "wilaya_name_arabic",
        subregions: "communes",
        subregion: "commune",
        subregion_id: "commune_id",
        subregion_parent: "wilaya_id",
        subregion_latin: "commune_name_latin",
        subregion_arabic: "commune_name_arabic",
    };

    pub const GENERIC: XmlSchema = XmlSchema {
        regions: "regions",
        region: "region",
        region_id: "id",
        region_latin: "name_latin",
        region_arabic: "name_arabic",
        subregions: "subregions",
        subregion: "subregion",
        subregion_id: "id",
        subregion_parent: "region_id",
        subregion_latin: "name_latin",
        subregion_arabic: "name_arabic",
    };
}

impl Default for XmlSchema {
    fn default() -> Self {
        Self::ALGERIA
    }
}

impl FromStr for XmlSchema {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "algeria" | "wilaya" | "dz" => Ok(Self::ALGERIA),
            "generic" | "region" => Ok(Self::GENERIC),
            _ => Err(format!("Unknown schema '{}'. Use 'algeria' or 'generic'.", s)),
        }
    }
}

impl fmt::Display for XmlSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.regions, self.subregions)
    }
}

/// Result of a successful parse.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub hierarchy: Hierarchy,
    pub counts: ImportCounts,
    /// Rows dropped for a bad id or missing names.
    pub skipped: usize,
}

/// Parse raw XML bytes into a hierarchy.
pub fn parse(bytes: &[u8], schema: &XmlSchema) -> Result<Normalized> {
    let root = xml::parse_document(bytes).map_err(LocalityError::Parse)?;

    // A section without child elements counts as missing.
    let section = |name: &str| root.child(name).filter(|el| !el.children.is_empty());
    let (Some(regions), Some(subregions)) = (section(schema.regions), section(schema.subregions))
    else {
        return Err(LocalityError::Structure {
            regions: schema.regions,
            subregions: schema.subregions,
        });
    };

    let mut builder = HierarchyBuilder::new();
    let mut skipped = 0;

    for node in regions.children_named(schema.region) {
        match region_from(node, schema) {
            Some(region) => builder.push_region(region),
            None => skipped += 1,
        }
    }

    for node in subregions.children_named(schema.subregion) {
        match subregion_from(node, schema) {
            Some(sub) => builder.push_subregion(sub),
            None => skipped += 1,
        }
    }

    let hierarchy = builder.build();
    let counts = hierarchy.counts();
    Ok(Normalized { hierarchy, counts, skipped })
}

fn region_from(node: &Element, schema: &XmlSchema) -> Option<Region> {
    let id = positive_id(node.child_text(schema.region_id))?;
    let (name_latin, name_arabic) = names(node, schema.region_latin, schema.region_arabic)?;
    Some(Region { id, name_latin, name_arabic })
}

fn subregion_from(node: &Element, schema: &XmlSchema) -> Option<Subregion> {
    let id = positive_id(node.child_text(schema.subregion_id))?;
    let region_id = positive_id(node.child_text(schema.subregion_parent))?;
    let (name_latin, name_arabic) = names(node, schema.subregion_latin, schema.subregion_arabic)?;
    Some(Subregion { id, region_id, name_latin, name_arabic })
}

/// Trimmed name pair, or None when both are empty.
fn names(node: &Element, latin: &str, arabic: &str) -> Option<(String, String)> {
    let latin = node.child_text(latin).trim();
    let arabic = node.child_text(arabic).trim();
    if latin.is_empty() && arabic.is_empty() {
        return None;
    }
    Some((latin.to_string(), arabic.to_string()))
}

fn positive_id(raw: &str) -> Option<u32> {
    u32::try_from(leading_int(raw)).ok().filter(|&id| id > 0)
}

/// Lenient integer read: leading whitespace, optional sign, then as many
/// digits as present. Anything unparsable reads as 0.
pub(crate) fn leading_int(raw: &str) -> i64 {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        value = value.saturating_mul(10).saturating_add(i64::from(b - b'0'));
    }
    if negative {
        -value
    } else {
        value
    }
}
