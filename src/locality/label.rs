//! Bilingual label resolution.
//!
//! Labels are computed per query from the stored name pair and the label
//! settings passed in by the caller; they are never cached.

use super::types::{Region, Subregion};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Latin,
    Arabic,
}

impl Language {
    /// Parse a stored or submitted value, falling back to Latin.
    pub fn from_str_lossy(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "latin" => Ok(Self::Latin),
            "arabic" => Ok(Self::Arabic),
            other => Err(format!("Unknown language '{}'. Use 'latin' or 'arabic'.", other)),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latin => write!(f, "latin"),
            Self::Arabic => write!(f, "arabic"),
        }
    }
}

/// Label settings in effect for one query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelConfig {
    #[serde(default)]
    pub default_language: Language,
    /// Show "primary (secondary)" when both names exist and differ.
    #[serde(default)]
    pub bilingual: bool,
}

impl LabelConfig {
    pub fn new(default_language: Language, bilingual: bool) -> Self {
        Self { default_language, bilingual }
    }

    pub fn resolve(&self, latin: &str, arabic: &str) -> String {
        resolve_label(latin, arabic, self.default_language, self.bilingual)
    }
}

/// Compute the display string for a name pair.
///
/// The default language picks the base name, falling back to the other one
/// when empty. In bilingual mode a differing second name is appended in
/// parentheses, ordered by the default language.
pub fn resolve_label(latin: &str, arabic: &str, default_language: Language, bilingual: bool) -> String {
    let latin = latin.trim();
    let arabic = arabic.trim();

    let base = match default_language {
        Language::Arabic if !arabic.is_empty() => arabic,
        Language::Arabic => latin,
        Language::Latin if !latin.is_empty() => latin,
        Language::Latin => arabic,
    };

    if bilingual && !latin.is_empty() && !arabic.is_empty() && latin != arabic {
        return match default_language {
            Language::Arabic => format!("{} ({})", arabic, latin),
            Language::Latin => format!("{} ({})", latin, arabic),
        };
    }

    base.to_string()
}

/// Anything carrying a Latin/Arabic name pair.
pub trait BilingualName {
    fn name_latin(&self) -> &str;
    fn name_arabic(&self) -> &str;

    fn label(&self, config: &LabelConfig) -> String {
        config.resolve(self.name_latin(), self.name_arabic())
    }
}

impl BilingualName for Region {
    fn name_latin(&self) -> &str {
        &self.name_latin
    }
    fn name_arabic(&self) -> &str {
        &self.name_arabic
    }
}

impl BilingualName for Subregion {
    fn name_latin(&self) -> &str {
        &self.name_latin
    }
    fn name_arabic(&self) -> &str {
        &self.name_arabic
    }
}
