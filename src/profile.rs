//! Per-country reference tables.
//!
//! Everything the hierarchy walk cannot discover generically from the
//! located-in graph lives here: the state identifier, the fixed first-level
//! and second-level subdivision tables, which type identifiers mark
//! municipality-like places, and label language preferences. Profiles are
//! plain TOML; the built-in ones are compiled in from `profiles/`.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::DatasetError;

const BIH_PROFILE: &str = include_str!("../profiles/bih.toml");
const DE_PROFILE: &str = include_str!("../profiles/de.toml");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Country {
    BosniaAndHerzegovina,
    Germany,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountryProfile {
    /// Fallback prefix for generated identifiers, e.g. `bih`.
    pub prefix: String,
    /// Label language preference, most preferred first.
    pub languages: Vec<String>,
    pub state: StateInfo,
    /// Municipality-like type identifiers mapped to the kind they denote.
    #[serde(default)]
    pub municipality_types: IndexMap<String, String>,
    /// Type identifier of second-level subdivisions (cantons, Regierungsbezirke).
    pub second_level_type: Option<String>,
    /// Entity to assume when the region resolves to it and no entity was found.
    pub entity_fallback: Option<String>,
    pub first_level_kind: String,
    pub second_level_kind: String,
    #[serde(default)]
    pub first_level: IndexMap<String, Subdivision>,
    #[serde(default)]
    pub second_level: IndexMap<String, Subdivision>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateInfo {
    /// Knowledge-base identifier of the state.
    pub id: String,
    /// Identifier used in the output document, e.g. `bih`.
    pub state_id: String,
    pub name: String,
    pub iso2: String,
    pub iso3: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subdivision {
    pub code: String,
    pub name: String,
    pub seat: Option<String>,
    /// First-level identifier this second-level subdivision belongs to.
    pub parent: Option<String>,
    /// Overrides the table-wide kind, e.g. `district` for Brčko.
    pub kind: Option<String>,
}

/// Output-facing classification of a region identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionClass {
    pub region_id: String,
    pub code: String,
    pub kind: String,
}

impl CountryProfile {
    pub fn builtin(country: Country) -> Result<Self, DatasetError> {
        match country {
            Country::BosniaAndHerzegovina => Self::from_toml(BIH_PROFILE),
            Country::Germany => Self::from_toml(DE_PROFILE),
        }
    }

    pub fn from_toml(source: &str) -> Result<Self, DatasetError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let source = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml(&source)
    }

    /// Built-in profile unless `path` names a replacement file.
    pub fn builtin_or_load(country: Country, path: Option<&Path>) -> Result<Self, DatasetError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(country),
        }
    }

    pub fn is_first_level(&self, id: &str) -> bool {
        self.first_level.contains_key(id)
    }

    pub fn is_state(&self, id: &str) -> bool {
        self.state.id == id
    }

    pub fn is_municipality_type(&self, type_id: &str) -> bool {
        self.municipality_types.contains_key(type_id)
    }

    pub fn is_second_level_type(&self, type_id: &str) -> bool {
        self.second_level_type.as_deref() == Some(type_id)
    }

    /// Kind of the first municipality-like type in `types`, in profile order.
    pub fn municipality_kind<'a, I>(&self, types: I) -> Option<&str>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let types: Vec<&String> = types.into_iter().collect();
        self.municipality_types
            .iter()
            .find(|(type_id, _)| types.contains(type_id))
            .map(|(_, kind)| kind.as_str())
    }

    pub fn first_level_code(&self, id: &str) -> Option<&str> {
        self.first_level.get(id).map(|sub| sub.code.as_str())
    }

    /// `{prefix}-{code}` for first-level subdivisions,
    /// `{prefix}-{parent code}-{code}` for second-level ones.
    pub fn region_class(&self, id: &str) -> Option<RegionClass> {
        if let Some(sub) = self.second_level.get(id) {
            let region_id = match sub.parent.as_deref().and_then(|p| self.first_level_code(p)) {
                Some(parent_code) => self.region_id(&[parent_code, &sub.code]),
                None => self.region_id(&[&sub.code]),
            };
            return Some(RegionClass {
                region_id,
                code: sub.code.clone(),
                kind: sub.kind.clone().unwrap_or_else(|| self.second_level_kind.clone()),
            });
        }
        self.first_level.get(id).map(|sub| RegionClass {
            region_id: self.region_id(&[&sub.code]),
            code: sub.code.clone(),
            kind: sub.kind.clone().unwrap_or_else(|| self.first_level_kind.clone()),
        })
    }

    /// Joins the prefix and the lowercased parts with hyphens.
    pub fn region_id(&self, parts: &[&str]) -> String {
        std::iter::once(self.prefix.to_lowercase())
            .chain(parts.iter().map(|part| crate::slug::slugify(part)))
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Every reference identifier a dataset run should prefetch.
    pub fn reference_ids(&self) -> impl Iterator<Item = &String> {
        self.first_level
            .keys()
            .chain(self.second_level.keys())
            .chain(std::iter::once(&self.state.id))
    }
}
