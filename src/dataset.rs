//! Output documents and the pieces they share.
//!
//! Records reference each other by generated identifier strings only;
//! a reference that could not be resolved is written as `null`.

use serde::{Deserialize, Serialize};

use crate::{
    error::FetchError,
    profile::CountryProfile,
    wikidata::{optional, Entity, EntityCache, EntitySource},
};

pub mod bih;
pub mod de;
pub mod eu;

/// Current UTC time, RFC 3339, whole seconds.
pub fn generated_at() -> String {
    let now = time::OffsetDateTime::now_utc();
    let now = now.replace_nanosecond(0).unwrap_or(now);
    now.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub state_id: String,
    pub name: String,
    pub iso2: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso3: Option<String>,
    pub wikidata_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl StateRecord {
    pub fn from_profile(profile: &CountryProfile) -> Self {
        let state = &profile.state;
        StateRecord {
            state_id: state.state_id.clone(),
            name: state.name.clone(),
            iso2: state.iso2.clone(),
            iso3: state.iso3.clone(),
            wikidata_id: state.id.clone(),
            latitude: state.latitude,
            longitude: state.longitude,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub region_id: String,
    pub state_id: String,
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub wikidata_id: String,
    pub parent_region_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_km2: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl From<Option<&Entity>> for Coordinates {
    fn from(entity: Option<&Entity>) -> Self {
        Coordinates {
            latitude: entity.and_then(Entity::latitude),
            longitude: entity.and_then(Entity::longitude),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MunicipalityRef {
    pub wikidata_id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionRef {
    pub region_id: Option<String>,
    pub wikidata_id: Option<String>,
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRef {
    pub region_id: Option<String>,
    pub wikidata_id: Option<String>,
    pub code: Option<String>,
    pub name: Option<String>,
}

/// Best label of `id`; a missing entity has no label.
pub async fn label<S: EntitySource>(
    cache: &mut EntityCache<S>,
    profile: &CountryProfile,
    id: Option<&str>,
) -> Result<Option<String>, FetchError> {
    let Some(id) = id else {
        return Ok(None);
    };
    Ok(optional(cache.best_label(id, &profile.languages).await)?.flatten())
}

pub async fn region_ref<S: EntitySource>(
    cache: &mut EntityCache<S>,
    profile: &CountryProfile,
    region: Option<&str>,
) -> Result<RegionRef, FetchError> {
    let class = region.and_then(|id| profile.region_class(id));
    // Per-subdivision kind overrides only apply to the regions payload; a
    // first-level region referenced from a city is always the table-wide kind.
    let kind = match region {
        Some(id) if profile.is_first_level(id) => Some(profile.first_level_kind.clone()),
        _ => class.as_ref().map(|c| c.kind.clone()),
    };
    Ok(RegionRef {
        region_id: class.as_ref().map(|c| c.region_id.clone()),
        wikidata_id: region.map(str::to_owned),
        code: class.as_ref().map(|c| c.code.clone()),
        kind,
        name: label(cache, profile, region).await?,
    })
}

pub async fn entity_ref<S: EntitySource>(
    cache: &mut EntityCache<S>,
    profile: &CountryProfile,
    entity: Option<&str>,
) -> Result<EntityRef, FetchError> {
    let code = entity.and_then(|id| profile.first_level_code(id));
    Ok(EntityRef {
        region_id: code.map(|code| profile.region_id(&[code])),
        wikidata_id: entity.map(str::to_owned),
        code: code.map(str::to_owned),
        name: label(cache, profile, entity).await?,
    })
}

/// One record per first-level and second-level subdivision of the profile,
/// in table order, with coordinates from the knowledge base when known.
pub async fn reference_regions<S: EntitySource>(
    cache: &mut EntityCache<S>,
    profile: &CountryProfile,
) -> Result<Vec<RegionRecord>, FetchError> {
    cache.ensure(profile.reference_ids()).await?;

    let tables = profile.first_level.iter().chain(profile.second_level.iter());
    let mut regions = Vec::with_capacity(profile.first_level.len() + profile.second_level.len());
    for (id, sub) in tables {
        let Some(class) = profile.region_class(id) else {
            continue;
        };
        let parent_region_id = sub.parent
            .as_deref()
            .and_then(|parent| profile.region_class(parent))
            .map(|parent| parent.region_id);
        let coordinates = Coordinates::from(cache.cached(id));
        regions.push(RegionRecord {
            region_id: class.region_id,
            state_id: profile.state.state_id.clone(),
            name: sub.name.clone(),
            code: class.code,
            kind: class.kind,
            wikidata_id: id.clone(),
            parent_region_id,
            seat: sub.seat.clone(),
            population: None,
            area_km2: None,
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
        });
    }
    Ok(regions)
}
