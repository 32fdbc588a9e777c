//! EU-wide geography from the GISCO layers.
//!
//! States are the EU members of the countries layer, regions are their NUTS
//! level 2 and 3 units, cities are Urban Audit points. A previously written
//! Bosnia and Herzegovina document is merged in when one is available.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::DatasetError,
    gisco::{
        schema::{CityProperties, CountryProperties, FeatureCollection, NutsProperties},
        GiscoClient, COUNTRIES_URL, NUTS_URL, URBAN_AUDIT_CITIES_URL,
    },
    slug::{last_chars, slugify, truncate_chars},
};

use super::{bih::BihDataset, generated_at};

const EU_MEMBER: &str = "T";
const MAX_CITY_CODE: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EuDataset {
    pub metadata: Metadata,
    pub states: Vec<EuState>,
    pub regions: Vec<EuRegion>,
    pub cities: Vec<EuCity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub generated_at: String,
    pub source: Sources,
    pub counts: Counts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sources {
    pub countries: String,
    pub nuts: String,
    pub urban_audit_cities: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counts {
    pub states: usize,
    pub regions: usize,
    pub cities: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EuState {
    pub state_id: String,
    pub name: Option<String>,
    pub iso2: String,
    pub iso3: Option<String>,
    pub nuts_id: Option<String>,
    pub capital: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EuRegion {
    pub region_id: String,
    pub state_id: String,
    pub name: Option<String>,
    pub nuts_id: String,
    pub nuts_level: u8,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub parent_region_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EuCity {
    pub city_id: String,
    pub name: String,
    pub state_id: String,
    pub country_code: String,
    pub slug: String,
    pub city_code: String,
    pub ura_code: Option<String>,
    pub category: Option<String>,
    pub nuts3_id: Option<String>,
    pub nuts2_id: Option<String>,
    pub region_id: Option<String>,
    pub functional_area_code: Option<String>,
    pub area_km2: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_official_city: bool,
}

struct NutsUnit {
    nuts_id: String,
    level: u8,
    name: Option<String>,
    country_code: String,
}

/// Downloads the three layers and builds the document.
pub async fn harvest(bih: Option<BihDataset>) -> Result<EuDataset, DatasetError> {
    let gisco = GiscoClient::new()?;
    info!("Fetching EU member states");
    let countries = gisco.countries().await?;
    info!("Fetching NUTS regions");
    let nuts = gisco.nuts().await?;
    info!("Fetching Urban Audit cities");
    let cities = gisco.urban_audit_cities().await?;
    Ok(build(countries, nuts, cities, bih))
}

/// Builds the document from downloaded layers. Pure; no I/O.
pub fn build(
    countries: FeatureCollection<CountryProperties>,
    nuts: FeatureCollection<NutsProperties>,
    cities: FeatureCollection<CityProperties>,
    bih: Option<BihDataset>,
) -> EuDataset {
    let members = member_states(countries);
    info!("{} EU member states", members.len());

    let mut states: Vec<EuState> = members.into_values().collect();
    let member_codes: HashSet<String> = states.iter().map(|state| state.iso2.clone()).collect();

    let (mut regions, region_index) = nuts_regions(nuts, &member_codes);
    info!("{} NUTS regions", regions.len());

    let mut cities = urban_cities(cities, &member_codes, &region_index);
    info!("{} Urban Audit cities", cities.len());

    if let Some(bih) = bih {
        info!("Merging Bosnia and Herzegovina dataset");
        merge_bih(bih, &mut states, &mut regions, &mut cities);
    }

    EuDataset {
        metadata: Metadata {
            generated_at: generated_at(),
            source: Sources {
                countries: COUNTRIES_URL.to_owned(),
                nuts: NUTS_URL.to_owned(),
                urban_audit_cities: URBAN_AUDIT_CITIES_URL.to_owned(),
            },
            counts: Counts {
                states: states.len(),
                regions: regions.len(),
                cities: cities.len(),
            },
        },
        states,
        regions,
        cities,
    }
}

/// EU members keyed (and so sorted) by ISO 3166-1 alpha-2 code.
fn member_states(countries: FeatureCollection<CountryProperties>) -> BTreeMap<String, EuState> {
    countries.features
        .into_iter()
        .map(|feature| feature.properties)
        .filter(|props| props.eu_stat.as_deref() == Some(EU_MEMBER))
        .filter_map(|props| {
            let iso2 = props.cntr_id.filter(|id| !id.is_empty())?;
            let state = EuState {
                state_id: iso2.to_lowercase(),
                name: props.name_engl.or(props.cntr_name),
                iso2: iso2.clone(),
                iso3: props.iso3_code,
                nuts_id: Some(iso2.clone()),
                capital: props.capt,
            };
            Some((iso2, state))
        })
        .collect()
}

/// NUTS 2 regions, then NUTS 3 regions, each sorted by country then id.
/// Also returns the NUTS id to region id index.
fn nuts_regions(
    nuts: FeatureCollection<NutsProperties>,
    members: &HashSet<String>,
) -> (Vec<EuRegion>, HashMap<String, String>) {
    let mut levels: [BTreeMap<(String, String), NutsUnit>; 2] = Default::default();
    for props in nuts.features.into_iter().map(|feature| feature.properties) {
        let (Some(nuts_id), Some(level), Some(country_code)) = (props.nuts_id, props.levl_code, props.cntr_code) else {
            continue;
        };
        if !(2..=3).contains(&level) || !members.contains(&country_code) {
            continue;
        }
        let unit = NutsUnit {
            name: props.name_latn.or(props.nuts_name),
            nuts_id: nuts_id.clone(),
            level,
            country_code: country_code.clone(),
        };
        levels[usize::from(level - 2)].insert((country_code, nuts_id), unit);
    }

    let mut regions = Vec::new();
    let mut index: HashMap<String, String> = HashMap::new();
    for unit in levels.into_iter().flat_map(BTreeMap::into_values) {
        let region_id = format!("{}-{}", unit.country_code, unit.nuts_id).to_lowercase();
        let parent_region_id = match unit.level {
            3 => parent_nuts(&unit.nuts_id).and_then(|parent| index.get(parent).cloned()),
            _ => None,
        };
        index.insert(unit.nuts_id.clone(), region_id.clone());
        regions.push(EuRegion {
            region_id,
            state_id: unit.country_code.to_lowercase(),
            name: unit.name,
            code: unit.nuts_id.clone(),
            nuts_id: unit.nuts_id,
            nuts_level: unit.level,
            kind: format!("nuts{}", unit.level),
            parent_region_id,
        });
    }
    (regions, index)
}

/// The NUTS 2 id containing a NUTS 3 id: its id minus the last character.
pub fn parent_nuts(nuts3_id: &str) -> Option<&str> {
    let mut chars = nuts3_id.char_indices();
    let (last, _) = chars.next_back()?;
    (nuts3_id.chars().count() > 2).then(|| &nuts3_id[..last])
}

fn urban_cities(
    cities: FeatureCollection<CityProperties>,
    members: &HashSet<String>,
    region_index: &HashMap<String, String>,
) -> Vec<EuCity> {
    let mut seen = HashSet::new();
    let mut output = Vec::new();
    for feature in cities.features {
        let point = feature.point();
        let props = feature.properties;
        let Some(country_code) = props.cntr_code.filter(|code| members.contains(code)) else {
            continue;
        };
        let name = props.urau_name.unwrap_or_default();
        let slug = slugify(&name);

        let base_id = format!("{}-{slug}", country_code.to_lowercase());
        let mut city_id = base_id.clone();
        if seen.contains(&city_id) {
            if let Some(code) = props.urau_code.as_deref().filter(|code| !code.is_empty()) {
                city_id = format!("{base_id}-{}", slugify(code));
            }
            let mut ordinal = 2;
            while seen.contains(&city_id) {
                city_id = format!("{base_id}-{ordinal}");
                ordinal += 1;
            }
        }
        seen.insert(city_id.clone());

        let fallback_code = match truncate_chars(&slug.replace('-', ""), MAX_CITY_CODE) {
            code if code.is_empty() => last_chars(&city_id, MAX_CITY_CODE),
            code => code,
        }
        .to_uppercase();
        let city_code = truncate_chars(props.urau_code.as_deref().unwrap_or(&fallback_code), MAX_CITY_CODE);

        let nuts3_id = props.nuts3_2021;
        output.push(EuCity {
            state_id: country_code.to_lowercase(),
            nuts2_id: nuts3_id.as_deref().and_then(parent_nuts).map(str::to_owned),
            region_id: nuts3_id.as_ref().and_then(|id| region_index.get(id).cloned()),
            nuts3_id,
            city_id,
            name,
            country_code,
            slug,
            city_code,
            ura_code: props.urau_code,
            category: props.urau_catg,
            functional_area_code: props.fua_code,
            area_km2: props.area_sqm.map(|sqm| sqm / 1_000_000.0),
            latitude: point.map(|p| p.y()),
            longitude: point.map(|p| p.x()),
            is_official_city: true,
        });
    }
    output
}

fn merge_bih(bih: BihDataset, states: &mut Vec<EuState>, regions: &mut Vec<EuRegion>, cities: &mut Vec<EuCity>) {
    let country_code = bih.state.iso2.clone();
    states.push(EuState {
        state_id: bih.state.state_id.clone(),
        name: Some(bih.state.name.clone()),
        iso2: bih.state.iso2.clone(),
        iso3: bih.state.iso3.clone(),
        nuts_id: Some(bih.state.state_id.clone()),
        capital: Some(bih.state.name.clone()),
    });

    regions.extend(bih.regions.into_iter().map(|region| EuRegion {
        nuts_level: if region.kind == "entity" || region.kind == "district" { 2 } else { 3 },
        nuts_id: region.code.clone(),
        region_id: region.region_id,
        state_id: region.state_id,
        name: Some(region.name),
        code: region.code,
        kind: region.kind,
        parent_region_id: region.parent_region_id,
    }));

    cities.extend(bih.cities.into_iter().map(|city| EuCity {
        city_code: if city.code.is_empty() {
            last_chars(&city.city_id, MAX_CITY_CODE).to_uppercase()
        } else {
            city.code
        },
        city_id: city.city_id,
        name: city.name,
        state_id: city.state_id,
        country_code: country_code.clone(),
        slug: city.slug,
        ura_code: None,
        category: None,
        nuts3_id: city.region.code,
        nuts2_id: city.entity.code,
        region_id: city.region.region_id,
        functional_area_code: None,
        area_km2: city.metrics.area_km2,
        latitude: city.coordinates.latitude,
        longitude: city.coordinates.longitude,
        is_official_city: city.is_official_city,
    }));
}
