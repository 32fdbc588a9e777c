//! German districts and cities above a population threshold.
//!
//! Three queries feed the document: every Landkreis and kreisfreie Stadt,
//! population and area of the fixed Bundesland and Regierungsbezirk tables,
//! and the cities. Each city is classified with the German profile:
//! Bundesland as entity, Regierungsbezirk as region, Landkreis or kreisfreie
//! Stadt as municipality. A district reached only through a city still
//! becomes a region of its own.

use std::collections::{HashMap, HashSet};

use geo_types::Point;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::{DatasetError, FetchError},
    hierarchy::HierarchyResolver,
    profile::CountryProfile,
    slug::{city_code, slugify},
    wikidata::{
        optional,
        sparql::{self, entity_id, parse_point, Row, SparqlClient, SPARQL_ENDPOINT},
        Entity, EntityCache, EntitySource, WikidataClient,
    },
};

use super::{
    entity_ref, generated_at, label, reference_regions, region_ref, Coordinates, EntityRef,
    MunicipalityRef, RegionRecord, RegionRef, StateRecord,
};

const CITY_LIMIT: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeDataset {
    pub metadata: Metadata,
    pub state: StateRecord,
    pub regions: Vec<RegionRecord>,
    pub cities: Vec<CityRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub generated_at: String,
    pub source: String,
    pub country: String,
    pub min_population: u64,
    pub records: Counts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counts {
    pub bundeslaender: usize,
    pub regierungsbezirke: usize,
    pub landkreise: usize,
    pub cities: usize,
    pub total_regions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityRecord {
    pub city_id: String,
    pub code: String,
    pub name: String,
    pub slug: String,
    pub wikidata_id: String,
    pub population: Option<u64>,
    pub area_km2: Option<f64>,
    pub coordinates: Coordinates,
    pub municipality: MunicipalityRef,
    /// Region record of the Landkreis or kreisfreie Stadt, when one was found.
    pub district_region_id: Option<String>,
    pub region: RegionRef,
    pub entity: EntityRef,
    pub state_id: String,
}

/// One city as returned by the query.
#[derive(Debug, Clone, PartialEq)]
pub struct CityRow {
    pub wikidata_id: String,
    pub name: String,
    pub population: Option<u64>,
    pub area_km2: Option<f64>,
    pub coordinates: Option<Point<f64>>,
}

/// One Landkreis or kreisfreie Stadt, its query rows folded together.
#[derive(Debug, Clone, PartialEq)]
pub struct DistrictRow {
    pub wikidata_id: String,
    pub name: String,
    /// `landkreis` or `kreisfreie_stadt`, from the profile's type table.
    pub kind: String,
    /// Amtlicher Gemeindeschlüssel.
    pub ags: Option<String>,
    /// "located in" targets, in row order.
    pub parents: Vec<String>,
    pub population: Option<u64>,
    pub area_km2: Option<f64>,
    pub coordinates: Option<Point<f64>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegionMetrics {
    pub population: Option<u64>,
    pub area_km2: Option<f64>,
}

/// Everything the queries returned.
#[derive(Debug, Clone, Default)]
pub struct SourceData {
    pub cities: Vec<CityRow>,
    pub districts: Vec<DistrictRow>,
    /// Population and area of reference regions, by item id.
    pub metrics: HashMap<String, RegionMetrics>,
}

fn item_values<'a, I>(ids: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    ids.into_iter().map(|id| format!("wd:{id}")).join(" ")
}

pub fn cities_query(state_id: &str, languages: &[String], min_population: u64) -> String {
    format!(
        r#"
SELECT ?city ?cityLabel ?population ?coordinates ?area WHERE {{
  ?city wdt:P31/wdt:P279* wd:Q515.
  ?city wdt:P17 wd:{state_id}.
  ?city wdt:P1082 ?population.
  FILTER(?population > {min_population})
  OPTIONAL {{ ?city wdt:P625 ?coordinates. }}
  OPTIONAL {{ ?city wdt:P2046 ?area. }}
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "{languages}". }}
}}
ORDER BY DESC(?population)
LIMIT {CITY_LIMIT}
"#,
        languages = languages.join(","),
    )
}

/// Every item of one of the profile's district types, with its located-in
/// parents, AGS, coordinates, population and area.
pub fn districts_query(profile: &CountryProfile) -> String {
    format!(
        r#"
SELECT ?district ?districtLabel ?type ?parent ?ags ?coordinates ?population ?area WHERE {{
  VALUES ?type {{ {types} }}
  ?district wdt:P31 ?type.
  ?district wdt:P17 wd:{state_id}.
  OPTIONAL {{ ?district wdt:P131 ?parent. }}
  OPTIONAL {{ ?district wdt:P439 ?ags. }}
  OPTIONAL {{ ?district wdt:P625 ?coordinates. }}
  OPTIONAL {{ ?district wdt:P1082 ?population. }}
  OPTIONAL {{ ?district wdt:P2046 ?area. }}
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "{languages}". }}
}}
"#,
        types = item_values(profile.municipality_types.keys()),
        state_id = profile.state.id,
        languages = profile.languages.join(","),
    )
}

/// Population and area of the profile's first-level and second-level items.
pub fn region_metrics_query(profile: &CountryProfile) -> String {
    format!(
        r#"
SELECT ?item ?population ?area WHERE {{
  VALUES ?item {{ {items} }}
  OPTIONAL {{ ?item wdt:P1082 ?population. }}
  OPTIONAL {{ ?item wdt:P2046 ?area. }}
}}
"#,
        items = item_values(profile.first_level.keys().chain(profile.second_level.keys())),
    )
}

fn number(row: &Row, name: &str) -> Option<f64> {
    sparql::value(row, name).and_then(|value| value.parse::<f64>().ok())
}

fn population(row: &Row) -> Option<u64> {
    number(row, "population").map(|p| p as u64)
}

/// One row per city, first occurrence wins. Rows are ordered by descending
/// population, so that is the largest figure when a city has several.
pub fn city_rows(rows: &[Row]) -> Vec<CityRow> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|row| {
            let id = sparql::value(row, "city").and_then(entity_id)?;
            if !seen.insert(id.to_owned()) {
                return None;
            }
            Some(CityRow {
                wikidata_id: id.to_owned(),
                name: sparql::value(row, "cityLabel").unwrap_or(id).to_owned(),
                population: population(row),
                area_km2: number(row, "area"),
                coordinates: sparql::value(row, "coordinates").and_then(parse_point),
            })
        })
        .collect()
}

/// Folds the query's rows into one district each, in first-seen order.
/// Parents accumulate; every other field keeps its first bound value.
pub fn district_rows(rows: &[Row], profile: &CountryProfile) -> Vec<DistrictRow> {
    let mut districts: IndexMap<String, DistrictRow> = IndexMap::new();
    for row in rows {
        let Some(id) = sparql::value(row, "district").and_then(entity_id) else {
            continue;
        };
        let kind = sparql::value(row, "type")
            .and_then(entity_id)
            .and_then(|type_id| profile.municipality_types.get(type_id));
        let parent = sparql::value(row, "parent").and_then(entity_id);

        let district = districts.entry(id.to_owned()).or_insert_with(|| DistrictRow {
            wikidata_id: id.to_owned(),
            name: sparql::value(row, "districtLabel").unwrap_or(id).to_owned(),
            kind: String::new(),
            ags: None,
            parents: Vec::new(),
            population: None,
            area_km2: None,
            coordinates: None,
        });
        if district.kind.is_empty() {
            district.kind = kind.cloned().unwrap_or_default();
        }
        if let Some(parent) = parent.filter(|p| !district.parents.iter().any(|known| known == p)) {
            district.parents.push(parent.to_owned());
        }
        district.ags = district.ags.take().or_else(|| sparql::value(row, "ags").map(str::to_owned));
        district.population = district.population.or_else(|| population(row));
        district.area_km2 = district.area_km2.or_else(|| number(row, "area"));
        district.coordinates = district
            .coordinates
            .or_else(|| sparql::value(row, "coordinates").and_then(parse_point));
    }
    districts.into_values().filter(|district| !district.kind.is_empty()).collect()
}

/// First bound population and area per item.
pub fn region_metrics(rows: &[Row]) -> HashMap<String, RegionMetrics> {
    let mut metrics: HashMap<String, RegionMetrics> = HashMap::new();
    for row in rows {
        let Some(id) = sparql::value(row, "item").and_then(entity_id) else {
            continue;
        };
        let entry = metrics.entry(id.to_owned()).or_default();
        entry.population = entry.population.or_else(|| population(row));
        entry.area_km2 = entry.area_km2.or_else(|| number(row, "area"));
    }
    metrics
}

pub async fn fetch_major_cities(
    sparql: &SparqlClient,
    profile: &CountryProfile,
    min_population: u64,
) -> Result<Vec<CityRow>, FetchError> {
    info!("Fetching cities with population above {min_population}");
    let query = cities_query(&profile.state.id, &profile.languages, min_population);
    let rows = sparql.select(&query).await?;
    let cities = city_rows(&rows);
    info!("{} cities ({} rows)", cities.len(), rows.len());
    Ok(cities)
}

pub async fn fetch_sources(
    sparql: &SparqlClient,
    profile: &CountryProfile,
    min_population: u64,
) -> Result<SourceData, FetchError> {
    info!("Fetching Landkreise and kreisfreie Städte");
    let rows = sparql.select(&districts_query(profile)).await?;
    let districts = district_rows(&rows, profile);
    info!("{} districts ({} rows)", districts.len(), rows.len());

    info!("Fetching population and area of Bundesländer and Regierungsbezirke");
    let metrics = region_metrics(&sparql.select(&region_metrics_query(profile)).await?);

    let cities = fetch_major_cities(sparql, profile, min_population).await?;
    Ok(SourceData { cities, districts, metrics })
}

pub async fn harvest(profile: &CountryProfile, min_population: u64) -> Result<DeDataset, DatasetError> {
    let sources = fetch_sources(&SparqlClient::new()?, profile, min_population).await?;
    let mut cache = EntityCache::new(WikidataClient::new(&profile.languages)?);
    assemble(&mut cache, profile, sources, min_population).await
}

pub async fn assemble<S: EntitySource>(
    cache: &mut EntityCache<S>,
    profile: &CountryProfile,
    sources: SourceData,
    min_population: u64,
) -> Result<DeDataset, DatasetError> {
    let SourceData { cities, districts: listed, metrics } = sources;
    cache.ensure(cities.iter().map(|city| &city.wikidata_id)).await?;
    cache.ensure(
        listed.iter()
            .filter(|district| table_parent(profile, district).is_none())
            .map(|district| &district.wikidata_id),
    ).await?;

    let mut regions = reference_regions(cache, profile).await?;
    for region in &mut regions {
        if let Some(found) = metrics.get(&region.wikidata_id) {
            region.population = found.population;
            region.area_km2 = found.area_km2;
        }
    }
    let mut region_ids: HashSet<String> = regions.iter().map(|r| r.region_id.clone()).collect();

    let mut districts: IndexMap<String, RegionRecord> = IndexMap::new();
    for district in listed {
        if districts.contains_key(&district.wikidata_id) {
            continue;
        }
        let record = district_region(cache, profile, district, &mut region_ids).await?;
        districts.insert(record.wikidata_id.clone(), record);
    }
    let listed_count = districts.len();

    let mut city_ids = HashSet::new();
    let mut records = Vec::with_capacity(cities.len());
    for city in cities {
        if optional(cache.get(&city.wikidata_id).await)?.is_none() {
            return Err(DatasetError::MissingEntity { id: city.wikidata_id, row: city.name });
        }
        let hierarchy = HierarchyResolver::new(cache, profile).resolve(&city.wikidata_id).await?;
        let region = region_ref(cache, profile, hierarchy.region.as_deref()).await?;
        let entity = entity_ref(cache, profile, hierarchy.entity.as_deref()).await?;

        if !districts.contains_key(&hierarchy.municipality) {
            let discovered = optional(cache.get(&hierarchy.municipality).await)?
                .and_then(|found| discovered_district(profile, found));
            if let Some(district) = discovered {
                let record = district_region(cache, profile, district, &mut region_ids).await?;
                districts.insert(record.wikidata_id.clone(), record);
            }
        }
        let district_region_id = districts
            .get(&hierarchy.municipality)
            .map(|district| district.region_id.clone());

        let slug = slugify(&city.name);
        let city_id = unique_id(&mut city_ids, scoped_id(profile, entity.code.as_deref(), &slug), &city.wikidata_id);

        let coordinates = match city.coordinates {
            Some(point) => Coordinates { latitude: Some(point.y()), longitude: Some(point.x()) },
            None => Coordinates::from(cache.cached(&city.wikidata_id)),
        };
        records.push(CityRecord {
            city_id,
            code: city_code(&slug, &profile.prefix),
            name: city.name,
            slug,
            population: city.population,
            area_km2: city.area_km2,
            coordinates,
            municipality: MunicipalityRef {
                name: label(cache, profile, Some(hierarchy.municipality.as_str())).await?,
                wikidata_id: hierarchy.municipality,
            },
            district_region_id,
            wikidata_id: city.wikidata_id,
            region,
            entity,
            state_id: profile.state.state_id.clone(),
        });
    }

    let landkreise = districts.len();
    info!("{listed_count} listed districts, {} found through cities", landkreise - listed_count);
    regions.extend(districts.into_values());
    info!("Assembled {} cities and {} regions", records.len(), regions.len());

    let count_kind = |kind: &str| regions.iter().filter(|region| region.kind == kind).count();
    let counts = Counts {
        bundeslaender: count_kind(profile.first_level_kind.as_str()),
        regierungsbezirke: count_kind(profile.second_level_kind.as_str()),
        landkreise,
        cities: records.len(),
        total_regions: regions.len(),
    };

    Ok(DeDataset {
        metadata: Metadata {
            generated_at: generated_at(),
            source: SPARQL_ENDPOINT.to_owned(),
            country: profile.state.iso2.clone(),
            min_population,
            records: counts,
        },
        state: StateRecord::from_profile(profile),
        regions,
        cities: records,
    })
}

/// `de-<bundesland>-<local>`, or `de-<local>` when the Bundesland is unknown.
fn scoped_id(profile: &CountryProfile, bundesland: Option<&str>, local: &str) -> String {
    match bundesland {
        Some(code) => profile.region_id(&[code, local]),
        None => profile.region_id(&[local]),
    }
}

/// `id`, or `id-<item>` when `id` is taken.
fn unique_id(taken: &mut HashSet<String>, id: String, item: &str) -> String {
    let id = if taken.contains(&id) {
        format!("{id}-{}", item.to_lowercase())
    } else {
        id
    };
    taken.insert(id.clone());
    id
}

/// First located-in target of `district` that is a reference region.
fn table_parent<'a>(profile: &CountryProfile, district: &'a DistrictRow) -> Option<&'a String> {
    district.parents.iter().find(|id| profile.region_class(id).is_some())
}

/// A district reached from a city, described from its entity.
fn discovered_district(profile: &CountryProfile, entity: &Entity) -> Option<DistrictRow> {
    let kind = profile.municipality_kind(&entity.types)?;
    Some(DistrictRow {
        wikidata_id: entity.id.clone(),
        name: entity.best_label(&profile.languages).unwrap_or(&entity.id).to_owned(),
        kind: kind.to_owned(),
        ags: None,
        parents: entity.parents.clone(),
        population: None,
        area_km2: None,
        coordinates: entity.coordinates,
    })
}

/// Region and Bundesland of a district: its located-in target from the
/// reference tables, else whatever the located-in walk finds.
async fn district_parents<S: EntitySource>(
    cache: &mut EntityCache<S>,
    profile: &CountryProfile,
    district: &DistrictRow,
) -> Result<(Option<String>, Option<String>), FetchError> {
    if let Some(parent) = table_parent(profile, district) {
        let bundesland = match profile.second_level.get(parent) {
            Some(sub) => sub.parent.clone(),
            None => Some(parent.clone()),
        };
        return Ok((Some(parent.clone()), bundesland));
    }
    let hierarchy = HierarchyResolver::new(cache, profile).resolve(&district.wikidata_id).await?;
    Ok((hierarchy.region, hierarchy.entity))
}

/// Region record of a Landkreis or kreisfreie Stadt, identified by its AGS
/// when it has one and by its name otherwise.
async fn district_region<S: EntitySource>(
    cache: &mut EntityCache<S>,
    profile: &CountryProfile,
    district: DistrictRow,
    region_ids: &mut HashSet<String>,
) -> Result<RegionRecord, FetchError> {
    let (region, bundesland) = district_parents(cache, profile, &district).await?;
    let bundesland_code = bundesland.as_deref().and_then(|id| profile.first_level_code(id));
    let parent_region_id = region
        .as_deref()
        .and_then(|id| profile.region_class(id))
        .map(|class| class.region_id);

    let slug = slugify(&district.name);
    let local = district.ags.as_deref().unwrap_or(&slug);
    let region_id = unique_id(region_ids, scoped_id(profile, bundesland_code, local), &district.wikidata_id);
    tracing::debug!("{}: district {:?} ({}) as {region_id}", district.wikidata_id, district.name, district.kind);

    Ok(RegionRecord {
        region_id,
        state_id: profile.state.state_id.clone(),
        code: district.ags.clone().unwrap_or_else(|| city_code(&slug, &profile.prefix)),
        kind: district.kind,
        wikidata_id: district.wikidata_id,
        parent_region_id,
        seat: None,
        population: district.population,
        area_km2: district.area_km2,
        latitude: district.coordinates.map(|p| p.y()),
        longitude: district.coordinates.map(|p| p.x()),
        name: district.name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        profile::Country,
        wikidata::{memory::MemorySource, Entity},
    };

    const GERMANY: &str = "Q183";
    const BAYERN: &str = "Q980";
    const BERLIN: &str = "Q64";
    const OBERBAYERN: &str = "Q10439";
    const MUENCHEN: &str = "Q1726";
    const DACHAU: &str = "Q100001";
    const LK_DACHAU: &str = "Q100002";
    const LK_LINDAU: &str = "Q100003";
    const LK_ELSEWHERE: &str = "Q100004";
    const PLANUNGSREGION: &str = "Q100005";
    const REGIERUNGSBEZIRK: &str = "Q22721";
    const LANDKREIS: &str = "Q106658";
    const KREISFREIE_STADT: &str = "Q22865";

    fn profile() -> CountryProfile {
        CountryProfile::builtin(Country::Germany).unwrap()
    }

    fn source() -> MemorySource {
        MemorySource::new()
            .with(Entity::new(GERMANY).with_label("de", "Deutschland"))
            .with(Entity::new(BAYERN).with_label("de", "Bayern").with_parents([GERMANY]))
            .with(Entity::new(BERLIN).with_label("de", "Berlin").with_parents([GERMANY]).with_coordinates(52.52, 13.40))
            .with(
                Entity::new(OBERBAYERN)
                    .with_label("de", "Oberbayern")
                    .with_types([REGIERUNGSBEZIRK])
                    .with_parents([BAYERN]),
            )
            .with(
                Entity::new(MUENCHEN)
                    .with_label("de", "München")
                    .with_types([KREISFREIE_STADT, "Q1549591"])
                    .with_parents([OBERBAYERN])
                    .with_coordinates(48.14, 11.58),
            )
            .with(
                Entity::new(LK_DACHAU)
                    .with_label("de", "Landkreis Dachau")
                    .with_types([LANDKREIS])
                    .with_parents([OBERBAYERN]),
            )
            .with(Entity::new(DACHAU).with_label("de", "Dachau").with_types(["Q515"]).with_parents([LK_DACHAU]))
            .with(Entity::new(LK_ELSEWHERE).with_types([LANDKREIS]).with_parents([PLANUNGSREGION]))
            .with(Entity::new(PLANUNGSREGION).with_parents([BAYERN]))
    }

    fn city(id: &str, name: &str, population: u64) -> CityRow {
        CityRow {
            wikidata_id: id.to_owned(),
            name: name.to_owned(),
            population: Some(population),
            area_km2: None,
            coordinates: None,
        }
    }

    fn cities_only(cities: Vec<CityRow>) -> SourceData {
        SourceData { cities, ..Default::default() }
    }

    fn district(id: &str, name: &str, ags: Option<&str>, parents: &[&str]) -> DistrictRow {
        DistrictRow {
            wikidata_id: id.to_owned(),
            name: name.to_owned(),
            kind: "landkreis".to_owned(),
            ags: ags.map(str::to_owned),
            parents: parents.iter().map(|p| p.to_string()).collect(),
            population: Some(82_000),
            area_km2: Some(323.4),
            coordinates: Some(Point::new(9.68, 47.55)),
        }
    }

    fn rows(raw: &str) -> Vec<Row> {
        let response: sparql::schema::Response = serde_json::from_str(raw).unwrap();
        response.results.bindings
    }

    #[tokio::test]
    async fn classifies_cities_and_districts() {
        let profile = profile();
        let mut cache = EntityCache::new(source());
        let cities = vec![
            city(BERLIN, "Berlin", 3_755_251),
            city(MUENCHEN, "München", 1_512_491),
            city(DACHAU, "Dachau", 50_000),
        ];

        let dataset = assemble(&mut cache, &profile, cities_only(cities), 40_000).await.unwrap();
        assert_eq!(dataset.state.iso3.as_deref(), Some("DEU"));
        assert_eq!(dataset.state.latitude, Some(51.1657));

        let berlin = &dataset.cities[0];
        assert_eq!(berlin.city_id, "de-be-berlin");
        assert_eq!(berlin.region.region_id.as_deref(), Some("de-be"));
        assert_eq!(berlin.region.kind.as_deref(), Some("bundesland"));
        assert_eq!(berlin.district_region_id, None);
        assert_eq!(berlin.coordinates.latitude, Some(52.52));

        let muenchen = &dataset.cities[1];
        assert_eq!(muenchen.city_id, "de-by-muenchen");
        assert_eq!(muenchen.code, "MUEN");
        assert_eq!(muenchen.region.region_id.as_deref(), Some("de-by-obb"));
        assert_eq!(muenchen.entity.region_id.as_deref(), Some("de-by"));
        assert_eq!(muenchen.municipality.wikidata_id, MUENCHEN);
        assert_eq!(muenchen.district_region_id.as_deref(), Some("de-by-muenchen"));

        let dachau = &dataset.cities[2];
        assert_eq!(dachau.city_id, "de-by-dachau");
        assert_eq!(dachau.municipality.wikidata_id, LK_DACHAU);
        assert_eq!(dachau.municipality.name.as_deref(), Some("Landkreis Dachau"));
        assert_eq!(dachau.district_region_id.as_deref(), Some("de-by-landkreis-dachau"));

        let lk = dataset.regions.iter().find(|r| r.wikidata_id == LK_DACHAU).unwrap();
        assert_eq!(lk.kind, "landkreis");
        assert_eq!(lk.parent_region_id.as_deref(), Some("de-by-obb"));
        let kfs = dataset.regions.iter().find(|r| r.wikidata_id == MUENCHEN).unwrap();
        assert_eq!(kfs.kind, "kreisfreie_stadt");
        assert_eq!(kfs.latitude, Some(48.14));

        let counts = &dataset.metadata.records;
        assert_eq!(counts.bundeslaender, 16);
        assert_eq!(counts.regierungsbezirke, 19);
        assert_eq!(counts.landkreise, 2);
        assert_eq!(counts.cities, 3);
        assert_eq!(counts.total_regions, 37);
    }

    #[tokio::test]
    async fn listed_districts_become_regions_without_cities() {
        let profile = profile();
        let mut cache = EntityCache::new(source());
        let sources = SourceData {
            cities: vec![city(DACHAU, "Dachau", 50_000)],
            districts: vec![
                district(LK_LINDAU, "Landkreis Lindau (Bodensee)", Some("09776"), &["Q10547", BAYERN]),
                district(LK_ELSEWHERE, "Landkreis Anderswo", None, &[PLANUNGSREGION]),
                district(LK_DACHAU, "Landkreis Dachau", Some("09174"), &[OBERBAYERN]),
            ],
            metrics: HashMap::from([(
                BAYERN.to_owned(),
                RegionMetrics { population: Some(13_369_393), area_km2: Some(70_541.57) },
            )]),
        };

        let dataset = assemble(&mut cache, &profile, sources, 50_000).await.unwrap();

        let lindau = dataset.regions.iter().find(|r| r.wikidata_id == LK_LINDAU).unwrap();
        assert_eq!(lindau.region_id, "de-by-09776");
        assert_eq!(lindau.code, "09776");
        assert_eq!(lindau.parent_region_id.as_deref(), Some("de-by-sw"));
        assert_eq!(lindau.population, Some(82_000));
        assert_eq!(lindau.area_km2, Some(323.4));
        assert_eq!(lindau.latitude, Some(47.55));

        // no parent in the tables, so the located-in walk decides
        let elsewhere = dataset.regions.iter().find(|r| r.wikidata_id == LK_ELSEWHERE).unwrap();
        assert_eq!(elsewhere.region_id, "de-by-landkreis-anderswo");
        assert_eq!(elsewhere.parent_region_id.as_deref(), Some("de-by"));

        // the city's district was listed, not rediscovered
        assert_eq!(dataset.cities[0].district_region_id.as_deref(), Some("de-by-09174"));
        assert_eq!(dataset.regions.iter().filter(|r| r.wikidata_id == LK_DACHAU).count(), 1);

        let bayern = dataset.regions.iter().find(|r| r.region_id == "de-by").unwrap();
        assert_eq!(bayern.population, Some(13_369_393));
        assert_eq!(bayern.area_km2, Some(70_541.57));
        let berlin = dataset.regions.iter().find(|r| r.region_id == "de-be").unwrap();
        assert_eq!(berlin.population, None);

        assert_eq!(dataset.metadata.records.landkreise, 3);
        assert_eq!(dataset.metadata.records.total_regions, 38);
    }

    #[tokio::test]
    async fn missing_city_entity_is_fatal() {
        let profile = profile();
        let mut cache = EntityCache::new(source());
        let cities = vec![city(MUENCHEN, "München", 1_512_491), city("Q999999", "Nirgendwo", 60_000)];

        let err = assemble(&mut cache, &profile, cities_only(cities), 50_000).await.unwrap_err();
        assert!(matches!(err, DatasetError::MissingEntity { ref id, ref row } if id == "Q999999" && row == "Nirgendwo"));
    }

    #[tokio::test]
    async fn duplicate_city_slugs_get_the_item_id() {
        let profile = profile();
        let mut cache = EntityCache::new(
            source().with(Entity::new("Q200").with_label("de", "Dachau").with_parents([LK_DACHAU])),
        );
        let cities = vec![city(DACHAU, "Dachau", 50_000), city("Q200", "Dachau", 50_000)];

        let dataset = assemble(&mut cache, &profile, cities_only(cities), 40_000).await.unwrap();
        assert_eq!(dataset.cities[0].city_id, "de-by-dachau");
        assert_eq!(dataset.cities[1].city_id, "de-by-dachau-q200");
        assert_eq!(dataset.metadata.records.landkreise, 1);
    }

    #[test]
    fn deduplicates_query_rows() {
        let cities = city_rows(&rows(r#"{"results": {"bindings": [
            {"city": {"type": "uri", "value": "http://www.wikidata.org/entity/Q1726"},
             "cityLabel": {"type": "literal", "value": "München"},
             "population": {"type": "literal", "value": "1512491"},
             "coordinates": {"type": "literal", "value": "Point(11.575 48.1375)"},
             "area": {"type": "literal", "value": "310.7"}},
            {"city": {"type": "uri", "value": "http://www.wikidata.org/entity/Q1726"},
             "cityLabel": {"type": "literal", "value": "München"},
             "population": {"type": "literal", "value": "1488202"}},
            {"city": {"type": "uri", "value": "http://www.wikidata.org/entity/Q2090"},
             "population": {"type": "literal", "value": "518370"}}
        ]}}"#));

        assert_eq!(cities.len(), 2);
        assert_eq!(cities[0].population, Some(1_512_491));
        assert_eq!(cities[0].area_km2, Some(310.7));
        assert_eq!(cities[0].coordinates.map(|p| p.y()), Some(48.1375));
        assert_eq!(cities[1].name, "Q2090");
        assert_eq!(cities[1].coordinates, None);
    }

    #[test]
    fn folds_district_rows() {
        let districts = district_rows(&rows(r#"{"results": {"bindings": [
            {"district": {"type": "uri", "value": "http://www.wikidata.org/entity/Q10415"},
             "districtLabel": {"type": "literal", "value": "Landkreis Lindau (Bodensee)"},
             "type": {"type": "uri", "value": "http://www.wikidata.org/entity/Q106658"},
             "parent": {"type": "uri", "value": "http://www.wikidata.org/entity/Q10547"},
             "ags": {"type": "literal", "value": "09776"},
             "population": {"type": "literal", "value": "82000"}},
            {"district": {"type": "uri", "value": "http://www.wikidata.org/entity/Q10415"},
             "type": {"type": "uri", "value": "http://www.wikidata.org/entity/Q106658"},
             "parent": {"type": "uri", "value": "http://www.wikidata.org/entity/Q980"},
             "coordinates": {"type": "literal", "value": "Point(9.68 47.55)"},
             "area": {"type": "literal", "value": "323.4"}},
            {"district": {"type": "uri", "value": "http://www.wikidata.org/entity/Q1726"},
             "districtLabel": {"type": "literal", "value": "München"},
             "type": {"type": "uri", "value": "http://www.wikidata.org/entity/Q22865"}},
            {"district": {"type": "uri", "value": "http://www.wikidata.org/entity/Q5"},
             "type": {"type": "uri", "value": "http://www.wikidata.org/entity/Q515"}}
        ]}}"#), &profile());

        assert_eq!(districts.len(), 2);
        let lindau = &districts[0];
        assert_eq!(lindau.kind, "landkreis");
        assert_eq!(lindau.parents, ["Q10547", "Q980"]);
        assert_eq!(lindau.ags.as_deref(), Some("09776"));
        assert_eq!(lindau.population, Some(82_000));
        assert_eq!(lindau.area_km2, Some(323.4));
        assert_eq!(lindau.coordinates.map(|p| p.x()), Some(9.68));
        assert_eq!(districts[1].kind, "kreisfreie_stadt");
        assert!(districts[1].parents.is_empty());
    }

    #[test]
    fn region_metrics_keep_first_values() {
        let metrics = region_metrics(&rows(r#"{"results": {"bindings": [
            {"item": {"type": "uri", "value": "http://www.wikidata.org/entity/Q980"},
             "population": {"type": "literal", "value": "13369393"}},
            {"item": {"type": "uri", "value": "http://www.wikidata.org/entity/Q980"},
             "population": {"type": "literal", "value": "12000000"},
             "area": {"type": "literal", "value": "70541.57"}},
            {"item": {"type": "uri", "value": "http://www.wikidata.org/entity/Q64"}}
        ]}}"#));

        assert_eq!(metrics["Q980"], RegionMetrics { population: Some(13_369_393), area_km2: Some(70_541.57) });
        assert_eq!(metrics["Q64"], RegionMetrics::default());
    }

    #[test]
    fn queries_name_types_items_and_threshold() {
        let query = cities_query("Q183", &["de".into(), "en".into()], 50_000);
        assert!(query.contains("FILTER(?population > 50000)"));
        assert!(query.contains(r#"wikibase:language "de,en""#));
        assert!(query.contains("wd:Q183."));
        assert!(query.contains("LIMIT 1000"));

        let profile = profile();
        let query = districts_query(&profile);
        assert!(query.contains("VALUES ?type { wd:Q106658 wd:Q22865 }"));
        assert!(query.contains("wdt:P439 ?ags"));

        let query = region_metrics_query(&profile);
        assert!(query.contains("wd:Q985 wd:Q980"));
        assert!(query.contains("wd:Q10439"));
    }
}
