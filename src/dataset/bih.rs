//! Bosnia and Herzegovina municipalities.
//!
//! Rows come from the Bosnian Wikipedia list of municipalities. Each row is
//! linked to its knowledge-base item, classified by the hierarchy resolver
//! and emitted as one city record.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::DatasetError,
    hierarchy::HierarchyResolver,
    profile::CountryProfile,
    slug::{city_code, contains_cyrillic, slugify},
    wiki::{table::{parse_municipality_table, MunicipalityRow}, WikipediaClient},
    wikidata::{optional, EntityCache, EntitySource, WikidataClient},
};

use super::{
    entity_ref, generated_at, label, reference_regions, region_ref, Coordinates, EntityRef,
    MunicipalityRef, RegionRecord, RegionRef, StateRecord,
};

pub const WIKI_API: &str = "https://bs.wikipedia.org/w/api.php";
pub const MUNICIPALITY_PAGE: &str = "Općine_Bosne_i_Hercegovine";
pub const SOURCE_URL: &str = "https://bs.wikipedia.org/wiki/Općine_Bosne_i_Hercegovine";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BihDataset {
    pub metadata: Metadata,
    pub state: StateRecord,
    pub regions: Vec<RegionRecord>,
    pub cities: Vec<CityRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub generated_at: String,
    pub source: String,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityRecord {
    pub city_id: String,
    pub code: String,
    pub name: String,
    pub slug: String,
    pub wikidata_id: String,
    pub wikipedia_title: String,
    pub metrics: Metrics,
    pub is_official_city: bool,
    pub coordinates: Coordinates,
    pub municipality: MunicipalityRef,
    pub region: RegionRef,
    pub entity: EntityRef,
    pub state_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub num_settlements: Option<u64>,
    pub population_2013: Option<u64>,
    pub density_per_km2: Option<f64>,
    pub area_km2: Option<f64>,
}

/// A table row linked to its knowledge-base item.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub row: MunicipalityRow,
    pub wikidata_id: String,
    pub slug: String,
    pub code: String,
}

impl SourceRow {
    pub fn new(row: MunicipalityRow, wikidata_id: impl Into<String>, fallback_code: &str) -> Self {
        let slug = slugify(&row.display_name);
        let code = city_code(&slug, fallback_code);
        SourceRow { row, wikidata_id: wikidata_id.into(), slug, code }
    }
}

/// Fetches the municipality table and links every row to its item.
/// A row whose article has no item aborts the run.
pub async fn fetch_source_rows(
    wiki: &WikipediaClient,
    profile: &CountryProfile,
) -> Result<Vec<SourceRow>, DatasetError> {
    info!("Fetching municipality table");
    let html = wiki.parse_page(MUNICIPALITY_PAGE).await?;
    let rows = parse_municipality_table(&html, MUNICIPALITY_PAGE)?;
    info!("Parsed {} municipality rows", rows.len());

    let titles: Vec<String> = rows.iter().map(|row| row.wiki_title.clone()).collect();
    let ids = wiki.wikibase_ids(&titles).await?;

    rows.into_iter()
        .map(|row| match ids.get(&row.wiki_title) {
            Some(id) => Ok(SourceRow::new(row, id.clone(), &profile.prefix)),
            None => Err(DatasetError::MissingWikidataId { row: row.wiki_title }),
        })
        .collect()
}

/// Builds the document from linked rows. Row order is kept.
pub async fn assemble<S: EntitySource>(
    cache: &mut EntityCache<S>,
    profile: &CountryProfile,
    rows: Vec<SourceRow>,
) -> Result<BihDataset, DatasetError> {
    cache.ensure(rows.iter().map(|row| &row.wikidata_id)).await?;
    cache.ensure(profile.reference_ids()).await?;

    let mut cities = Vec::with_capacity(rows.len());
    for source in rows {
        cities.push(city_record(cache, profile, source).await?);
    }
    info!("Assembled {} city records", cities.len());

    Ok(BihDataset {
        metadata: Metadata {
            generated_at: generated_at(),
            source: SOURCE_URL.to_owned(),
            records: cities.len(),
        },
        state: StateRecord::from_profile(profile),
        regions: reference_regions(cache, profile).await?,
        cities,
    })
}

/// Fetches, links and assembles with the live services.
pub async fn harvest(profile: &CountryProfile) -> Result<BihDataset, DatasetError> {
    let wiki = WikipediaClient::new(WIKI_API)?;
    let rows = fetch_source_rows(&wiki, profile).await?;
    let mut cache = EntityCache::new(WikidataClient::new(&profile.languages)?);
    assemble(&mut cache, profile, rows).await
}

async fn city_record<S: EntitySource>(
    cache: &mut EntityCache<S>,
    profile: &CountryProfile,
    source: SourceRow,
) -> Result<CityRecord, DatasetError> {
    let SourceRow { row, wikidata_id, slug, code } = source;
    let coordinates = match optional(cache.get(&wikidata_id).await)? {
        Some(entity) => Coordinates::from(Some(entity)),
        None => {
            return Err(DatasetError::MissingEntity { id: wikidata_id, row: row.wiki_title });
        }
    };

    let hierarchy = HierarchyResolver::new(cache, profile).resolve(&wikidata_id).await?;
    let municipality_label = label(cache, profile, Some(hierarchy.municipality.as_str())).await?;
    let region = region_ref(cache, profile, hierarchy.region.as_deref()).await?;
    let entity = entity_ref(cache, profile, hierarchy.entity.as_deref()).await?;

    let id_prefix = entity.code.as_deref().unwrap_or(profile.prefix.as_str()).to_lowercase();
    Ok(CityRecord {
        city_id: format!("{id_prefix}-{slug}"),
        code,
        name: row.display_name.clone(),
        slug,
        wikidata_id,
        wikipedia_title: row.wiki_title.clone(),
        metrics: Metrics {
            num_settlements: row.num_settlements,
            population_2013: row.population_2013,
            density_per_km2: row.density_per_km2,
            area_km2: row.area_km2,
        },
        is_official_city: row.is_official_city,
        coordinates,
        municipality: MunicipalityRef {
            name: Some(municipality_name(
                municipality_label,
                &row.display_name,
                row.is_official_city,
            )),
            wikidata_id: hierarchy.municipality,
        },
        region,
        entity,
        state_id: profile.state.state_id.clone(),
    })
}

/// The knowledge-base label, unless it is absent or written in Cyrillic;
/// then `Grad <name>` for official cities and `Općina <name>` otherwise.
pub fn municipality_name(label: Option<String>, display_name: &str, is_official_city: bool) -> String {
    match label {
        Some(label) if !contains_cyrillic(&label) => label,
        _ => {
            let prefix = if is_official_city { "Grad" } else { "Općina" };
            if display_name.to_lowercase().starts_with(&prefix.to_lowercase()) {
                display_name.to_owned()
            } else {
                format!("{prefix} {display_name}")
            }
        }
    }
}
