//! Knowledge-base entities and the per-run entity cache.
//!
//! [`EntityCache::ensure`] fetches identifiers that are not cached yet, in
//! batches of [`BATCH_SIZE`]. Identifiers the remote does not know are left
//! out of the cache (and remembered, so they are not asked for again);
//! [`EntityCache::get`] then reports them as [`FetchError::NotFound`].
//!
//! The cache is generic over [`EntitySource`] so that the hierarchy walk can
//! run against the live API ([`WikidataClient`]) or an in-memory graph
//! ([`memory::MemorySource`]).

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    time::Duration,
};

use geo_types::Point;
use itertools::Itertools;

use crate::{error::FetchError, net};

pub mod api;
pub mod memory;
pub mod sparql;

/// Maximum number of ids per `wbgetentities` request.
pub const BATCH_SIZE: usize = 40;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// "instance of"
pub const INSTANCE_OF: &str = "P31";
/// "located in the administrative territorial entity"
pub const LOCATED_IN: &str = "P131";
/// "coordinate location"
pub const COORDINATE_LOCATION: &str = "P625";

/// The facts about one entity the hierarchy walk and the assemblers need.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: String,
    /// Label per language code.
    pub labels: BTreeMap<String, String>,
    /// "instance of" targets.
    pub types: BTreeSet<String>,
    /// "located in" targets, in claim order.
    pub parents: Vec<String>,
    /// First coordinate claim; `x` is the longitude, `y` the latitude.
    pub coordinates: Option<Point<f64>>,
}

impl Entity {
    pub fn new(id: impl Into<String>) -> Self {
        Entity {
            id: id.into(),
            labels: BTreeMap::new(),
            types: BTreeSet::new(),
            parents: Vec::new(),
            coordinates: None,
        }
    }

    pub fn with_label(mut self, language: impl Into<String>, label: impl Into<String>) -> Self {
        self.labels.insert(language.into(), label.into());
        self
    }

    pub fn with_types<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.types.extend(types.into_iter().map(Into::into));
        self
    }

    pub fn with_parents<I, T>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.parents.extend(parents.into_iter().map(Into::into));
        self
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.coordinates = Some(Point::new(longitude, latitude));
        self
    }

    /// First label in `languages` order, else any label, else `None`.
    pub fn best_label(&self, languages: &[String]) -> Option<&str> {
        languages
            .iter()
            .find_map(|lang| self.labels.get(lang))
            .or_else(|| self.labels.values().next())
            .map(String::as_str)
    }

    pub fn latitude(&self) -> Option<f64> {
        self.coordinates.map(|point| point.y())
    }

    pub fn longitude(&self) -> Option<f64> {
        self.coordinates.map(|point| point.x())
    }
}

/// Anything that can look up entities by id.
///
/// Ids the source does not know are simply absent from the result.
#[allow(async_fn_in_trait)]
pub trait EntitySource {
    async fn fetch_entities(&self, ids: &[String]) -> Result<Vec<Entity>, FetchError>;
}

/// Live `wbgetentities` lookups.
pub struct WikidataClient {
    http: reqwest::Client,
    endpoint: String,
    languages: String,
}

impl WikidataClient {
    pub fn new(languages: &[String]) -> Result<Self, FetchError> {
        Ok(WikidataClient {
            http: net::http_client(REQUEST_TIMEOUT)?,
            endpoint: api::WIKIDATA_API.to_owned(),
            languages: languages.join("|"),
        })
    }
}

impl EntitySource for WikidataClient {
    async fn fetch_entities(&self, ids: &[String]) -> Result<Vec<Entity>, FetchError> {
        let response = api::get_entities(&self.http, &self.endpoint, ids, &self.languages).await?;
        Ok(response.entities
            .into_iter()
            .filter_map(|(id, raw)| Entity::from_raw(id, raw))
            .collect())
    }
}

/// Process-scoped memo of fetched entities. No eviction.
pub struct EntityCache<S> {
    source: S,
    entities: HashMap<String, Entity>,
    /// Ids the source answered without an entity.
    missing: HashSet<String>,
}

impl<S: EntitySource> EntityCache<S> {
    pub fn new(source: S) -> Self {
        EntityCache {
            source,
            entities: HashMap::new(),
            missing: HashSet::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Cached entity, without touching the network.
    pub fn cached(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Fetches every id that is neither cached nor known to be missing.
    pub async fn ensure<I, T>(&mut self, ids: I) -> Result<(), FetchError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let pending = ids
            .into_iter()
            .map(|id| id.as_ref().to_owned())
            .filter(|id| !id.is_empty())
            .filter(|id| !self.entities.contains_key(id) && !self.missing.contains(id))
            .unique()
            .collect::<Vec<String>>();
        if pending.is_empty() {
            return Ok(());
        }

        let batches = pending
            .into_iter()
            .chunks(BATCH_SIZE)
            .into_iter()
            .map(|chunk| chunk.collect())
            .collect::<Vec<Vec<String>>>();

        for batch in batches {
            let fetched = self.source.fetch_entities(&batch).await?;
            tracing::debug!("({:13}): fetched {} entities", format!("{} ids", batch.len()), fetched.len());
            for entity in fetched {
                self.entities.insert(entity.id.clone(), entity);
            }
            for id in batch {
                if !self.entities.contains_key(&id) {
                    tracing::trace!("{id}: not found remotely");
                    self.missing.insert(id);
                }
            }
        }
        Ok(())
    }

    /// Cached entity, fetching it first if needed.
    pub async fn get(&mut self, id: &str) -> Result<&Entity, FetchError> {
        if !self.entities.contains_key(id) {
            self.ensure([id]).await?;
        }
        self.entities
            .get(id)
            .ok_or_else(|| FetchError::NotFound(id.to_owned()))
    }

    pub async fn labels(&mut self, id: &str) -> Result<BTreeMap<String, String>, FetchError> {
        Ok(self.get(id).await?.labels.clone())
    }

    pub async fn best_label(&mut self, id: &str, languages: &[String]) -> Result<Option<String>, FetchError> {
        Ok(self.get(id).await?.best_label(languages).map(str::to_owned))
    }

    pub async fn types(&mut self, id: &str) -> Result<BTreeSet<String>, FetchError> {
        Ok(self.get(id).await?.types.clone())
    }

    pub async fn parents(&mut self, id: &str) -> Result<Vec<String>, FetchError> {
        Ok(self.get(id).await?.parents.clone())
    }

    pub async fn coordinates(&mut self, id: &str) -> Result<Option<Point<f64>>, FetchError> {
        Ok(self.get(id).await?.coordinates)
    }
}

/// Turns a missing entity into `None`, keeping transport failures.
pub fn optional<T>(result: Result<T, FetchError>) -> Result<Option<T>, FetchError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(FetchError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

/* === Trait implementations === */

impl Entity {
    /// Projects a raw API record, or `None` if the API flagged it missing.
    pub fn from_raw(id: String, raw: api::schema::RawEntity) -> Option<Self> {
        if raw.missing.is_some() {
            return None;
        }
        let types = raw.item_targets(INSTANCE_OF).collect();
        let parents = raw.item_targets(LOCATED_IN).collect();
        let coordinates = raw.first_coordinate(COORDINATE_LOCATION);
        let labels = raw.labels
            .into_iter()
            .map(|(lang, label)| (lang, label.value))
            .collect();
        Some(Entity { id, labels, types, parents, coordinates })
    }
}
