//! Classifies a place into its administrative hierarchy.
//!
//! Starting from a leaf (a municipality-like place) the resolver walks the
//! located-in graph breadth-first, at most [`MAX_DEPTH`] edges away. Every
//! node is offered to four slots: municipality, region, entity and state.
//! A slot keeps the first node that fits it, so shallower matches win.
//! The graph is a DAG in practice but nothing guarantees it, hence the
//! visited set and the depth bound.
//!
//! After the walk a few repairs look one edge further from what was found,
//! then the profile's defaults fill the rest.

use crate::{
    collections::Frontier,
    error::FetchError,
    profile::CountryProfile,
    wikidata::{optional, EntityCache, EntitySource},
};

/// Nodes deeper than this are neither classified nor expanded.
pub const MAX_DEPTH: usize = 5;

/// Slots as the walk left them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slots {
    pub municipality: Option<String>,
    pub region: Option<String>,
    pub entity: Option<String>,
    pub state: Option<String>,
}

/// Outcome of the breadth-first walk alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Walk {
    pub slots: Slots,
    /// Processed ids with their depth, in visiting order.
    pub visited: Vec<(String, usize)>,
}

/// Final classification. Municipality and state are always known; region
/// and entity stay empty when neither the graph nor the profile says more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hierarchy {
    pub municipality: String,
    pub region: Option<String>,
    pub entity: Option<String>,
    pub state: String,
}

pub struct HierarchyResolver<'a, S> {
    cache: &'a mut EntityCache<S>,
    profile: &'a CountryProfile,
}

impl<'a, S: EntitySource> HierarchyResolver<'a, S> {
    pub fn new(cache: &'a mut EntityCache<S>, profile: &'a CountryProfile) -> Self {
        HierarchyResolver { cache, profile }
    }

    /// Walks, repairs and defaults. Missing entities are dead ends; only
    /// transport failures are returned as errors.
    pub async fn resolve(&mut self, id: &str) -> Result<Hierarchy, FetchError> {
        let mut slots = self.walk(id).await?.slots;
        self.repair(&mut slots).await?;
        let hierarchy = self.apply_defaults(id, slots);
        tracing::trace!("{id}: {hierarchy:?}");
        Ok(hierarchy)
    }

    pub async fn walk(&mut self, id: &str) -> Result<Walk, FetchError> {
        let mut slots = Slots::default();
        let mut visited = Vec::new();
        let mut frontier = Frontier::new();
        frontier.push_back(id.to_owned(), 0);

        while let Some((current, depth)) = frontier.pop_front() {
            let (types, parents) = match optional(self.cache.get(&current).await)? {
                Some(entity) => (entity.types.clone(), entity.parents.clone()),
                None => {
                    tracing::trace!("{current}: dead end, entity missing");
                    continue;
                }
            };
            visited.push((current.clone(), depth));

            if current != id && types.iter().any(|t| self.profile.is_municipality_type(t)) {
                slots.municipality.get_or_insert_with(|| current.clone());
            }
            let first_level = self.profile.is_first_level(&current);
            if first_level || types.iter().any(|t| self.profile.is_second_level_type(t)) {
                slots.region.get_or_insert_with(|| current.clone());
            }
            if first_level {
                slots.entity.get_or_insert_with(|| current.clone());
            }
            if self.profile.is_state(&current) {
                slots.state.get_or_insert_with(|| current.clone());
            }

            if depth < MAX_DEPTH {
                for parent in parents {
                    frontier.push_back(parent, depth + 1);
                }
            }
        }

        Ok(Walk { slots, visited })
    }

    async fn repair(&mut self, slots: &mut Slots) -> Result<(), FetchError> {
        if slots.entity.is_none() {
            if let Some(region) = slots.region.clone() {
                slots.entity = self.first_level_parent(&region).await?;
            }
        }
        if slots.entity.is_none() {
            if let Some(municipality) = slots.municipality.clone() {
                slots.entity = self.first_level_parent(&municipality).await?;
            }
        }
        if slots.state.is_none() {
            if let Some(entity) = slots.entity.clone() {
                let parents = self.parents_or_empty(&entity).await?;
                let state = &self.profile.state.id;
                if parents.is_empty() || parents.contains(state) {
                    slots.state = Some(state.clone());
                }
            }
        }
        Ok(())
    }

    fn apply_defaults(&self, id: &str, slots: Slots) -> Hierarchy {
        let municipality = slots.municipality.unwrap_or_else(|| id.to_owned());
        let region = slots.region.or_else(|| slots.entity.clone());
        let entity = slots.entity.or_else(|| {
            self.profile.entity_fallback
                .clone()
                .filter(|fallback| region.as_ref() == Some(fallback))
        });
        let state = slots.state.unwrap_or_else(|| self.profile.state.id.clone());
        Hierarchy { municipality, region, entity, state }
    }

    async fn first_level_parent(&mut self, id: &str) -> Result<Option<String>, FetchError> {
        Ok(self.parents_or_empty(id).await?
            .into_iter()
            .find(|parent| self.profile.is_first_level(parent)))
    }

    async fn parents_or_empty(&mut self, id: &str) -> Result<Vec<String>, FetchError> {
        Ok(optional(self.cache.parents(id).await)?.unwrap_or_default())
    }
}
