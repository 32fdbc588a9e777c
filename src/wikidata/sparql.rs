//! Wikidata SPARQL endpoint (query.wikidata.org)

use std::{collections::HashMap, time::Duration};

use geo_types::Point;

use crate::{error::FetchError, net};

pub const SPARQL_ENDPOINT: &str = "https://query.wikidata.org/sparql";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// One result row: variable name to bound value.
pub type Row = HashMap<String, schema::Binding>;

pub struct SparqlClient {
    http: reqwest::Client,
    endpoint: String,
}

impl SparqlClient {
    pub fn new() -> Result<Self, FetchError> {
        Ok(SparqlClient {
            http: net::http_client(REQUEST_TIMEOUT)?,
            endpoint: SPARQL_ENDPOINT.to_owned(),
        })
    }

    /// Runs a SELECT query and returns its bindings.
    pub async fn select(&self, query: &str) -> Result<Vec<Row>, FetchError> {
        tracing::debug!("Issuing SPARQL query: {}...", query.trim().chars().take(80).collect::<String>());
        let response: schema::Response = net::get_json(
            &self.http,
            &self.endpoint,
            &[("query", query), ("format", "json")],
            "application/sparql-results+json",
        ).await?;
        Ok(response.results.bindings)
    }
}

/// Value of `name` in `row`, if bound.
pub fn value<'a>(row: &'a Row, name: &str) -> Option<&'a str> {
    row.get(name).map(|binding| binding.value.as_str())
}

/// `Q64` from `http://www.wikidata.org/entity/Q64`.
pub fn entity_id(uri: &str) -> Option<&str> {
    let id = uri.rsplit('/').next()?;
    let digits = id.strip_prefix('Q')?;
    (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())).then_some(id)
}

/// Parses a WKT literal such as `Point(11.5755 48.1374)` (longitude first).
pub fn parse_point(literal: &str) -> Option<Point<f64>> {
    let inner = literal
        .trim()
        .strip_prefix("Point(")?
        .strip_suffix(')')?;
    let mut parts = inner.split_whitespace();
    let longitude = parts.next()?.parse::<f64>().ok()?;
    let latitude = parts.next()?.parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Point::new(longitude, latitude))
}

/// Serde-compatible SPARQL 1.1 JSON results schema
pub mod schema {
    use serde::Deserialize;

    use super::Row;

    #[derive(Debug, Deserialize)]
    pub struct Response {
        pub results: Results,
    }

    #[derive(Debug, Deserialize)]
    pub struct Results {
        #[serde(default)]
        pub bindings: Vec<Row>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct Binding {
        #[serde(rename = "type")]
        pub kind: String,
        pub value: String,
    }
}
