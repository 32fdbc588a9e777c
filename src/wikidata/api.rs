//! `wbgetentities` endpoint of the Wikidata action API (www.wikidata.org)

use crate::{error::FetchError, net};

pub const WIKIDATA_API: &str = "https://www.wikidata.org/w/api.php";

/// Looks up labels and claims of up to 40 ids, pipe-delimited.
/// Unknown ids come back flagged `missing` instead of failing the request.
pub async fn get_entities(
    client: &reqwest::Client,
    endpoint: &str,
    ids: &[String],
    languages: &str,
) -> Result<schema::Response, FetchError> {
    tracing::debug!("({:13}): Issuing wbgetentities query...", format!("{} ids", ids.len()));
    let ids = ids.join("|");
    net::get_json(
        client,
        endpoint,
        &[
            ("action", "wbgetentities"),
            ("ids", &ids),
            ("props", "labels|claims"),
            ("languages", languages),
            ("format", "json"),
        ],
        "application/json",
    ).await
}

/// Serde-compatible response schema for `wbgetentities`
pub mod schema {
    use std::collections::HashMap;

    use geo_types::Point;
    use serde::Deserialize;
    use serde_json::Value;

    #[derive(Debug, Deserialize)]
    pub struct Response {
        #[serde(default)]
        pub entities: HashMap<String, RawEntity>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawEntity {
        /// Present (usually empty) when the id does not exist.
        #[serde(default)]
        pub missing: Option<String>,
        #[serde(default)]
        pub labels: HashMap<String, Label>,
        #[serde(default)]
        pub claims: HashMap<String, Vec<Claim>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Label {
        pub value: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct Claim {
        pub mainsnak: Snak,
    }

    /// `novalue` / `somevalue` snaks carry no `datavalue`.
    #[derive(Debug, Deserialize)]
    pub struct Snak {
        #[serde(default)]
        pub datavalue: Option<DataValue>,
    }

    #[derive(Debug, Deserialize)]
    pub struct DataValue {
        pub value: Value,
    }

    impl RawEntity {
        fn values<'a>(&'a self, property: &str) -> impl Iterator<Item = Option<&'a Value>> + 'a {
            self.claims
                .get(property)
                .into_iter()
                .flatten()
                .map(|claim| claim.mainsnak.datavalue.as_ref().map(|dv| &dv.value))
        }

        /// Item ids a property points at, in claim order.
        pub fn item_targets<'a>(&'a self, property: &str) -> impl Iterator<Item = String> + 'a {
            self.values(property)
                .flatten()
                .filter_map(|value| value.get("id").and_then(Value::as_str))
                .map(str::to_owned)
        }

        /// Only the first claim counts; a first claim without a value means no coordinates.
        pub fn first_coordinate(&self, property: &str) -> Option<Point<f64>> {
            let value = self.values(property).next()??;
            let latitude = value.get("latitude").and_then(Value::as_f64)?;
            let longitude = value.get("longitude").and_then(Value::as_f64)?;
            Some(Point::new(longitude, latitude))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::schema::Response;
    use crate::wikidata::Entity;

    const SAMPLE: &str = r#"{
        "entities": {
            "Q18276": {
                "id": "Q18276",
                "labels": {
                    "bs": {"language": "bs", "value": "Kanton Sarajevo"},
                    "en": {"language": "en", "value": "Sarajevo Canton"}
                },
                "claims": {
                    "P31": [
                        {"mainsnak": {"snaktype": "value", "datavalue": {"value": {"entity-type": "item", "numeric-id": 18279, "id": "Q18279"}, "type": "wikibase-entityid"}}},
                        {"mainsnak": {"snaktype": "novalue"}}
                    ],
                    "P131": [
                        {"mainsnak": {"snaktype": "value", "datavalue": {"value": {"id": "Q11198"}, "type": "wikibase-entityid"}}},
                        {"mainsnak": {"snaktype": "value", "datavalue": {"value": {"id": "Q225"}, "type": "wikibase-entityid"}}}
                    ],
                    "P625": [
                        {"mainsnak": {"snaktype": "value", "datavalue": {"value": {"latitude": 43.85, "longitude": 18.38, "globe": "http://www.wikidata.org/entity/Q2"}, "type": "globecoordinate"}}},
                        {"mainsnak": {"snaktype": "value", "datavalue": {"value": {"latitude": 1.0, "longitude": 2.0}, "type": "globecoordinate"}}}
                    ]
                }
            },
            "Q999999999": {"id": "Q999999999", "missing": ""}
        }
    }"#;

    #[test]
    fn projects_raw_entities() {
        let response: Response = serde_json::from_str(SAMPLE).unwrap();
        let mut entities: Vec<Entity> = response.entities
            .into_iter()
            .filter_map(|(id, raw)| Entity::from_raw(id, raw))
            .collect();

        assert_eq!(entities.len(), 1);
        let canton = entities.pop().unwrap();
        assert_eq!(canton.id, "Q18276");
        assert_eq!(canton.labels["bs"], "Kanton Sarajevo");
        assert_eq!(canton.types.iter().collect::<Vec<_>>(), ["Q18279"]);
        assert_eq!(canton.parents, ["Q11198", "Q225"]);
        assert_eq!(canton.latitude(), Some(43.85));
        assert_eq!(canton.longitude(), Some(18.38));
    }

    #[test]
    fn first_coordinate_claim_without_value_means_none() {
        let raw = r#"{"entities": {"Q1": {"claims": {"P625": [
            {"mainsnak": {"snaktype": "somevalue"}},
            {"mainsnak": {"snaktype": "value", "datavalue": {"value": {"latitude": 1.0, "longitude": 2.0}}}}
        ]}}}}"#;
        let response: Response = serde_json::from_str(raw).unwrap();
        let (id, raw) = response.entities.into_iter().next().unwrap();
        let entity = Entity::from_raw(id, raw).unwrap();
        assert_eq!(entity.coordinates, None);
        assert!(entity.labels.is_empty());
    }

    #[test]
    fn tolerates_error_payloads() {
        let response: Response = serde_json::from_str(r#"{"error": {"code": "no-such-entity"}}"#).unwrap();
        assert!(response.entities.is_empty());
    }
}
