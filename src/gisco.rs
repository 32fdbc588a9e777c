//! Eurostat GISCO distribution API (gisco-services.ec.europa.eu)

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::{error::FetchError, net};

pub const COUNTRIES_URL: &str =
    "https://gisco-services.ec.europa.eu/distribution/v2/countries/geojson/CNTR_RG_60M_2020_4326.geojson";
pub const NUTS_URL: &str =
    "https://gisco-services.ec.europa.eu/distribution/v2/nuts/geojson/NUTS_RG_60M_2021_4326.geojson";
pub const URBAN_AUDIT_CITIES_URL: &str =
    "https://gisco-services.ec.europa.eu/distribution/v2/urau/geojson/URAU_LB_2021_4326_CITIES.geojson";

/// Pause before every download; the files are large.
const THROTTLE: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct GiscoClient {
    http: reqwest::Client,
}

impl GiscoClient {
    pub fn new() -> Result<Self, FetchError> {
        Ok(GiscoClient { http: net::http_client(REQUEST_TIMEOUT)? })
    }

    pub async fn countries(&self) -> Result<schema::FeatureCollection<schema::CountryProperties>, FetchError> {
        self.download(COUNTRIES_URL).await
    }

    pub async fn nuts(&self) -> Result<schema::FeatureCollection<schema::NutsProperties>, FetchError> {
        self.download(NUTS_URL).await
    }

    pub async fn urban_audit_cities(&self) -> Result<schema::FeatureCollection<schema::CityProperties>, FetchError> {
        self.download(URBAN_AUDIT_CITIES_URL).await
    }

    async fn download<P: DeserializeOwned>(&self, url: &str) -> Result<schema::FeatureCollection<P>, FetchError> {
        tokio::time::sleep(THROTTLE).await;
        tracing::info!("Downloading {url}");
        let collection: schema::FeatureCollection<P> =
            net::get_json(&self.http, url, &[], "application/geo+json, application/json").await?;
        tracing::debug!("{url}: {} features", collection.features.len());
        Ok(collection)
    }
}

/// Serde-compatible GeoJSON schema for the GISCO layers in use
pub mod schema {
    use geo_types::Point;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct FeatureCollection<P> {
        pub features: Vec<Feature<P>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Feature<P> {
        pub properties: P,
        #[serde(default)]
        pub geometry: Option<Geometry>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Geometry {
        #[serde(rename = "type")]
        pub kind: String,
        #[serde(default)]
        pub coordinates: serde_json::Value,
    }

    impl Geometry {
        /// Position of a `Point` geometry; other geometries have none.
        pub fn point(&self) -> Option<Point<f64>> {
            if self.kind != "Point" {
                return None;
            }
            let position = self.coordinates.as_array()?;
            let longitude = position.first()?.as_f64()?;
            let latitude = position.get(1)?.as_f64()?;
            Some(Point::new(longitude, latitude))
        }
    }

    impl<P> Feature<P> {
        pub fn point(&self) -> Option<Point<f64>> {
            self.geometry.as_ref().and_then(Geometry::point)
        }
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub struct CountryProperties {
        pub cntr_id: Option<String>,
        pub cntr_name: Option<String>,
        pub name_engl: Option<String>,
        pub iso3_code: Option<String>,
        pub capt: Option<String>,
        pub eu_stat: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub struct NutsProperties {
        pub nuts_id: Option<String>,
        pub levl_code: Option<u8>,
        pub cntr_code: Option<String>,
        pub name_latn: Option<String>,
        pub nuts_name: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub struct CityProperties {
        pub urau_code: Option<String>,
        pub urau_name: Option<String>,
        pub urau_catg: Option<String>,
        pub cntr_code: Option<String>,
        #[serde(rename = "NUTS3_2021")]
        pub nuts3_2021: Option<String>,
        pub fua_code: Option<String>,
        pub area_sqm: Option<f64>,
    }
}

#[cfg(test)]
mod tests {
    use super::schema::*;

    #[test]
    fn decodes_city_features() {
        let raw = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [16.37, 48.21]},
                    "properties": {
                        "URAU_CODE": "AT001C", "URAU_NAME": "Wien", "URAU_CATG": "C",
                        "CNTR_CODE": "AT", "NUTS3_2021": "AT130", "FUA_CODE": "AT001L3",
                        "AREA_SQM": 414870000
                    }
                },
                {"type": "Feature", "geometry": null, "properties": {"URAU_NAME": "Nowhere"}}
            ]
        }"#;
        let collection: FeatureCollection<CityProperties> = serde_json::from_str(raw).unwrap();
        let wien = &collection.features[0];
        assert_eq!(wien.properties.nuts3_2021.as_deref(), Some("AT130"));
        assert_eq!(wien.properties.area_sqm, Some(414_870_000.0));
        let point = wien.point().unwrap();
        assert_eq!((point.x(), point.y()), (16.37, 48.21));

        assert!(collection.features[1].point().is_none());
        assert_eq!(collection.features[1].properties.cntr_code, None);
    }

    #[test]
    fn polygons_have_no_point() {
        let raw = r#"{"features": [{
            "geometry": {"type": "Polygon", "coordinates": [[[1.0, 2.0], [3.0, 4.0], [1.0, 2.0]]]},
            "properties": {"NUTS_ID": "AT13", "LEVL_CODE": 2, "CNTR_CODE": "AT", "NAME_LATN": "Wien"}
        }]}"#;
        let collection: FeatureCollection<NutsProperties> = serde_json::from_str(raw).unwrap();
        let feature = &collection.features[0];
        assert_eq!(feature.properties.levl_code, Some(2));
        assert!(feature.point().is_none());
    }
}
