//! MediaWiki action API of a Wikipedia edition.
//!
//! [`WikipediaClient::parse_page`] fetches rendered article HTML.
//! [`WikipediaClient::wikibase_ids`] maps article titles to the knowledge-base
//! ids of the items they describe.

use std::{collections::HashMap, time::Duration};

use itertools::Itertools;

use crate::{error::FetchError, net, wikidata::BATCH_SIZE};

pub mod table;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct WikipediaClient {
    http: reqwest::Client,
    endpoint: String,
}

impl WikipediaClient {
    /// `endpoint` is the wiki's `api.php`, e.g. `https://bs.wikipedia.org/w/api.php`.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, FetchError> {
        Ok(WikipediaClient {
            http: net::http_client(REQUEST_TIMEOUT)?,
            endpoint: endpoint.into(),
        })
    }

    pub async fn parse_page(&self, page: &str) -> Result<String, FetchError> {
        tracing::debug!("Parsing page {page:?}");
        let response: schema::ParseResponse = net::get_json(
            &self.http,
            &self.endpoint,
            &[("action", "parse"), ("page", page), ("prop", "text"), ("format", "json")],
            "application/json",
        ).await?;
        Ok(response.parse.text.html)
    }

    /// Titles without a linked item are absent from the result.
    pub async fn wikibase_ids(&self, titles: &[String]) -> Result<HashMap<String, String>, FetchError> {
        wikibase_ids(self, titles).await
    }
}

/// Anything that answers `prop=pageprops` lookups for one batch of titles.
#[allow(async_fn_in_trait)]
pub trait PagePropsSource {
    async fn page_props(&self, titles: &[String]) -> Result<schema::Query, FetchError>;
}

impl PagePropsSource for WikipediaClient {
    async fn page_props(&self, titles: &[String]) -> Result<schema::Query, FetchError> {
        let joined = titles.join("|");
        let response: schema::QueryResponse = net::get_json(
            &self.http,
            &self.endpoint,
            &[
                ("action", "query"),
                ("prop", "pageprops"),
                ("ppprop", "wikibase_item"),
                ("titles", &joined),
                ("format", "json"),
            ],
            "application/json",
        ).await?;
        Ok(response.query)
    }
}

/// Title to item id, looked up at most [`BATCH_SIZE`] titles at a time.
/// Titles without a linked item are absent from the result.
pub async fn wikibase_ids<S: PagePropsSource>(
    source: &S,
    titles: &[String],
) -> Result<HashMap<String, String>, FetchError> {
    let mut title_to_id = HashMap::new();
    let batches = titles
        .iter()
        .unique()
        .chunks(BATCH_SIZE)
        .into_iter()
        .map(|chunk| chunk.cloned().collect())
        .collect::<Vec<Vec<String>>>();

    for batch in batches {
        let query = source.page_props(&batch).await?;
        tracing::debug!("({:13}): linked {} titles", format!("{} titles", batch.len()), query.pages.len());
        title_to_id.extend(query.title_ids());
    }
    Ok(title_to_id)
}

/// Serde-compatible response schema for `action=parse` and `action=query`
pub mod schema {
    use std::collections::HashMap;

    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct ParseResponse {
        pub parse: Parse,
    }

    #[derive(Debug, Deserialize)]
    pub struct Parse {
        pub text: ParseText,
    }

    #[derive(Debug, Deserialize)]
    pub struct ParseText {
        #[serde(rename = "*")]
        pub html: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct QueryResponse {
        #[serde(default)]
        pub query: Query,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct Query {
        /// Requested titles the API rewrote before lookup.
        #[serde(default)]
        pub normalized: Vec<Rename>,
        #[serde(default)]
        pub redirects: Vec<Rename>,
        #[serde(default)]
        pub pages: HashMap<String, Page>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Rename {
        pub from: String,
        pub to: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct Page {
        pub title: Option<String>,
        #[serde(default)]
        pub pageprops: PageProps,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct PageProps {
        pub wikibase_item: Option<String>,
    }

    impl Query {
        /// Page title to item id, keyed by the title as it was requested.
        pub fn title_ids(&self) -> HashMap<String, String> {
            let mut ids: HashMap<String, String> = self.pages
                .values()
                .filter_map(|page| Some((page.title.clone()?, page.pageprops.wikibase_item.clone()?)))
                .collect();
            for rename in self.redirects.iter().rev().chain(self.normalized.iter().rev()) {
                if let Some(id) = ids.get(&rename.to).cloned() {
                    ids.entry(rename.from.clone()).or_insert(id);
                }
            }
            ids
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::schema::{Page, PageProps, Query, QueryResponse};
    use super::*;

    /// Links every title to `Q<length of title>` and records batch sizes.
    #[derive(Default)]
    struct Pages {
        batches: Mutex<Vec<usize>>,
        fail: bool,
    }

    impl PagePropsSource for Pages {
        async fn page_props(&self, titles: &[String]) -> Result<Query, FetchError> {
            self.batches.lock().unwrap().push(titles.len());
            if self.fail {
                return Err(FetchError::Status {
                    url: "memory://pageprops".to_owned(),
                    status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                });
            }
            let pages = titles
                .iter()
                .enumerate()
                .map(|(i, title)| {
                    let page = Page {
                        title: Some(title.clone()),
                        pageprops: PageProps { wikibase_item: Some(format!("Q{}", title.len())) },
                    };
                    (i.to_string(), page)
                })
                .collect();
            Ok(Query { pages, ..Default::default() })
        }
    }

    #[tokio::test]
    async fn looks_up_titles_forty_at_a_time() {
        let mut titles: Vec<String> = (0..95).map(|i| "x".repeat(i + 1)).collect();
        titles.extend(titles[..10].to_vec());
        let pages = Pages::default();

        let ids = wikibase_ids(&pages, &titles).await.unwrap();

        assert_eq!(*pages.batches.lock().unwrap(), [40, 40, 15]);
        assert_eq!(ids.len(), 95);
        assert_eq!(ids["xxx"], "Q3");
    }

    #[tokio::test]
    async fn lookup_failures_propagate() {
        let pages = Pages { fail: true, ..Default::default() };
        let err = wikibase_ids(&pages, &["Kakanj".to_owned()]).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { .. }));
    }

    #[test]
    fn maps_normalized_titles_back() {
        let raw = r#"{
            "batchcomplete": "",
            "query": {
                "normalized": [{"from": "banja_Luka", "to": "Banja Luka"}],
                "pages": {
                    "1": {"pageid": 1, "ns": 0, "title": "Banja Luka", "pageprops": {"wikibase_item": "Q1969"}},
                    "2": {"pageid": 2, "ns": 0, "title": "Bihać", "pageprops": {"wikibase_item": "Q188775"}},
                    "-1": {"ns": 0, "title": "Nepostojeća", "missing": ""}
                }
            }
        }"#;
        let response: QueryResponse = serde_json::from_str(raw).unwrap();
        let ids = response.query.title_ids();

        assert_eq!(ids["Banja Luka"], "Q1969");
        assert_eq!(ids["banja_Luka"], "Q1969");
        assert_eq!(ids["Bihać"], "Q188775");
        assert!(!ids.contains_key("Nepostojeća"));
    }

    #[test]
    fn follows_normalization_then_redirect() {
        let raw = r#"{"query": {
            "normalized": [{"from": "opcina Kakanj", "to": "Opcina Kakanj"}],
            "redirects": [{"from": "Opcina Kakanj", "to": "Kakanj"}],
            "pages": {"7": {"title": "Kakanj", "pageprops": {"wikibase_item": "Q1000"}}}
        }}"#;
        let response: QueryResponse = serde_json::from_str(raw).unwrap();
        let ids = response.query.title_ids();

        assert_eq!(ids["opcina Kakanj"], "Q1000");
        assert_eq!(ids["Opcina Kakanj"], "Q1000");
    }
}
