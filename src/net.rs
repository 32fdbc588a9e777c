//! Shared HTTP plumbing for the remote APIs.

use std::time::Duration;

use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;

use crate::error::FetchError;

pub const USER_AGENT: &str = concat!(
    "geoharvest/",
    env!("CARGO_PKG_VERSION"),
    " (administrative geography fetcher)"
);

pub fn http_client(timeout: Duration) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(FetchError::Client)
}

/// Issues a GET and decodes the JSON body. Any status other than 200 is an error.
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
    accept: &str,
) -> Result<T, FetchError> {
    tracing::trace!("GET {url} {query:?}");
    let response = client.get(url)
        .query(query)
        .header(ACCEPT, accept)
        .send().await
        .map_err(|source| FetchError::Http { url: url.to_owned(), source })?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(FetchError::Status { url: url.to_owned(), status });
    }

    response.json::<T>().await
        .map_err(|source| FetchError::Decode { url: url.to_owned(), source })
}
