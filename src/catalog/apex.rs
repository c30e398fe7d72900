use serde::Deserialize;
use tracing::debug;

use crate::catalog::{CatalogProvider, EpisodePage, Mirror, MirrorEntry, SearchResult};
use crate::error::{Error, Result};

const APEX_BASE_URL: &str = "https://anime.apex-cloud.workers.dev/";

/// Client for the apex-cloud catalog worker. Every route is a GET against
/// the base URL selected by the `method` query parameter.
pub struct ApexClient {
    client: reqwest::Client,
}

/// Search responses come back in one of three shapes depending on the
/// worker revision: a bare array, `{data: [...]}`, or `{results: [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Wrapped { data: Vec<SearchResult> },
    Keyed { results: Vec<SearchResult> },
    Bare(Vec<SearchResult>),
}

impl SearchResponse {
    fn into_results(self) -> Vec<SearchResult> {
        match self {
            SearchResponse::Wrapped { data } => data,
            SearchResponse::Keyed { results } => results,
            SearchResponse::Bare(results) => results,
        }
    }
}

impl ApexClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("zenith/0.1")
                .build()
                .expect("Failed to create HTTP client"),
        }
    }
}

impl Default for ApexClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CatalogProvider for ApexClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let url = format!(
            "{}?method=search&query={}",
            APEX_BASE_URL,
            urlencoding::encode(query)
        );

        debug!(url = %url, "Searching catalog");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Error::Catalog(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let shape: SearchResponse = response.json().await?;
        let results = shape.into_results();

        debug!(count = results.len(), "Parsed search results");
        Ok(results)
    }

    async fn episodes(&self, session: &str, page: u32) -> Result<EpisodePage> {
        let url = format!(
            "{}?method=series&session={}&page={}",
            APEX_BASE_URL,
            urlencoding::encode(session),
            page
        );

        debug!(url = %url, page, "Fetching episode page");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Error::Catalog(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let data: EpisodePage = response.json().await?;
        Ok(data)
    }

    async fn mirrors(&self, series_session: &str, episode_session: &str) -> Result<Vec<Mirror>> {
        let url = format!(
            "{}?method=episode&session={}&ep={}",
            APEX_BASE_URL,
            urlencoding::encode(series_session),
            urlencoding::encode(episode_session)
        );

        debug!(url = %url, "Resolving mirrors");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Error::Catalog(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let entries: Vec<MirrorEntry> = response.json().await?;
        Ok(Mirror::from_entries(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEM: &str = r#"{
        "id": 1, "title": "Naruto", "type": "TV", "episodes": 220,
        "status": "Finished Airing", "season": "Fall", "year": 2002,
        "score": 7.99, "poster": "https://example.com/naruto.jpg",
        "session": "abc123"
    }"#;

    #[test]
    fn search_shapes_normalize_identically() {
        let bare = format!("[{}]", ITEM);
        let wrapped = format!(r#"{{"data": [{}]}}"#, ITEM);
        let keyed = format!(r#"{{"results": [{}]}}"#, ITEM);

        for body in [bare, wrapped, keyed] {
            let shape: SearchResponse = serde_json::from_str(&body).unwrap();
            let results = shape.into_results();
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].title, "Naruto");
            assert_eq!(results[0].session, "abc123");
            assert_eq!(results[0].kind, "TV");
        }
    }

    #[test]
    fn empty_shapes_normalize_to_empty() {
        for body in ["[]", r#"{"data": []}"#, r#"{"results": []}"#] {
            let shape: SearchResponse = serde_json::from_str(body).unwrap();
            assert!(shape.into_results().is_empty());
        }
    }
}
