use reqwest::Client;

use super::error::AniListError;
use super::types::{AniListMedia, GraphQLResponse, PageResponse};
use crate::traits::{CatalogProvider, CatalogRecord};

pub const API_URL: &str = "https://graphql.anilist.co";

/// Largest page AniList serves. Longer `id_in` lookups are paged.
pub const MAX_PER_PAGE: usize = 50;

const MEDIA_BY_IDS_QUERY: &str = r#"
query ($ids: [Int], $page: Int, $perPage: Int) {
    Page(page: $page, perPage: $perPage) {
        pageInfo { hasNextPage }
        media(id_in: $ids, type: ANIME) {
            id
            title { romaji english }
            coverImage { large }
            averageScore
            episodes
            format
        }
    }
}
"#;

/// AniList GraphQL API client.
///
/// Only public queries are issued, so no access token is needed.
pub struct AniListClient {
    endpoint: String,
    http: Client,
}

impl Default for AniListClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AniListClient {
    pub fn new() -> Self {
        Self::with_endpoint(API_URL)
    }

    /// Point the client at another AniList-compatible endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn graphql_request<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, AniListError> {
        tracing::debug!(operation, "AniList GraphQL request");

        let resp = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&serde_json::json!({
                "query": query,
                "variables": variables,
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(operation, status = status_code, "AniList API error");
            return Err(AniListError::Api {
                status: status_code,
                message: body,
            });
        }

        tracing::debug!(operation, status = %status, "AniList response received");
        let envelope = resp
            .json::<GraphQLResponse<T>>()
            .await
            .map_err(|e| AniListError::Parse(e.to_string()))?;

        match envelope.data {
            Some(data) => {
                if !envelope.errors.is_empty() {
                    tracing::warn!(
                        operation,
                        errors = envelope.errors.len(),
                        "AniList returned partial data"
                    );
                }
                Ok(data)
            }
            None => {
                let message = envelope
                    .errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join("; ");
                Err(AniListError::GraphQL(if message.is_empty() {
                    "response carried no data".into()
                } else {
                    message
                }))
            }
        }
    }

    /// Look up many anime, following `pageInfo` until every page is read (raw types).
    async fn media_by_ids(&self, ids: &[u64]) -> Result<Vec<AniListMedia>, AniListError> {
        // Each page holds at least one requested id, so this bounds a misbehaving server.
        let max_pages = ids.len().div_ceil(MAX_PER_PAGE).max(1) as u32;
        let mut media = Vec::with_capacity(ids.len());
        let mut page = 1;

        loop {
            let resp: PageResponse = self
                .graphql_request("MediaByIds", MEDIA_BY_IDS_QUERY, batch_variables(ids, page))
                .await?;
            media.extend(resp.page.media);

            if !resp.page.page_info.has_next_page {
                break;
            }
            if page >= max_pages {
                tracing::warn!(
                    requested = ids.len(),
                    pages = page,
                    "AniList kept reporting more pages than the lookup needs"
                );
                break;
            }
            page += 1;
        }

        tracing::debug!(requested = ids.len(), found = media.len(), pages = page, "Batch lookup done");
        Ok(media)
    }
}

impl CatalogProvider for AniListClient {
    type Error = AniListError;

    async fn fetch_by_ids(&self, ids: &[u64]) -> Result<Vec<CatalogRecord>, AniListError> {
        let media = self.media_by_ids(ids).await?;
        Ok(media
            .into_iter()
            .map(AniListMedia::into_catalog_record)
            .collect())
    }
}

fn batch_variables(ids: &[u64], page: u32) -> serde_json::Value {
    serde_json::json!({
        "ids": ids,
        "page": page,
        "perPage": MAX_PER_PAGE,
    })
}
