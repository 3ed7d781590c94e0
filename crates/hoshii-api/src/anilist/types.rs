use serde::Deserialize;

use crate::traits::CatalogRecord;

// ── GraphQL response wrappers ────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQLErrorMessage>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLErrorMessage {
    pub message: String,
    pub status: Option<u16>,
}

// ── Batch media lookup ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PageResponse {
    #[serde(rename = "Page")]
    pub page: PageData,
}

#[derive(Debug, Deserialize)]
pub struct PageData {
    #[serde(rename = "pageInfo", default)]
    pub page_info: PageInfo,
    #[serde(default)]
    pub media: Vec<AniListMedia>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageInfo {
    #[serde(rename = "hasNextPage", default)]
    pub has_next_page: bool,
}

#[derive(Debug, Deserialize)]
pub struct AniListMedia {
    pub id: u64,
    pub title: Option<AniListTitle>,
    #[serde(rename = "coverImage")]
    pub cover_image: Option<CoverImage>,
    #[serde(rename = "averageScore")]
    pub average_score: Option<u32>,
    pub episodes: Option<u32>,
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AniListTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CoverImage {
    pub large: Option<String>,
}

// ── Conversions ──────────────────────────────────────────────────

impl AniListTitle {
    /// English title when present, romaji otherwise.
    pub fn display(&self) -> Option<&str> {
        non_empty(&self.english).or_else(|| non_empty(&self.romaji))
    }
}

impl AniListMedia {
    pub fn into_catalog_record(self) -> CatalogRecord {
        let title = self
            .title
            .as_ref()
            .and_then(AniListTitle::display)
            .unwrap_or("Unknown")
            .to_string();

        CatalogRecord {
            id: self.id,
            title,
            cover_url: self.cover_image.and_then(|c| c.large),
            average_score: self.average_score,
            episodes: self.episodes,
            format: self.format,
        }
    }
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.trim().is_empty())
}
