use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

pub mod apex;

pub use apex::ApexClient;

/// One entry from a catalog search. `session` is the opaque key every
/// follow-up request is scoped by; the remaining fields are display data
/// and tolerate absence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub episodes: u32,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub season: String,
    #[serde(default)]
    pub year: u32,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub poster: String,
    pub session: String,
}

/// One server-driven page of a series' episode list. `total_pages` always
/// comes from the response, never from local arithmetic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodePage {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub total: u32,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "first_page")]
    pub total_pages: u32,
    #[serde(default)]
    pub next: NextPage,
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

fn first_page() -> u32 {
    1
}

/// The service reports the next-page indicator as a bool or as a URL string
/// depending on the route that answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NextPage {
    Available(bool),
    Url(String),
}

impl Default for NextPage {
    fn default() -> Self {
        NextPage::Available(false)
    }
}

impl NextPage {
    pub fn available(&self) -> bool {
        match self {
            NextPage::Available(b) => *b,
            NextPage::Url(s) => !s.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    #[serde(deserialize_with = "label_from_value")]
    pub episode: String,
    pub session: String,
    #[serde(default)]
    pub snapshot: String,
}

/// Episode labels arrive as JSON numbers for regular episodes and strings
/// for specials ("12.5", "OVA").
fn label_from_value<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    Sub,
    Dub,
}

impl TrackKind {
    pub fn as_display(&self) -> &'static str {
        match self {
            TrackKind::Sub => "Subtitled",
            TrackKind::Dub => "Dubbed",
        }
    }
}

/// A named, directly playable URL for an episode, tagged with its track
/// group. The service does not label tracks; the kind is assigned once at
/// normalization from list position (first three entries sub, the rest dub)
/// and everything downstream reads the field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mirror {
    pub name: String,
    pub url: String,
    pub track: TrackKind,
}

impl Mirror {
    pub fn from_entries(entries: Vec<MirrorEntry>) -> Vec<Mirror> {
        entries
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| Mirror {
                name: entry.name,
                url: entry.link,
                track: if idx < 3 {
                    TrackKind::Sub
                } else {
                    TrackKind::Dub
                },
            })
            .collect()
    }
}

/// Wire format of one mirror: a bare `{link, name}` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorEntry {
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub name: String,
}

#[async_trait::async_trait]
pub trait CatalogProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>>;
    async fn episodes(&self, session: &str, page: u32) -> Result<EpisodePage>;
    async fn mirrors(&self, series_session: &str, episode_session: &str) -> Result<Vec<Mirror>>;
}
