use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A monitored competitor; owns tracked links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competitor {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Category of a tracked page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Pricing,
    Docs,
    Changelog,
    Other,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Pricing => "pricing",
            LinkType::Docs => "docs",
            LinkType::Changelog => "changelog",
            LinkType::Other => "other",
        }
    }
}

impl FromStr for LinkType {
    type Err = Infallible;

    /// Unknown categories collapse into `Other` rather than failing.
    fn from_str(s: &str) -> std::result::Result<Self, Infallible> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "pricing" => LinkType::Pricing,
            "docs" => LinkType::Docs,
            "changelog" => LinkType::Changelog,
            _ => LinkType::Other,
        })
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked URL belonging to a competitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: Uuid,
    pub competitor_id: Uuid,
    pub url: String,
    pub link_type: LinkType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Success,
    Error,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Success => "success",
            CheckStatus::Error => "error",
        }
    }
}

impl FromStr for CheckStatus {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(CheckStatus::Success),
            "error" => Ok(CheckStatus::Error),
            other => Err(MonitorError::General(format!(
                "unknown check status: {other}"
            ))),
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fetch-and-record attempt for a link. Append-only: a failed fetch
/// is itself a recorded data point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Check {
    pub id: Uuid,
    pub link_id: Uuid,
    pub content: String,
    pub text_content: String,
    pub status: CheckStatus,
    pub error_msg: Option<String>,
    pub check_date: DateTime<Utc>,
}

/// Delta record produced by comparing a check to its predecessor.
/// Zero or one per check; only created when the rendered diff is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    pub id: Uuid,
    pub check_id: Uuid,
    pub diff_text: String,
    pub summary: Option<String>,
    pub has_significant: bool,
    /// JSON-serialized `Vec<Snippet>`, when summarization produced any.
    pub snippets: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A short extracted quote with contextual citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub text: String,
    pub citation: String,
}

/// Per-link element of a batch check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub link_id: Uuid,
    pub check_id: Uuid,
    pub status: CheckStatus,
}

/// Raw markup plus the visible text derived from it.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
            timeout_seconds: 15,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Link not found: {id}")]
    LinkNotFound { id: Uuid },

    #[error("No links found for competitor {id}")]
    NoLinks { id: Uuid },

    #[error("Summarization failed: {0}")]
    Summarization(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
