use crate::error::QueryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExternalOwner {
    #[serde(default)]
    pub login: String,
    pub html_url: Option<String>,
}

/// One repository item as returned by the remote search API.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExternalRecord {
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    pub full_name: Option<String>,
    pub owner: Option<ExternalOwner>,
    pub description: Option<String>,
    pub html_url: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u32,
    #[serde(default)]
    pub forks_count: u32,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ExternalRecord {
    pub fn new(id: Option<i64>, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn owner_login(&self) -> Option<&str> {
        self.owner.as_ref().map(|owner| owner.login.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchPage {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    #[serde(default)]
    pub items: Vec<ExternalRecord>,
}

/// A record ready for insertion; the store assigns its surrogate key.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub external_id: Option<i64>,
    pub name: String,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub popularity: i64,
    pub secondary: i64,
    pub last_activity: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub touched_at: DateTime<Utc>,
}

impl NewRecord {
    pub fn from_external(record: &ExternalRecord, now: DateTime<Utc>) -> Self {
        Self {
            external_id: record.id,
            name: record.name.clone(),
            owner: record.owner_login().map(str::to_string),
            description: record.description.clone(),
            language: record.language.clone(),
            popularity: i64::from(record.stargazers_count),
            secondary: i64::from(record.forks_count),
            last_activity: record.updated_at,
            created_at: now,
            touched_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRecord {
    pub id: i64,
    pub external_id: Option<i64>,
    pub name: String,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub popularity: i64,
    pub secondary: i64,
    pub last_activity: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub touched_at: DateTime<Utc>,
}

impl StoredRecord {
    pub fn html_url(&self) -> Option<String> {
        self.owner
            .as_ref()
            .map(|owner| format!("https://github.com/{}/{}", owner, self.name))
    }
}

/// Ordering for reads against the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortKey {
    #[default]
    Popularity,
    Secondary,
    Recency,
    Name,
}

impl SortKey {
    /// Resolves a sort token. Absent or empty tokens mean popularity;
    /// anything outside the recognized set is rejected.
    pub fn from_token(token: Option<&str>) -> Result<Self, QueryError> {
        match token {
            None | Some("") => Ok(Self::Popularity),
            Some("popularity" | "stars") => Ok(Self::Popularity),
            Some("secondary" | "forks") => Ok(Self::Secondary),
            Some("recency" | "updated") => Ok(Self::Recency),
            Some("name") => Ok(Self::Name),
            Some(other) => Err(QueryError::InvalidSortKey(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RecordFilter {
    pub language: Option<String>,
    pub min_score: Option<i64>,
    pub sort: SortKey,
}

/// Sort field understood by the remote search API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemoteSort {
    #[default]
    Stars,
    Forks,
    Updated,
}

impl RemoteSort {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "stars" => Some(Self::Stars),
            "forks" => Some(Self::Forks),
            "updated" => Some(Self::Updated),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stars => "stars",
            Self::Forks => "forks",
            Self::Updated => "updated",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_tokens_are_case_sensitive_aliases() {
        assert_eq!(SortKey::from_token(None).unwrap(), SortKey::Popularity);
        assert_eq!(SortKey::from_token(Some("")).unwrap(), SortKey::Popularity);
        assert_eq!(SortKey::from_token(Some("stars")).unwrap(), SortKey::Popularity);
        assert_eq!(SortKey::from_token(Some("forks")).unwrap(), SortKey::Secondary);
        assert_eq!(SortKey::from_token(Some("updated")).unwrap(), SortKey::Recency);
        assert_eq!(SortKey::from_token(Some("name")).unwrap(), SortKey::Name);
        assert!(matches!(
            SortKey::from_token(Some("Name")),
            Err(QueryError::InvalidSortKey(token)) if token == "Name"
        ));
    }

    #[test]
    fn external_record_decodes_github_item() {
        let payload = r#"{
            "id": 42,
            "name": "tokio",
            "full_name": "tokio-rs/tokio",
            "owner": {"login": "tokio-rs", "id": 1, "type": "Organization"},
            "description": "A runtime",
            "language": "Rust",
            "stargazers_count": 25000,
            "watchers_count": 25000,
            "forks_count": 2300,
            "updated_at": "2024-05-01T10:00:00Z",
            "topics": ["async"]
        }"#;

        let record: ExternalRecord = serde_json::from_str(payload).unwrap();
        assert_eq!(record.id, Some(42));
        assert_eq!(record.owner_login(), Some("tokio-rs"));
        assert_eq!(record.stargazers_count, 25000);
        assert_eq!(record.forks_count, 2300);
        assert!(record.updated_at.is_some());
    }

    #[test]
    fn mapping_copies_scores_and_stamps_both_timestamps() {
        let now = Utc::now();
        let record = ExternalRecord {
            owner: Some(ExternalOwner {
                login: "rust-lang".to_string(),
                html_url: None,
            }),
            language: Some("Rust".to_string()),
            stargazers_count: 90_000,
            forks_count: 12_000,
            ..ExternalRecord::new(Some(7), "rust")
        };

        let mapped = NewRecord::from_external(&record, now);
        assert_eq!(mapped.external_id, Some(7));
        assert_eq!(mapped.owner.as_deref(), Some("rust-lang"));
        assert_eq!(mapped.popularity, 90_000);
        assert_eq!(mapped.secondary, 12_000);
        assert_eq!(mapped.created_at, mapped.touched_at);
    }
}
