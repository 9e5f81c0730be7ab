use crate::error::{FieldViolation, ValidationError};
use crate::models::{RemoteSort, SortOrder};
use serde::Deserialize;

/// GitHub only serves the first 1000 results: 34 pages at the default size.
pub const MAX_PAGE: u32 = 34;
pub const MAX_PER_PAGE: u32 = 100;
pub const DEFAULT_PER_PAGE: u32 = 10;

/// Collapses a blank language to "no filter". Every caller of the query
/// engine and the remote client goes through this.
pub fn normalize_language(language: Option<&str>) -> Option<String> {
    language
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Appends a `language:` qualifier to the free-text query when a language is set.
pub fn build_query(query: &str, language: Option<&str>) -> String {
    match normalize_language(language) {
        Some(language) => format!("{query} language:{language}"),
        None => query.to_string(),
    }
}

/// Raw, unvalidated search parameters as they arrive from a caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub language: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub language: Option<String>,
    pub sort: RemoteSort,
    pub order: SortOrder,
    pub page: u32,
    pub per_page: u32,
}

impl SearchRequest {
    pub fn remote_query(&self) -> String {
        build_query(&self.query, self.language.as_deref())
    }
}

impl SearchParams {
    /// Validates every field and reports all violations at once.
    pub fn validate(self) -> Result<SearchRequest, ValidationError> {
        let mut violations = Vec::new();

        let query = self.query.unwrap_or_default();
        if query.trim().is_empty() {
            violations.push(violation("query", "Query cannot be blank"));
        }

        let sort = match self.sort.as_deref().map(str::trim) {
            None | Some("") => RemoteSort::default(),
            Some(value) => RemoteSort::parse(value).unwrap_or_else(|| {
                violations.push(violation(
                    "sort",
                    format!("Sort must be one of stars, forks, updated (got {value:?})"),
                ));
                RemoteSort::default()
            }),
        };

        let order = match self.order.as_deref().map(str::trim) {
            None | Some("") => SortOrder::default(),
            Some(value) => SortOrder::parse(value).unwrap_or_else(|| {
                violations.push(violation(
                    "order",
                    format!("Order must be asc or desc (got {value:?})"),
                ));
                SortOrder::default()
            }),
        };

        let page = bounded(
            &mut violations,
            "page",
            self.page.as_deref(),
            1,
            (MAX_PAGE, "Page cannot exceed 34 (GitHub API limit)"),
            "Page must be at least 1",
        );
        let per_page = bounded(
            &mut violations,
            "per_page",
            self.per_page.as_deref(),
            DEFAULT_PER_PAGE,
            (MAX_PER_PAGE, "Per page cannot exceed 100"),
            "Per page must be at least 1",
        );

        if !violations.is_empty() {
            return Err(ValidationError { violations });
        }

        Ok(SearchRequest {
            query: query.trim().to_string(),
            language: normalize_language(self.language.as_deref()),
            sort,
            order,
            page,
            per_page,
        })
    }
}

fn bounded(
    violations: &mut Vec<FieldViolation>,
    field: &'static str,
    raw: Option<&str>,
    default: u32,
    (max, above_message): (u32, &str),
    below_message: &str,
) -> u32 {
    let Some(value) = integer(violations, field, raw) else {
        return default;
    };

    if value < 1 {
        violations.push(violation(field, below_message));
        default
    } else if value > i64::from(max) {
        violations.push(violation(field, above_message));
        default
    } else {
        value as u32
    }
}

/// Blank input counts as absent.
fn integer(
    violations: &mut Vec<FieldViolation>,
    field: &'static str,
    raw: Option<&str>,
) -> Option<i64> {
    let raw = raw.map(str::trim).filter(|value| !value.is_empty())?;
    match raw.parse::<i64>() {
        Ok(value) => Some(value),
        Err(_) => {
            violations.push(violation(field, format!("{field} must be an integer")));
            None
        }
    }
}

fn violation(field: &'static str, message: impl Into<String>) -> FieldViolation {
    FieldViolation {
        field,
        message: message.into(),
    }
}

/// Raw parameters for a read query against the local store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordQueryParams {
    pub language: Option<String>,
    pub min_stars: Option<String>,
    pub sort_by: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub language: Option<String>,
    pub min_stars: Option<i64>,
    pub sort_by: Option<String>,
}

impl RecordQueryParams {
    pub fn validate(self) -> Result<RecordQuery, ValidationError> {
        let mut violations = Vec::new();
        let min_stars = integer(&mut violations, "min_stars", self.min_stars.as_deref());

        if !violations.is_empty() {
            return Err(ValidationError { violations });
        }

        Ok(RecordQuery {
            language: normalize_language(self.language.as_deref()),
            min_stars,
            sort_by: self
                .sort_by
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty()),
        })
    }
}
