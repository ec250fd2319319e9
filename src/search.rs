//! # Catalog Search Module
//!
//! Turns a user query plus optional narrowing tokens into a [`SearchPlan`]:
//! a set of case-insensitive regular expressions that every store evaluates
//! the same way. Patterns are written in the `regex` crate dialect and carry
//! a PostgreSQL rendition for the SQL backend.

use regex::{Regex, RegexBuilder};

use crate::db::MediaStore;
use crate::errors::SearchError;
use crate::media::Media;

/// Default page size for search results
pub const DEFAULT_MAX_RESULTS: i64 = 10;

/// Characters treated as word separators in file names
const SEPARATOR_CLASS: &str = r"[._+-]";

/// A compiled case-insensitive pattern and its PostgreSQL form
#[derive(Debug, Clone)]
pub struct NamePattern {
    regex: Regex,
    postgres: String,
}

impl NamePattern {
    pub fn new(pattern: &str) -> Result<Self, SearchError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| SearchError::InvalidQuery(e.to_string()))?;
        Ok(Self {
            regex,
            postgres: to_postgres_regex(pattern),
        })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Pattern for PostgreSQL's `~*` operator
    pub fn postgres(&self) -> &str {
        &self.postgres
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}

/// Rewrite word boundaries (`\b`) to PostgreSQL's `\y`
fn to_postgres_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('b') => out.push_str(r"\y"),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Build the raw pattern for a text query
///
/// * empty query: match anything
/// * filter mode: separator-bounded, spaces match a single separator
/// * single word: bounded by word boundaries or separators
/// * several words: loose match with anything between the words
pub fn build_query_pattern(query: &str, filter_mode: bool) -> String {
    let query = query.trim();
    let separator = format!(r"(\s|{SEPARATOR_CLASS})");

    if query.is_empty() {
        ".".to_string()
    } else if filter_mode {
        let inner = query.replace(' ', &separator);
        format!("{separator}{inner}{separator}")
    } else if !query.contains(' ') {
        let boundary = format!(r"(\b|{SEPARATOR_CLASS})");
        format!("{boundary}{query}{boundary}")
    } else {
        query.replace(' ', r".*[\s._+-]")
    }
}

/// Parameters of a catalog search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub file_type: Option<String>,
    pub max_results: i64,
    pub offset: i64,
    /// Require separators around the whole pattern instead of word bounds
    pub filter: bool,
    // Narrowing tokens; inline queries only set `file_type`
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub language: Option<String>,
    pub quality: Option<String>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            file_type: None,
            max_results: DEFAULT_MAX_RESULTS,
            offset: 0,
            filter: false,
            season: None,
            episode: None,
            language: None,
            quality: None,
        }
    }
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// Compiled predicate over media records
#[derive(Debug, Clone)]
pub struct SearchPlan {
    /// Text pattern, applied to the name (and caption when enabled)
    pub text: NamePattern,
    pub include_caption: bool,
    pub file_type: Option<String>,
    /// Season/episode/language/quality tokens, each required on the name
    pub name_constraints: Vec<NamePattern>,
}

impl SearchPlan {
    pub fn from_request(request: &SearchRequest, use_caption: bool) -> Result<Self, SearchError> {
        let text = NamePattern::new(&build_query_pattern(&request.query, request.filter))?;

        let mut name_constraints = Vec::new();
        if let Some(season) = request.season.filter(|&s| s > 0) {
            name_constraints.push(NamePattern::new(&format!("S{season:02}"))?);
        }
        if let Some(episode) = request.episode.filter(|&e| e > 0) {
            name_constraints.push(NamePattern::new(&format!("E{episode:02}"))?);
        }
        for token in [&request.language, &request.quality].into_iter().flatten() {
            let token = token.trim();
            if !token.is_empty() {
                name_constraints.push(NamePattern::new(&format!(
                    r"\b{}\b",
                    regex::escape(token)
                ))?);
            }
        }

        Ok(Self {
            text,
            include_caption: use_caption,
            file_type: request.file_type.clone().filter(|t| !t.is_empty()),
            name_constraints,
        })
    }

    /// Evaluate the plan against a record, as the SQL backend would
    pub fn matches(&self, media: &Media) -> bool {
        let text_hit = self.text.is_match(&media.file_name)
            || (self.include_caption
                && media
                    .caption
                    .as_deref()
                    .is_some_and(|caption| self.text.is_match(caption)));

        text_hit
            && self
                .file_type
                .as_ref()
                .is_none_or(|wanted| media.file_type.as_deref() == Some(wanted.as_str()))
            && self
                .name_constraints
                .iter()
                .all(|constraint| constraint.is_match(&media.file_name))
    }
}

/// One page of search results
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub files: Vec<Media>,
    /// Offset of the next page, when more results remain
    pub next_offset: Option<i64>,
    pub total_results: i64,
}

/// Run a search and compute the pagination cursor
pub async fn get_search_results(
    store: &dyn MediaStore,
    request: &SearchRequest,
    use_caption: bool,
) -> Result<SearchPage, SearchError> {
    let plan = SearchPlan::from_request(request, use_caption)?;
    let offset = request.offset.max(0);
    let (files, total_results) = store
        .search_media(&plan, offset, request.max_results)
        .await?;

    let next = offset.saturating_add(request.max_results.max(0));
    Ok(SearchPage {
        files,
        next_offset: (total_results > next).then_some(next),
        total_results,
    })
}
