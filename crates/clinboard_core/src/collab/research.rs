//! Research search collaborator.
//!
//! # Responsibility
//! - Define the search contract of the research feature.
//! - Turn a research hit into a board task linked back to its record.
//!
//! # Invariants
//! - Tasks created from research carry `sourceType = "research"` and
//!   `relatedContextId = <record id>`, which is what
//!   `BoardState::tasks_for_context` queries.

use crate::board::effect::{Effect, TaskPosition};
use crate::model::column::ColumnId;
use crate::model::task::{TaskId, TaskMetadata, META_RELATED_CONTEXT_ID, META_SOURCE_TYPE};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// `sourceType` value of tasks created from research results.
pub const SOURCE_TYPE_RESEARCH: &str = "research";
/// Upper bound on results requested per search.
pub const MAX_SEARCH_LIMIT: usize = 50;

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResearchError {
    EmptyQuery,
    Unavailable(String),
    /// Service answered with a record the board cannot use.
    InvalidRecord(String),
}

impl Display for ResearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyQuery => write!(f, "search query cannot be empty"),
            Self::Unavailable(message) => write!(f, "research service unavailable: {message}"),
            Self::InvalidRecord(message) => write!(f, "invalid research record: {message}"),
        }
    }
}

impl Error for ResearchError {}

pub trait ResearchService {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<ResearchRecord>, ResearchError>;
}

/// Runs a trimmed, bounded search and drops records without an id.
pub fn search_records<S: ResearchService + ?Sized>(
    service: &S,
    query: &str,
    limit: usize,
) -> Result<Vec<ResearchRecord>, ResearchError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ResearchError::EmptyQuery);
    }
    let limit = limit.clamp(1, MAX_SEARCH_LIMIT);

    let mut records = service.search(query, limit).map_err(|err| {
        warn!("event=research_search module=collab status=error error={err}");
        err
    })?;
    let returned = records.len();
    records.retain(|record| !record.id.trim().is_empty());
    records.truncate(limit);
    info!(
        "event=research_search module=collab status=ok returned={} kept={}",
        returned,
        records.len()
    );
    Ok(records)
}

/// Builds the `CreateTask` effect that files `record` into `column_id`.
pub fn task_effect_from_record(
    record: &ResearchRecord,
    column_id: ColumnId,
    temp_prefix: &str,
) -> Result<Effect, ResearchError> {
    let context_id = record.id.trim();
    if context_id.is_empty() {
        return Err(ResearchError::InvalidRecord("record has no id".to_string()));
    }
    let content = if record.title.trim().is_empty() {
        record.summary.trim()
    } else {
        record.title.trim()
    };
    if content.is_empty() {
        return Err(ResearchError::InvalidRecord(format!(
            "record `{context_id}` has no title or summary"
        )));
    }

    let mut metadata = TaskMetadata::new();
    metadata.insert(
        META_SOURCE_TYPE.to_string(),
        Value::String(SOURCE_TYPE_RESEARCH.to_string()),
    );
    metadata.insert(
        META_RELATED_CONTEXT_ID.to_string(),
        Value::String(context_id.to_string()),
    );

    Ok(Effect::CreateTask {
        task_id: TaskId::temporary(temp_prefix),
        column_id,
        content: content.to_string(),
        metadata,
        position: TaskPosition::End,
    })
}
