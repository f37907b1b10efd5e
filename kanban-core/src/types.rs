use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A unit of work belonging to exactly one list.
///
/// Positions are zero-based sort keys within the owning list. The server is
/// the only party that assigns identifiers; a card never exists client-side
/// before the server has acknowledged its creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub list_id: i64,
    pub position: i64,
    pub created_by: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_name: Option<String>,
    /// Assignees, cardinality >= 0. The legacy wire form carried a single
    /// `assignedTo` id; it is accepted on input as the one-element case.
    #[serde(
        default,
        alias = "assignedTo",
        deserialize_with = "de_assignee_ids",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub assignee_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_by_name: Option<String>,
    /// Calendar date only, no time-of-day semantics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// First assignee, for single-assignee call sites.
    pub fn assigned_to(&self) -> Option<i64> {
        self.assignee_ids.first().copied()
    }
}

/// An ordered column of cards within a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub id: i64,
    pub name: String,
    pub board_id: i64,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub cards: Vec<Card>,
}

/// Top-level container of ordered lists, owned by a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub workspace_id: i64,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub lists: Vec<List>,
}

impl Board {
    /// Locate a card by id across all lists. Returns (list index, card index).
    pub fn find_card(&self, card_id: i64) -> Option<(usize, usize)> {
        self.lists.iter().enumerate().find_map(|(li, list)| {
            list.cards
                .iter()
                .position(|c| c.id == card_id)
                .map(|ci| (li, ci))
        })
    }

    pub fn list(&self, list_id: i64) -> Option<&List> {
        self.lists.iter().find(|l| l.id == list_id)
    }

    pub fn list_mut(&mut self, list_id: i64) -> Option<&mut List> {
        self.lists.iter_mut().find(|l| l.id == list_id)
    }
}

/// Workspace summary as returned by the workspace endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub owner_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Title must not be empty")]
    EmptyTitle,
}

/// Trim and validate a card or list title. Rejected input never reaches the
/// store or the wire.
pub fn validate_title(title: &str) -> Result<String, ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(trimmed.to_string())
}

/// Accepts either the list form (`assigneeIds: [1, 2]`) or the legacy single
/// id form (`assignedTo: 1`), including an explicit null.
fn de_assignee_ids<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(i64),
        Many(Vec<i64>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(id)) => vec![id],
        Some(OneOrMany::Many(ids)) => ids,
    })
}
