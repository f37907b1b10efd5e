/// Push-update events delivered by other client sessions.
///
/// One tagged union over the wire `type` discriminant covers both the
/// card-level messages and the list/board shape messages. Card events are
/// patched into the store incrementally; list and board shape changes
/// always trigger a full board refetch.
use serde::{Deserialize, Serialize};

use crate::store::BoardStore;
use crate::types::{Board, Card, List};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BoardUpdate {
    #[serde(rename = "CREATED", rename_all = "camelCase")]
    CardCreated {
        card: Card,
        board_id: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_modified_by_name: Option<String>,
    },
    #[serde(rename = "UPDATED", rename_all = "camelCase")]
    CardUpdated {
        card: Card,
        board_id: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_modified_by_name: Option<String>,
    },
    #[serde(rename = "MOVED", rename_all = "camelCase")]
    CardMoved {
        card: Card,
        board_id: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_list_id: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_modified_by_name: Option<String>,
    },
    #[serde(rename = "DELETED", rename_all = "camelCase")]
    CardDeleted {
        card_id: i64,
        board_id: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_modified_by_name: Option<String>,
    },
    #[serde(rename = "LIST_CREATED", rename_all = "camelCase")]
    ListCreated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        list: Option<List>,
        board_id: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_modified_by_name: Option<String>,
    },
    #[serde(rename = "LIST_UPDATED", rename_all = "camelCase")]
    ListUpdated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        list: Option<List>,
        board_id: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_modified_by_name: Option<String>,
    },
    #[serde(rename = "LIST_DELETED", rename_all = "camelCase")]
    ListDeleted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        list_id: Option<i64>,
        board_id: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_modified_by_name: Option<String>,
    },
    #[serde(rename = "LIST_MOVED", rename_all = "camelCase")]
    ListMoved {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        list: Option<List>,
        board_id: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_modified_by_name: Option<String>,
    },
    #[serde(rename = "BOARD_CREATED", rename_all = "camelCase")]
    BoardCreated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        board: Option<Board>,
        board_id: i64,
    },
    #[serde(rename = "BOARD_UPDATED", rename_all = "camelCase")]
    BoardUpdated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        board: Option<Board>,
        board_id: i64,
    },
    #[serde(rename = "BOARD_DELETED", rename_all = "camelCase")]
    BoardDeleted { board_id: i64 },
}

impl BoardUpdate {
    /// The board this update is scoped to.
    pub fn board_id(&self) -> i64 {
        match *self {
            BoardUpdate::CardCreated { board_id, .. }
            | BoardUpdate::CardUpdated { board_id, .. }
            | BoardUpdate::CardMoved { board_id, .. }
            | BoardUpdate::CardDeleted { board_id, .. }
            | BoardUpdate::ListCreated { board_id, .. }
            | BoardUpdate::ListUpdated { board_id, .. }
            | BoardUpdate::ListDeleted { board_id, .. }
            | BoardUpdate::ListMoved { board_id, .. }
            | BoardUpdate::BoardCreated { board_id, .. }
            | BoardUpdate::BoardUpdated { board_id, .. }
            | BoardUpdate::BoardDeleted { board_id } => board_id,
        }
    }
}

/// A user-visible transient notification (toast).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// What the listener should do after an update was handled.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateEffect {
    /// Update was for another board, or no board is open.
    Ignored,
    /// Patched into the store incrementally.
    Applied(Notice),
    /// Shape change: the caller must refetch the board.
    Refetch(Notice),
}

fn actor(name: &Option<String>) -> &str {
    name.as_deref().unwrap_or("Someone")
}

/// Apply one pushed update to the store.
///
/// Card events are merged into the current board without disturbing
/// in-flight local optimistic mutations; whichever side applies later wins
/// at the store layer. Updates scoped to a board other than the open one
/// are discarded.
pub fn apply_update(store: &mut BoardStore, update: BoardUpdate) -> UpdateEffect {
    let Some(current_id) = store.board_id() else {
        return UpdateEffect::Ignored;
    };
    if update.board_id() != current_id {
        return UpdateEffect::Ignored;
    }

    match update {
        BoardUpdate::CardCreated {
            card,
            last_modified_by_name,
            ..
        } => {
            let message = format!("{} created \"{}\"", actor(&last_modified_by_name), card.title);
            store.add_card_optimistic(card);
            UpdateEffect::Applied(Notice::info(message))
        }
        BoardUpdate::CardUpdated {
            card,
            last_modified_by_name,
            ..
        } => {
            let message = format!("{} updated \"{}\"", actor(&last_modified_by_name), card.title);
            store.update_card_optimistic(card);
            UpdateEffect::Applied(Notice::info(message))
        }
        BoardUpdate::CardMoved {
            card,
            last_modified_by_name,
            ..
        } => {
            let list_name = store
                .current_board()
                .and_then(|b| b.list(card.list_id))
                .map(|l| l.name.clone())
                .unwrap_or_else(|| "another list".to_string());
            let message = format!(
                "{} moved \"{}\" to {}",
                actor(&last_modified_by_name),
                card.title,
                list_name
            );
            store.move_card_optimistic(card.id, card.list_id, clamp_position(card.position));
            UpdateEffect::Applied(Notice::info(message))
        }
        BoardUpdate::CardDeleted {
            card_id,
            last_modified_by_name,
            ..
        } => {
            store.delete_card_optimistic(card_id);
            UpdateEffect::Applied(Notice::info(format!(
                "{} deleted a card",
                actor(&last_modified_by_name)
            )))
        }
        BoardUpdate::ListCreated {
            list,
            last_modified_by_name,
            ..
        } => UpdateEffect::Refetch(Notice::info(format!(
            "{} created list \"{}\"",
            actor(&last_modified_by_name),
            list.map(|l| l.name).unwrap_or_else(|| "a list".to_string())
        ))),
        BoardUpdate::ListUpdated {
            list,
            last_modified_by_name,
            ..
        } => UpdateEffect::Refetch(Notice::info(format!(
            "{} updated list \"{}\"",
            actor(&last_modified_by_name),
            list.map(|l| l.name).unwrap_or_else(|| "a list".to_string())
        ))),
        BoardUpdate::ListDeleted {
            last_modified_by_name,
            ..
        } => UpdateEffect::Refetch(Notice::info(format!(
            "{} deleted a list",
            actor(&last_modified_by_name)
        ))),
        BoardUpdate::ListMoved {
            last_modified_by_name,
            ..
        } => UpdateEffect::Refetch(Notice::info(format!(
            "{} reordered lists",
            actor(&last_modified_by_name)
        ))),
        BoardUpdate::BoardCreated { .. } | BoardUpdate::BoardUpdated { .. } => {
            UpdateEffect::Refetch(Notice::info("Board updated"))
        }
        BoardUpdate::BoardDeleted { .. } => {
            UpdateEffect::Refetch(Notice::info("Board deleted"))
        }
    }
}

fn clamp_position(position: i64) -> usize {
    position.max(0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn make_card(id: i64, title: &str, list_id: i64, position: i64) -> Card {
        Card {
            id,
            title: title.to_string(),
            description: None,
            list_id,
            position,
            created_by: 1,
            creator_name: None,
            assignee_ids: Vec::new(),
            assignee_name: None,
            last_modified_by: None,
            last_modified_by_name: None,
            due_date: None,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn make_list(id: i64, name: &str, position: i64, cards: Vec<Card>) -> List {
        List {
            id,
            name: name.to_string(),
            board_id: 1,
            position,
            created_at: ts(),
            updated_at: ts(),
            cards,
        }
    }

    fn store_with_board() -> BoardStore {
        let mut store = BoardStore::new();
        store.set_current_board(Board {
            id: 1,
            name: "Test".to_string(),
            description: None,
            workspace_id: 1,
            created_by: 1,
            created_at: ts(),
            updated_at: ts(),
            lists: vec![
                make_list(
                    10,
                    "Todo",
                    0,
                    vec![make_card(1, "A", 10, 0), make_card(2, "B", 10, 1)],
                ),
                make_list(20, "Done", 1, vec![]),
            ],
        });
        store
    }

    #[test]
    fn test_parse_card_created() {
        let json = r#"{
            "type": "CREATED",
            "boardId": 1,
            "lastModifiedByName": "alice",
            "card": {
                "id": 3, "title": "C", "listId": 10, "position": 1,
                "createdBy": 1,
                "createdAt": "2024-01-01T00:00:00Z",
                "updatedAt": "2024-01-01T00:00:00Z"
            }
        }"#;
        let update: BoardUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(update.board_id(), 1);
        match update {
            BoardUpdate::CardCreated { card, .. } => assert_eq!(card.id, 3),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_parse_list_deleted() {
        let json = r#"{"type": "LIST_DELETED", "boardId": 4, "listId": 7}"#;
        let update: BoardUpdate = serde_json::from_str(json).unwrap();
        match update {
            BoardUpdate::ListDeleted { list_id, board_id, .. } => {
                assert_eq!(list_id, Some(7));
                assert_eq!(board_id, 4);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_frames_fail_to_parse() {
        // Unknown discriminant and missing payload must both be parse
        // errors, to be logged and discarded by the listener.
        assert!(serde_json::from_str::<BoardUpdate>(r#"{"type": "EXPLODED", "boardId": 1}"#).is_err());
        assert!(serde_json::from_str::<BoardUpdate>(r#"{"type": "CREATED", "boardId": 1}"#).is_err());
        assert!(serde_json::from_str::<BoardUpdate>("not json").is_err());
    }

    #[test]
    fn test_update_for_other_board_is_ignored() {
        let mut store = store_with_board();
        let effect = apply_update(
            &mut store,
            BoardUpdate::CardDeleted {
                card_id: 1,
                board_id: 99,
                last_modified_by_name: None,
            },
        );
        assert_eq!(effect, UpdateEffect::Ignored);
        assert!(store.current_board().unwrap().find_card(1).is_some());
    }

    #[test]
    fn test_card_created_inserts_at_reported_position() {
        let mut store = store_with_board();
        let effect = apply_update(
            &mut store,
            BoardUpdate::CardCreated {
                card: make_card(3, "C", 10, 1),
                board_id: 1,
                last_modified_by_name: Some("alice".to_string()),
            },
        );
        assert_eq!(
            effect,
            UpdateEffect::Applied(Notice::info("alice created \"C\""))
        );
        let ids: Vec<i64> = store
            .current_board()
            .unwrap()
            .list(10)
            .unwrap()
            .cards
            .iter()
            .map(|c| c.id)
            .collect();
        // Inserted between A and B; their relative order is undisturbed.
        assert_eq!(ids, vec![1, 3, 2]);
    }

    #[test]
    fn test_card_moved_applies_and_names_target_list() {
        let mut store = store_with_board();
        let effect = apply_update(
            &mut store,
            BoardUpdate::CardMoved {
                card: make_card(1, "A", 20, 0),
                board_id: 1,
                previous_list_id: Some(10),
                last_modified_by_name: None,
            },
        );
        assert_eq!(
            effect,
            UpdateEffect::Applied(Notice::info("Someone moved \"A\" to Done"))
        );
        assert!(store
            .current_board()
            .unwrap()
            .list(20)
            .unwrap()
            .cards
            .iter()
            .any(|c| c.id == 1));
    }

    #[test]
    fn test_list_event_requests_refetch() {
        let mut store = store_with_board();
        let effect = apply_update(
            &mut store,
            BoardUpdate::ListCreated {
                list: Some(make_list(30, "Doing", 2, vec![])),
                board_id: 1,
                last_modified_by_name: Some("bob".to_string()),
            },
        );
        assert_eq!(
            effect,
            UpdateEffect::Refetch(Notice::info("bob created list \"Doing\""))
        );
        // Not patched incrementally.
        assert!(store.current_board().unwrap().list(30).is_none());
    }

    #[test]
    fn test_board_deleted_requests_refetch() {
        let mut store = store_with_board();
        let effect = apply_update(&mut store, BoardUpdate::BoardDeleted { board_id: 1 });
        assert_eq!(effect, UpdateEffect::Refetch(Notice::info("Board deleted")));
    }
}
