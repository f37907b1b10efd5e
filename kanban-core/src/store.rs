/// Board snapshot store with per-mutation rollback snapshots.
///
/// Single source of truth for the currently open board. Every mutating
/// operation is synchronous and total: renumbering completes before the
/// call returns, so a reader never observes a partially-updated board.
///
/// Optimistic mutations are bracketed by `begin_mutation` (deep snapshot,
/// keyed by a token, captured before the apply) and either `commit` or
/// `rollback`. Rolling back a mutation restores its snapshot and replays
/// the surviving in-flight mutations on top, so overlapping drags keep
/// their own undo points instead of sharing a single slot.
use crate::types::{Board, Card, List};

pub type MutationToken = u64;

/// A locally-initiated state transition awaiting server confirmation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOp {
    MoveCard {
        card_id: i64,
        target_list_id: i64,
        new_position: usize,
    },
    MoveList {
        list_id: i64,
        new_position: usize,
    },
}

#[derive(Debug)]
struct PendingMutation {
    token: MutationToken,
    /// Board state immediately before this mutation was applied.
    snapshot: Board,
    op: MutationOp,
}

#[derive(Debug, Default)]
pub struct BoardStore {
    current: Option<Board>,
    /// In-flight mutations in start order.
    pending: Vec<PendingMutation>,
    next_token: MutationToken,
}

impl BoardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_board(&self) -> Option<&Board> {
        self.current.as_ref()
    }

    pub fn board_id(&self) -> Option<i64> {
        self.current.as_ref().map(|b| b.id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Replace the board wholesale with an authoritative snapshot (full
    /// refetch). The fresh state supersedes all in-flight optimism, so
    /// every pending rollback snapshot is dropped.
    pub fn set_current_board(&mut self, mut board: Board) {
        normalize(&mut board);
        self.current = Some(board);
        self.pending.clear();
    }

    /// Reset on board switch or logout.
    pub fn clear(&mut self) {
        self.current = None;
        self.pending.clear();
    }

    /// Capture a rollback snapshot, apply `op` optimistically, and return
    /// the token the reconciler settles the command with. Returns `None`
    /// when no board is loaded.
    pub fn begin_mutation(&mut self, op: MutationOp) -> Option<MutationToken> {
        let snapshot = self.current.clone()?;
        self.next_token += 1;
        let token = self.next_token;
        self.pending.push(PendingMutation {
            token,
            snapshot,
            op: op.clone(),
        });
        if let Some(board) = self.current.as_mut() {
            apply_op(board, &op);
        }
        Some(token)
    }

    /// Server confirmed the command: drop the rollback snapshot. The
    /// reconciler follows up with an authoritative resync.
    pub fn commit(&mut self, token: MutationToken) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.token != token);
        before != self.pending.len()
    }

    /// Server rejected the command: restore the snapshot taken before this
    /// mutation, then replay the surviving in-flight mutations in start
    /// order. Later mutations' snapshots are recomputed so a subsequent
    /// rollback cannot reintroduce the rejected change.
    ///
    /// Returns false for an unknown token (already settled, or superseded
    /// by a full resync) — a stale completion is a safe no-op.
    pub fn rollback(&mut self, token: MutationToken) -> bool {
        let Some(idx) = self.pending.iter().position(|p| p.token == token) else {
            log::debug!("[kanban.store] Rollback for unknown mutation token {token}, ignoring");
            return false;
        };
        let failed = self.pending.remove(idx);
        let mut base = failed.snapshot;
        for later in self.pending.iter_mut().skip(idx) {
            later.snapshot = base.clone();
            apply_op(&mut base, &later.op);
        }
        self.current = Some(base);
        true
    }

    /// Replace the board with the given snapshot verbatim and drop all
    /// retained rollback state.
    pub fn rollback_board(&mut self, snapshot: Board) {
        self.current = Some(snapshot);
        self.pending.clear();
    }

    /// Move a card to `new_position` in `target_list_id`, renumbering both
    /// the source and target lists. Applied directly, without a rollback
    /// snapshot — used for server-pushed moves from other sessions.
    pub fn move_card_optimistic(
        &mut self,
        card_id: i64,
        target_list_id: i64,
        new_position: usize,
    ) {
        if let Some(board) = self.current.as_mut() {
            move_card_on(board, card_id, target_list_id, new_position);
        }
    }

    /// Insert a card at its reported position (clamped to the list length)
    /// and renumber the list. Unknown target list is a no-op.
    pub fn add_card_optimistic(&mut self, card: Card) {
        let Some(board) = self.current.as_mut() else {
            return;
        };
        let Some(list) = board.list_mut(card.list_id) else {
            log::debug!(
                "[kanban.store] Add for card {} targets unknown list {}, ignoring",
                card.id,
                card.list_id
            );
            return;
        };
        if list.cards.iter().any(|c| c.id == card.id) {
            // Duplicate delivery; the card is already known.
            return;
        }
        let idx = clamp_index(card.position, list.cards.len());
        list.cards.insert(idx, card);
        renumber_cards(list);
    }

    /// Replace a card's fields in place. If the incoming payload reports a
    /// different list, the card is moved there at its reported position.
    /// Unknown card id is a no-op (the event may target a list that is not
    /// currently loaded), not an error.
    pub fn update_card_optimistic(&mut self, card: Card) {
        let Some(board) = self.current.as_mut() else {
            return;
        };
        let Some((li, ci)) = board.find_card(card.id) else {
            log::debug!("[kanban.store] Update for unknown card {}, ignoring", card.id);
            return;
        };
        if board.lists[li].id == card.list_id {
            // Keep the slot; position is settled by move events or resync.
            let position = board.lists[li].cards[ci].position;
            board.lists[li].cards[ci] = Card { position, ..card };
        } else {
            if board.list(card.list_id).is_none() {
                log::debug!(
                    "[kanban.store] Update moves card {} to unknown list {}, ignoring",
                    card.id,
                    card.list_id
                );
                return;
            }
            board.lists[li].cards.remove(ci);
            renumber_cards(&mut board.lists[li]);
            let Some(list) = board.list_mut(card.list_id) else {
                return;
            };
            let idx = clamp_index(card.position, list.cards.len());
            list.cards.insert(idx, card);
            renumber_cards(list);
        }
    }

    /// Remove a card and renumber its list. Unknown card id is a no-op.
    pub fn delete_card_optimistic(&mut self, card_id: i64) {
        let Some(board) = self.current.as_mut() else {
            return;
        };
        let Some((li, ci)) = board.find_card(card_id) else {
            log::debug!("[kanban.store] Delete for unknown card {card_id}, ignoring");
            return;
        };
        board.lists[li].cards.remove(ci);
        renumber_cards(&mut board.lists[li]);
    }
}

fn apply_op(board: &mut Board, op: &MutationOp) {
    match *op {
        MutationOp::MoveCard {
            card_id,
            target_list_id,
            new_position,
        } => move_card_on(board, card_id, target_list_id, new_position),
        MutationOp::MoveList {
            list_id,
            new_position,
        } => move_list_on(board, list_id, new_position),
    }
}

/// Atomic card move: (old list, old position) -> (new list, new position).
/// Positions beyond the target length clamp to append. Both touched lists
/// are renumbered 0-based contiguous before returning.
fn move_card_on(board: &mut Board, card_id: i64, target_list_id: i64, new_position: usize) {
    let Some(ti) = board.lists.iter().position(|l| l.id == target_list_id) else {
        log::debug!(
            "[kanban.store] Move for card {card_id} targets unknown list {target_list_id}, ignoring"
        );
        return;
    };
    let Some((si, ci)) = board.find_card(card_id) else {
        log::debug!("[kanban.store] Move for unknown card {card_id}, ignoring");
        return;
    };
    let mut card = board.lists[si].cards.remove(ci);
    card.list_id = target_list_id;
    let idx = new_position.min(board.lists[ti].cards.len());
    board.lists[ti].cards.insert(idx, card);
    renumber_cards(&mut board.lists[si]);
    if ti != si {
        renumber_cards(&mut board.lists[ti]);
    }
}

fn move_list_on(board: &mut Board, list_id: i64, new_position: usize) {
    let Some(i) = board.lists.iter().position(|l| l.id == list_id) else {
        log::debug!("[kanban.store] Move for unknown list {list_id}, ignoring");
        return;
    };
    let list = board.lists.remove(i);
    let idx = new_position.min(board.lists.len());
    board.lists.insert(idx, list);
    renumber_lists(board);
}

/// Canonicalize a server snapshot: order by the server-assigned position
/// keys (ties broken by id — positions are arbitrary sortable keys on the
/// wire), then renumber to the client's 0-based contiguous form.
fn normalize(board: &mut Board) {
    board.lists.sort_by_key(|l| (l.position, l.id));
    for list in &mut board.lists {
        list.cards.sort_by_key(|c| (c.position, c.id));
    }
    renumber_lists(board);
    for list in &mut board.lists {
        renumber_cards(list);
    }
}

fn renumber_cards(list: &mut List) {
    let list_id = list.id;
    for (i, card) in list.cards.iter_mut().enumerate() {
        card.position = i as i64;
        card.list_id = list_id;
    }
}

fn renumber_lists(board: &mut Board) {
    for (i, list) in board.lists.iter_mut().enumerate() {
        list.position = i as i64;
    }
}

fn clamp_index(position: i64, len: usize) -> usize {
    if position < 0 {
        0
    } else {
        (position as usize).min(len)
    }
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

    fn make_board(lists: Vec<List>) -> Board {
        Board {
            id: 1,
            name: "Test".to_string(),
            description: None,
            workspace_id: 1,
            created_by: 1,
            created_at: ts(),
            updated_at: ts(),
            lists,
        }
    }

    /// Todo=[A, B], Done=[] — the baseline fixture.
    fn todo_done_store() -> BoardStore {
        let mut store = BoardStore::new();
        store.set_current_board(make_board(vec![
            make_list(
                10,
                "Todo",
                0,
                vec![make_card(1, "A", 10, 0), make_card(2, "B", 10, 1)],
            ),
            make_list(20, "Done", 1, vec![]),
        ]));
        store
    }

    fn positions(store: &BoardStore, list_id: i64) -> Vec<(i64, i64)> {
        store
            .current_board()
            .unwrap()
            .list(list_id)
            .unwrap()
            .cards
            .iter()
            .map(|c| (c.id, c.position))
            .collect()
    }

    fn assert_contiguous(store: &BoardStore) {
        for list in &store.current_board().unwrap().lists {
            let got: Vec<i64> = list.cards.iter().map(|c| c.position).collect();
            let want: Vec<i64> = (0..list.cards.len() as i64).collect();
            assert_eq!(got, want, "list {} positions not contiguous", list.id);
        }
    }

    #[test]
    fn test_cross_list_move_is_atomic() {
        let mut store = todo_done_store();
        store.move_card_optimistic(1, 20, 0);

        assert_eq!(positions(&store, 10), vec![(2, 0)]);
        assert_eq!(positions(&store, 20), vec![(1, 0)]);
        let board = store.current_board().unwrap();
        assert_eq!(board.list(20).unwrap().cards[0].list_id, 20);
        assert_contiguous(&store);
    }

    #[test]
    fn test_same_list_reorder() {
        let mut store = todo_done_store();
        store.move_card_optimistic(1, 10, 1);
        assert_eq!(positions(&store, 10), vec![(2, 0), (1, 1)]);
        assert_contiguous(&store);
    }

    #[test]
    fn test_move_beyond_length_clamps_to_append() {
        let mut store = todo_done_store();
        store.move_card_optimistic(1, 20, 99);
        assert_eq!(positions(&store, 20), vec![(1, 0)]);
        assert_contiguous(&store);
    }

    #[test]
    fn test_move_to_unknown_list_is_noop() {
        let mut store = todo_done_store();
        let before = store.current_board().unwrap().clone();
        store.move_card_optimistic(1, 999, 0);
        assert_eq!(store.current_board().unwrap(), &before);
    }

    #[test]
    fn test_positions_contiguous_after_move_sequence() {
        let mut store = todo_done_store();
        store.move_card_optimistic(1, 20, 0);
        store.move_card_optimistic(2, 20, 5);
        store.move_card_optimistic(1, 10, 0);
        store.move_card_optimistic(2, 10, 1);
        store.move_card_optimistic(2, 10, 0);
        assert_contiguous(&store);
    }

    #[test]
    fn test_rollback_restores_exact_state() {
        let mut store = todo_done_store();
        let before = store.current_board().unwrap().clone();

        let token = store
            .begin_mutation(MutationOp::MoveCard {
                card_id: 1,
                target_list_id: 20,
                new_position: 0,
            })
            .unwrap();
        assert_eq!(positions(&store, 20), vec![(1, 0)]);

        assert!(store.rollback(token));
        assert_eq!(store.current_board().unwrap(), &before);
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn test_todo_done_failure_scenario() {
        // Drag A to Done at index 0, then the server rejects the move.
        let mut store = todo_done_store();
        let token = store
            .begin_mutation(MutationOp::MoveCard {
                card_id: 1,
                target_list_id: 20,
                new_position: 0,
            })
            .unwrap();

        assert_eq!(positions(&store, 10), vec![(2, 0)]);
        assert_eq!(positions(&store, 20), vec![(1, 0)]);

        assert!(store.rollback(token));
        assert_eq!(positions(&store, 10), vec![(1, 0), (2, 1)]);
        assert_eq!(positions(&store, 20), Vec::<(i64, i64)>::new());
    }

    #[test]
    fn test_commit_drops_snapshot() {
        let mut store = todo_done_store();
        let token = store
            .begin_mutation(MutationOp::MoveCard {
                card_id: 1,
                target_list_id: 20,
                new_position: 0,
            })
            .unwrap();
        assert!(store.commit(token));
        assert_eq!(store.pending_count(), 0);
        // A late failure callback for the same token is a safe no-op.
        assert!(!store.rollback(token));
        assert_eq!(positions(&store, 20), vec![(1, 0)]);
    }

    #[test]
    fn test_overlapping_drags_rollback_first_keeps_second() {
        let mut store = todo_done_store();
        let first = store
            .begin_mutation(MutationOp::MoveCard {
                card_id: 1,
                target_list_id: 20,
                new_position: 0,
            })
            .unwrap();
        let _second = store
            .begin_mutation(MutationOp::MoveCard {
                card_id: 2,
                target_list_id: 20,
                new_position: 1,
            })
            .unwrap();

        assert!(store.rollback(first));

        // A is back in Todo, B's in-flight move survives the replay.
        assert_eq!(positions(&store, 10), vec![(1, 0)]);
        assert_eq!(positions(&store, 20), vec![(2, 0)]);
        assert_contiguous(&store);
    }

    #[test]
    fn test_overlapping_drags_both_fail() {
        let mut store = todo_done_store();
        let before = store.current_board().unwrap().clone();
        let first = store
            .begin_mutation(MutationOp::MoveCard {
                card_id: 1,
                target_list_id: 20,
                new_position: 0,
            })
            .unwrap();
        let second = store
            .begin_mutation(MutationOp::MoveCard {
                card_id: 2,
                target_list_id: 20,
                new_position: 1,
            })
            .unwrap();

        assert!(store.rollback(first));
        assert!(store.rollback(second));
        assert_eq!(store.current_board().unwrap(), &before);
    }

    #[test]
    fn test_push_move_lands_next_to_inflight_local_move() {
        // Local optimistic move of card 1 into Done is in flight; a pushed
        // move for card 2 into Done index 0 arrives. Both must hold.
        let mut store = todo_done_store();
        let _token = store
            .begin_mutation(MutationOp::MoveCard {
                card_id: 1,
                target_list_id: 20,
                new_position: 1,
            })
            .unwrap();

        store.move_card_optimistic(2, 20, 0);

        assert_eq!(positions(&store, 20), vec![(2, 0), (1, 1)]);
        assert!(positions(&store, 10).is_empty());
        assert_contiguous(&store);
    }

    #[test]
    fn test_add_card_at_reported_position() {
        let mut store = todo_done_store();
        store.add_card_optimistic(make_card(3, "C", 10, 1));
        assert_eq!(positions(&store, 10), vec![(1, 0), (3, 1), (2, 2)]);
        assert_contiguous(&store);
    }

    #[test]
    fn test_add_card_duplicate_delivery_ignored() {
        let mut store = todo_done_store();
        store.add_card_optimistic(make_card(3, "C", 10, 0));
        store.add_card_optimistic(make_card(3, "C", 10, 2));
        assert_eq!(store.current_board().unwrap().list(10).unwrap().cards.len(), 3);
    }

    #[test]
    fn test_add_card_unknown_list_is_noop() {
        let mut store = todo_done_store();
        let before = store.current_board().unwrap().clone();
        store.add_card_optimistic(make_card(3, "C", 999, 0));
        assert_eq!(store.current_board().unwrap(), &before);
    }

    #[test]
    fn test_update_card_in_place_keeps_slot() {
        let mut store = todo_done_store();
        let mut updated = make_card(1, "A renamed", 10, 7);
        updated.description = Some("details".to_string());
        store.update_card_optimistic(updated);

        let board = store.current_board().unwrap();
        let card = &board.list(10).unwrap().cards[0];
        assert_eq!(card.title, "A renamed");
        assert_eq!(card.position, 0);
        assert_contiguous(&store);
    }

    #[test]
    fn test_update_card_moves_between_lists() {
        let mut store = todo_done_store();
        store.update_card_optimistic(make_card(1, "A", 20, 0));
        assert_eq!(positions(&store, 10), vec![(2, 0)]);
        assert_eq!(positions(&store, 20), vec![(1, 0)]);
        assert_contiguous(&store);
    }

    #[test]
    fn test_update_unknown_card_is_noop() {
        let mut store = todo_done_store();
        let before = store.current_board().unwrap().clone();
        store.update_card_optimistic(make_card(999, "ghost", 10, 0));
        assert_eq!(store.current_board().unwrap(), &before);
    }

    #[test]
    fn test_delete_card_renumbers() {
        let mut store = todo_done_store();
        store.delete_card_optimistic(1);
        assert_eq!(positions(&store, 10), vec![(2, 0)]);
        store.delete_card_optimistic(999);
        assert_eq!(positions(&store, 10), vec![(2, 0)]);
    }

    #[test]
    fn test_list_reorder_mutation() {
        let mut store = todo_done_store();
        let token = store
            .begin_mutation(MutationOp::MoveList {
                list_id: 20,
                new_position: 0,
            })
            .unwrap();

        let ids: Vec<i64> = store
            .current_board()
            .unwrap()
            .lists
            .iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec![20, 10]);

        assert!(store.rollback(token));
        let ids: Vec<i64> = store
            .current_board()
            .unwrap()
            .lists
            .iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec![10, 20]);
    }

    #[test]
    fn test_set_current_board_clears_pending_and_normalizes() {
        let mut store = todo_done_store();
        let token = store
            .begin_mutation(MutationOp::MoveCard {
                card_id: 1,
                target_list_id: 20,
                new_position: 0,
            })
            .unwrap();

        // Server snapshot with gapped positions and unsorted order.
        let fresh = make_board(vec![
            make_list(
                20,
                "Done",
                10,
                vec![make_card(1, "A", 20, 30), make_card(2, "B", 20, 10)],
            ),
            make_list(10, "Todo", 5, vec![]),
        ]);
        store.set_current_board(fresh);

        assert_eq!(store.pending_count(), 0);
        assert!(!store.rollback(token));
        let board = store.current_board().unwrap();
        assert_eq!(board.lists[0].id, 10);
        assert_eq!(board.lists[1].id, 20);
        assert_eq!(positions(&store, 20), vec![(2, 0), (1, 1)]);
        assert_contiguous(&store);
    }

    #[test]
    fn test_begin_mutation_without_board() {
        let mut store = BoardStore::new();
        assert!(store
            .begin_mutation(MutationOp::MoveCard {
                card_id: 1,
                target_list_id: 1,
                new_position: 0,
            })
            .is_none());
    }

    #[test]
    fn test_rollback_board_verbatim() {
        let mut store = todo_done_store();
        let snapshot = store.current_board().unwrap().clone();
        store.move_card_optimistic(1, 20, 0);
        store.rollback_board(snapshot.clone());
        assert_eq!(store.current_board().unwrap(), &snapshot);
        assert_eq!(store.pending_count(), 0);
    }
}
