/// Board session: the optimistic mutator and reconciler for one open board.
///
/// Owns the snapshot store behind a single mutex so every mutation path —
/// optimistic apply, rollback, push-update merge — is serialized through
/// one writer. Commands are settled per mutation token: a rejection rolls
/// back exactly the failed mutation, a confirmation commits it and then
/// resyncs the whole board from the server. Resync-on-success is
/// deliberate: positions are a shared ordering resource, and another
/// session's concurrent move may have shifted cards this client's
/// optimistic computation did not know about.
use std::sync::{Mutex, MutexGuard, PoisonError};

use kanban_core::drag::{classify, DragOutcome};
use kanban_core::events::{apply_update, BoardUpdate, Notice, UpdateEffect};
use kanban_core::store::{BoardStore, MutationOp, MutationToken};
use kanban_core::types::{validate_title, Board, Card, List};
use tokio::sync::broadcast;

use crate::error::{ApiError, SessionError};
use crate::rest::{
    ApiClient, CreateCardRequest, CreateListRequest, MoveCardRequest, MoveListRequest,
    UpdateCardRequest,
};

pub struct BoardSession {
    api: ApiClient,
    board_id: i64,
    store: Mutex<BoardStore>,
    notice_tx: broadcast::Sender<Notice>,
}

impl BoardSession {
    /// Fetch the board and open a session on it.
    pub async fn open(api: ApiClient, board_id: i64) -> Result<Self, ApiError> {
        let board = api.get_board(board_id).await?;
        Ok(Self::with_board(api, board))
    }

    /// Open a session on an already-fetched board.
    pub fn with_board(api: ApiClient, board: Board) -> Self {
        let board_id = board.id;
        let mut store = BoardStore::new();
        store.set_current_board(board);
        let (notice_tx, _) = broadcast::channel(64);
        Self {
            api,
            board_id,
            store: Mutex::new(store),
            notice_tx,
        }
    }

    pub fn board_id(&self) -> i64 {
        self.board_id
    }

    /// Every store operation is total, so a holder that panicked cannot
    /// have left the board half-mutated. Recover the guard rather than
    /// cascading the poison into every later call.
    fn lock_store(&self) -> MutexGuard<'_, BoardStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current board for rendering.
    pub fn board(&self) -> Option<Board> {
        self.lock_store().current_board().cloned()
    }

    /// Transient user-visible notifications (toasts).
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notice_tx.subscribe()
    }

    fn notify(&self, notice: Notice) {
        // No receivers is fine; notices are fire-and-forget.
        let _ = self.notice_tx.send(notice);
    }

    /// Handle a completed drag gesture: classify, apply optimistically,
    /// dispatch the command, and settle the outcome. A drag that classifies
    /// to no intent is a successful no-op.
    pub async fn handle_drag_end(&self, outcome: DragOutcome) -> Result<(), SessionError> {
        let Some(op) = classify(&outcome) else {
            return Ok(());
        };
        let token = self.lock_store().begin_mutation(op.clone());
        let Some(token) = token else {
            return Err(SessionError::NoBoard);
        };

        let result = match op {
            MutationOp::MoveCard {
                card_id,
                target_list_id,
                new_position,
            } => self
                .api
                .move_card(
                    card_id,
                    MoveCardRequest {
                        target_list_id,
                        new_position: new_position as i64,
                    },
                )
                .await
                .map(|_| ()),
            MutationOp::MoveList {
                list_id,
                new_position,
            } => self
                .api
                .move_list(
                    list_id,
                    MoveListRequest {
                        new_position: new_position as i64,
                    },
                )
                .await
                .map(|_| ()),
        };

        self.finish_mutation(token, &op, result).await;
        Ok(())
    }

    /// Settle a dispatched command against the optimistic state.
    async fn finish_mutation(
        &self,
        token: MutationToken,
        op: &MutationOp,
        result: Result<(), ApiError>,
    ) {
        match result {
            Err(err) => {
                log::warn!(
                    "[kanban.session] Command for mutation {token} on board {} rejected: {err}",
                    self.board_id
                );
                let rolled_back = self.lock_store().rollback(token);
                if rolled_back {
                    self.notify(Notice::error(failure_message(op, &err)));
                }
            }
            Ok(()) => {
                self.lock_store().commit(token);
                self.resync().await;
            }
        }
    }

    /// Authoritative refetch of the open board. A completion that fires
    /// after the board was switched away no-ops on the board-id guard.
    async fn resync(&self) {
        match self.api.get_board(self.board_id).await {
            Ok(board) => {
                let mut store = self.lock_store();
                if store.board_id() == Some(self.board_id) && board.id == self.board_id {
                    store.set_current_board(board);
                }
            }
            Err(err) => {
                log::warn!(
                    "[kanban.session] Resync of board {} failed: {err}",
                    self.board_id
                );
            }
        }
    }

    /// Merge one pushed update from another session.
    pub async fn handle_update(&self, update: BoardUpdate) {
        let effect = {
            let mut store = self.lock_store();
            apply_update(&mut store, update)
        };
        match effect {
            UpdateEffect::Ignored => {}
            UpdateEffect::Applied(notice) => self.notify(notice),
            UpdateEffect::Refetch(notice) => {
                self.resync().await;
                self.notify(notice);
            }
        }
    }

    // ── Non-drag commands ───────────────────────────────────────────────
    //
    // Creates, edits and deletes are not applied optimistically: the
    // client never invents identifiers, so a card exists locally only
    // once the server has acknowledged it (via the resync, or the pushed
    // CREATED event).

    pub async fn create_card(&self, mut body: CreateCardRequest) -> Result<Card, SessionError> {
        body.title = validate_title(&body.title)?;
        let card = self.api.create_card(&body).await?;
        self.resync().await;
        Ok(card)
    }

    pub async fn update_card(
        &self,
        card_id: i64,
        mut body: UpdateCardRequest,
    ) -> Result<Card, SessionError> {
        if let Some(title) = body.title.take() {
            body.title = Some(validate_title(&title)?);
        }
        let card = self.api.update_card(card_id, &body).await?;
        self.resync().await;
        Ok(card)
    }

    pub async fn delete_card(&self, card_id: i64) -> Result<(), SessionError> {
        self.api.delete_card(card_id).await?;
        self.resync().await;
        Ok(())
    }

    pub async fn create_list(&self, name: &str) -> Result<List, SessionError> {
        let name = validate_title(name)?;
        let list = self
            .api
            .create_list(&CreateListRequest {
                name,
                board_id: self.board_id,
                position: None,
            })
            .await?;
        self.resync().await;
        Ok(list)
    }

    pub async fn rename_list(&self, list_id: i64, name: &str) -> Result<List, SessionError> {
        let name = validate_title(name)?;
        let list = self
            .api
            .update_list(
                list_id,
                &CreateListRequest {
                    name,
                    board_id: self.board_id,
                    position: None,
                },
            )
            .await?;
        self.resync().await;
        Ok(list)
    }

    pub async fn delete_list(&self, list_id: i64) -> Result<(), SessionError> {
        self.api.delete_list(list_id).await?;
        self.resync().await;
        Ok(())
    }
}

/// Server-supplied message when present, generic fallback otherwise.
fn failure_message(op: &MutationOp, err: &ApiError) -> String {
    match err {
        ApiError::Server { message, .. } if !message.is_empty() => message.clone(),
        _ => match op {
            MutationOp::MoveCard { .. } => "Failed to move card".to_string(),
            MutationOp::MoveList { .. } => "Failed to move list".to_string(),
        },
    }
}
