/// Drag-end classification.
///
/// Translates a drag gesture outcome into exactly one position-mutation
/// intent, or none. List draggable ids carry the `list-` prefix so they can
/// never collide with raw numeric card ids in the same namespace.
use crate::store::MutationOp;

/// Draggable-id prefix that marks a dragged list row.
pub const LIST_DRAG_PREFIX: &str = "list-";

/// Droppable id of the list-row container (the board itself).
pub const BOARD_DROPPABLE_ID: &str = "board";

/// Where a draggable was picked up or dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropLocation {
    /// List-id string for a card container, or [`BOARD_DROPPABLE_ID`].
    pub droppable_id: String,
    pub index: usize,
}

/// Outcome of a completed drag gesture.
#[derive(Debug, Clone)]
pub struct DragOutcome {
    pub draggable_id: String,
    pub source: DropLocation,
    /// None when the drag was cancelled (dropped outside any container).
    pub destination: Option<DropLocation>,
}

/// Classify a drag outcome. Returns `None` for a cancelled drag, a drop at
/// the original location, or ids that do not parse — never an error.
pub fn classify(outcome: &DragOutcome) -> Option<MutationOp> {
    let destination = outcome.destination.as_ref()?;
    if *destination == outcome.source {
        return None;
    }

    if let Some(raw) = outcome.draggable_id.strip_prefix(LIST_DRAG_PREFIX) {
        if destination.droppable_id != BOARD_DROPPABLE_ID {
            return None;
        }
        let Ok(list_id) = raw.parse::<i64>() else {
            log::warn!("[kanban.drag] Unparseable list draggable id {:?}", outcome.draggable_id);
            return None;
        };
        return Some(MutationOp::MoveList {
            list_id,
            new_position: destination.index,
        });
    }

    let (Ok(card_id), Ok(target_list_id)) = (
        outcome.draggable_id.parse::<i64>(),
        destination.droppable_id.parse::<i64>(),
    ) else {
        log::warn!(
            "[kanban.drag] Unparseable drag ids {:?} -> {:?}",
            outcome.draggable_id,
            destination.droppable_id
        );
        return None;
    };

    Some(MutationOp::MoveCard {
        card_id,
        target_list_id,
        new_position: destination.index,
    })
}
