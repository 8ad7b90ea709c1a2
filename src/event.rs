use crate::command::TargetHash;
use crate::node::NodeId;
use std::time::Duration;

/// Notifications sent to the observer given to
/// [HistoryBuilder::on_event](crate::history::HistoryBuilder::on_event).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A command was recorded as node `id`.
    NodeAdded { id: NodeId },
    /// A command of node `id` was undone.
    UndoPerformed { id: NodeId },
    /// A command of node `id` was redone.
    RedoPerformed { id: NodeId },
    /// Objects were changed by adding, undoing, or redoing a command.
    ObjectModified {
        kind: Option<String>,
        targets: TargetHash,
    },
    /// Size-based compaction will run after `remaining_edits` more undo/redo steps.
    CompactionPending { remaining_edits: usize },
    /// Time-based compaction will run in `remaining`.
    CompactionScheduled { remaining: Duration },
    /// A compaction pass finished, creating `runs` compacted nodes out of `nodes` nodes.
    Compacted { runs: usize, nodes: usize },
    /// The whole history was discarded.
    Cleared,
}
