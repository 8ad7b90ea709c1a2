//! Compacted runs of commands.
//!
//! # Compaction
//! A long linear run of edits to the same objects can be replaced by one compacted node.
//! The node keeps every original command and can replay them one by one
//! ("step" undo/redo) or all at once ("full" undo/redo).
//!
//! ```txt
//! n: normal node
//! C: compacted node
//!
//!        +--+  +--+  +--+  +--+  +--+  +--+                 +--------------+  +--+
//! root --|n1|--|n2|--|n3|--|n4|--|n5|--|n6|--   =>   root --|C1(n1 ... n5) |--|n6|--
//!        +--+  +--+  +--+  +--+  +--+  +--+                 +--------------+  +--+
//!        <-- same target, no branch -->
//! ```
//! A run may only be compacted if every node except the last has exactly one child,
//! which is the next node of the run.
//! The last node may branch; its children become the children of the compacted node.
use crate::command::{Command, TargetHash};
use crate::node::NodeId;
use crate::tree::Tree;
use std::collections::HashMap;

pub(crate) struct Entry<'a> {
    pub(crate) id: NodeId,
    pub(crate) command: Box<dyn Command + 'a>,
}

impl<'a> Entry<'a> {
    pub(crate) fn new(id: NodeId, command: Box<dyn Command + 'a>) -> Self {
        Self { id, command }
    }
}

/// Replay state of a [CompactRun].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Nothing is applied.
    Uncollapsed,
    /// Some prefix of the run is applied.
    Partial,
    /// The whole run is applied.
    Collapsed,
}

/// An ordered run of commands owned by a compacted node.
///
/// The cursor counts how many commands of the run are currently applied.
pub struct CompactRun<'a> {
    entries: Vec<Entry<'a>>,
    cursor: usize,
}

impl<'a> CompactRun<'a> {
    pub(crate) fn new(entries: Vec<Entry<'a>>, cursor: usize) -> Self {
        debug_assert!(!entries.is_empty());
        debug_assert!(cursor <= entries.len());
        Self { entries, cursor }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn has_step_undo(&self) -> bool {
        0 < self.cursor
    }

    pub fn has_step_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    pub fn state(&self) -> RunState {
        if self.cursor == 0 {
            RunState::Uncollapsed
        } else if self.cursor < self.entries.len() {
            RunState::Partial
        } else {
            RunState::Collapsed
        }
    }

    /// Returns the `index`-th command of the run.
    ///
    /// # Panics
    /// Panics if `index` is out of range.
    pub fn command(&self, index: usize) -> &(dyn Command + 'a) {
        &*self.entries[index].command
    }

    /// Returns the id the `index`-th command was recorded with.
    ///
    /// # Panics
    /// Panics if `index` is out of range.
    pub fn id(&self, index: usize) -> NodeId {
        self.entries[index].id
    }

    /// Ids and commands of the original nodes, in replay order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &(dyn Command + 'a))> + '_ {
        self.entries.iter().map(|e| (e.id, &*e.command))
    }

    /// Undoes the last applied command.
    ///
    /// # Return
    /// Index of the undone command, or [None] if nothing is applied.
    pub(crate) fn step_undo(&mut self) -> Option<usize> {
        if !self.has_step_undo() {
            return None;
        }
        self.cursor -= 1;
        self.entries[self.cursor].command.undo();
        Some(self.cursor)
    }

    /// Redoes the first unapplied command.
    ///
    /// # Return
    /// Index of the redone command, or [None] if everything is applied.
    pub(crate) fn step_redo(&mut self) -> Option<usize> {
        if !self.has_step_redo() {
            return None;
        }
        self.entries[self.cursor].command.redo();
        self.cursor += 1;
        Some(self.cursor - 1)
    }

    /// Undoes every applied command, returning how many were undone.
    pub(crate) fn full_undo(&mut self) -> usize {
        let mut count = 0;
        while self.step_undo().is_some() {
            count += 1;
        }
        count
    }

    /// Redoes every unapplied command, returning how many were redone.
    pub(crate) fn full_redo(&mut self) -> usize {
        let mut count = 0;
        while self.step_redo().is_some() {
            count += 1;
        }
        count
    }

    pub(crate) fn into_entries(self) -> Vec<Entry<'a>> {
        self.entries
    }
}

/// Finds every run eligible for compaction.
///
/// Nodes are grouped by target hash and each group is sorted by id.
/// A run is a maximal stretch of consecutive ids of a group in which every node but the
/// last has exactly one child, and that child is the next id of the group.
/// A branch point or a same-target node elsewhere in the tree closes the run.
/// Runs shorter than `min_len` are dropped.
/// The root, compacted nodes, and nodes with an empty target hash never take part.
///
/// # Return
/// Runs in ascending order of their first id; each run is ordered parent to child.
pub(crate) fn find_runs(tree: &Tree<'_>, min_len: usize) -> Vec<Vec<NodeId>> {
    let mut groups: HashMap<TargetHash, Vec<NodeId>> = HashMap::new();
    for node in tree.iter() {
        if node.parent().is_none() || node.is_compacted() {
            continue;
        }
        let hash = node.target_hash();
        if !hash.is_empty() {
            groups.entry(hash).or_default().push(node.id());
        }
    }

    let only_child = |id: NodeId| -> Option<NodeId> {
        match tree.get(id)?.children() {
            [child] => Some(*child),
            _ => None,
        }
    };

    let mut runs = Vec::new();
    for ids in groups.values_mut() {
        ids.sort_unstable();
        let mut run: Vec<NodeId> = Vec::new();
        for &id in ids.iter() {
            let extends = run
                .last()
                .map_or(false, |last| only_child(*last) == Some(id));
            if !extends {
                let closed = std::mem::take(&mut run);
                if min_len <= closed.len() {
                    runs.push(closed);
                }
            }
            run.push(id);
        }
        if min_len <= run.len() {
            runs.push(run);
        }
    }
    runs.sort_unstable_by_key(|run| run[0]);

    tracing::trace!(groups = groups.len(), runs = runs.len(), "compaction runs found");
    runs
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::command::test::{Log, Record};

    fn run_of(n: i64, log: &Log) -> CompactRun<'static> {
        let entries = (1..=n)
            .map(|i| Entry::new(i as NodeId, Box::new(Record::new(i, vec![7], log)) as _))
            .collect();
        CompactRun::new(entries, n as usize)
    }

    #[test]
    fn state_machine() {
        let log = Log::default();
        let mut run = run_of(3, &log);

        assert_eq!(RunState::Collapsed, run.state());
        assert!(run.has_step_undo());
        assert!(!run.has_step_redo());
        assert!(run.step_redo().is_none());

        assert_eq!(Some(2), run.step_undo());
        assert_eq!(RunState::Partial, run.state());
        assert_eq!(Some(1), run.step_undo());
        assert_eq!(Some(0), run.step_undo());
        assert_eq!(RunState::Uncollapsed, run.state());
        assert!(run.step_undo().is_none());

        assert_eq!(vec![-3, -2, -1], *log.borrow());
    }

    #[test]
    fn step_replay_order() {
        let log = Log::default();
        let mut run = run_of(5, &log);

        for _ in 0..5 {
            run.step_undo().unwrap();
        }
        for _ in 0..5 {
            run.step_redo().unwrap();
        }

        assert_eq!(vec![-5, -4, -3, -2, -1, 1, 2, 3, 4, 5], *log.borrow());
    }

    #[test]
    fn full_undo_redo_from_partial() {
        let log = Log::default();
        let mut run = run_of(4, &log);

        run.step_undo();
        assert_eq!(3, run.full_undo());
        assert_eq!(0, run.full_undo());
        assert_eq!(4, run.full_redo());
        assert_eq!(0, run.full_redo());
        assert_eq!(4, run.cursor());

        assert_eq!(vec![-4, -3, -2, -1, 1, 2, 3, 4], *log.borrow());
    }

    #[test]
    fn iter_keeps_order() {
        let log = Log::default();
        let run = run_of(3, &log);

        let ids: Vec<NodeId> = run.iter().map(|(id, _)| id).collect();
        assert_eq!(vec![1, 2, 3], ids);
        assert_eq!("record 2", run.command(1).description());
        assert_eq!(3, run.len());
        assert!(!run.is_empty());
    }

    // Builds a tree from (id, parent, targets) triples.
    fn tree_of(nodes: &[(NodeId, NodeId, &[u64])], log: &Log) -> Tree<'static> {
        let mut tree = Tree::new(0);
        for &(id, parent, targets) in nodes {
            tree.add_child(parent, id, Box::new(Record::new(id as i64, targets.to_vec(), log)));
        }
        tree
    }

    #[test]
    fn runs_respect_threshold() {
        let log = Log::default();
        let five = tree_of(
            &[(1, 0, &[7]), (2, 1, &[7]), (3, 2, &[7]), (4, 3, &[7]), (5, 4, &[7])],
            &log,
        );
        assert_eq!(vec![vec![1, 2, 3, 4, 5]], find_runs(&five, 5));
        assert!(find_runs(&five, 6).is_empty());

        let four = tree_of(&[(1, 0, &[7]), (2, 1, &[7]), (3, 2, &[7]), (4, 3, &[7])], &log);
        assert!(find_runs(&four, 5).is_empty());
        assert_eq!(vec![vec![1, 2, 3, 4]], find_runs(&four, 4));
    }

    #[test]
    fn runs_split_on_other_targets() {
        let log = Log::default();
        let tree = tree_of(
            &[
                (1, 0, &[7]),
                (2, 1, &[7]),
                (3, 2, &[8]),
                (4, 3, &[7]),
                (5, 4, &[7]),
                (6, 5, &[7]),
            ],
            &log,
        );
        assert_eq!(vec![vec![1, 2], vec![4, 5, 6]], find_runs(&tree, 2));
        assert_eq!(vec![vec![4, 5, 6]], find_runs(&tree, 3));
    }

    #[test]
    fn runs_are_order_sensitive() {
        let log = Log::default();
        let tree = tree_of(&[(1, 0, &[1, 2]), (2, 1, &[2, 1]), (3, 2, &[2, 1])], &log);
        assert_eq!(vec![vec![2, 3]], find_runs(&tree, 2));
    }

    #[test]
    fn runs_close_at_branch() {
        let log = Log::default();
        // 1 - 2 - 3 - 4
        //          \- 5 - 6
        let tree = tree_of(
            &[
                (1, 0, &[7]),
                (2, 1, &[7]),
                (3, 2, &[7]),
                (4, 3, &[7]),
                (5, 3, &[7]),
                (6, 5, &[7]),
            ],
            &log,
        );
        assert_eq!(vec![vec![1, 2, 3], vec![4], vec![5, 6]], find_runs(&tree, 1));
        assert_eq!(vec![vec![1, 2, 3]], find_runs(&tree, 3));
    }

    #[test]
    fn runs_close_at_interleaved_sibling() {
        let log = Log::default();
        // 1 - 3 - 4
        //  \- 2
        let tree = tree_of(&[(1, 0, &[7]), (2, 0, &[7]), (3, 1, &[7]), (4, 3, &[7])], &log);
        assert_eq!(vec![vec![1], vec![2], vec![3, 4]], find_runs(&tree, 1));
        assert_eq!(vec![vec![3, 4]], find_runs(&tree, 2));

        // The sibling of 1 closes the run even though 1 - 3 is a parent-child edge.
        let tree = tree_of(&[(1, 0, &[7]), (2, 0, &[7]), (3, 1, &[7])], &log);
        assert!(find_runs(&tree, 2).is_empty());
    }

    #[test]
    fn runs_skip_empty_targets() {
        let log = Log::default();
        let tree = tree_of(&[(1, 0, &[]), (2, 1, &[]), (3, 2, &[])], &log);
        assert!(find_runs(&tree, 1).is_empty());
    }
}
