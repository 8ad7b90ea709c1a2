use crate::command::{Command, TargetHash};
use crate::compact::CompactRun;

/// Identifier of a node in a [`History`](crate::history::History).
///
/// Ids are handed out by a monotonically increasing counter and never reused,
/// so every child has a greater id than its parent.
pub type NodeId = u64;

/// Whether a node records one command or a compacted run of commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    Normal,
    Compacted,
}

/// Payload of a [`Node`].
pub enum NodeKind<'a> {
    Normal(Box<dyn Command + 'a>),
    Compacted(CompactRun<'a>),
}

/// A recorded command plus its position in the history tree.
///
/// Linkage is stored as ids into the owning tree, never as references.
pub struct Node<'a> {
    id: NodeId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind<'a>,
}

impl<'a> Node<'a> {
    pub(crate) fn new(id: NodeId, parent: Option<NodeId>, kind: NodeKind<'a>) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
            kind,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// [None] only for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in creation order; the last one is the most recent branch.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn kind(&self) -> &NodeKind<'a> {
        &self.kind
    }

    pub fn entry_type(&self) -> EntryType {
        match self.kind {
            NodeKind::Normal(_) => EntryType::Normal,
            NodeKind::Compacted(_) => EntryType::Compacted,
        }
    }

    pub fn is_compacted(&self) -> bool {
        self.entry_type() == EntryType::Compacted
    }

    /// Returns the recorded command.
    ///
    /// For a compacted node this is the most recently applied command of the run,
    /// or [None] if nothing of the run is applied.
    pub fn command(&self) -> Option<&(dyn Command + 'a)> {
        match &self.kind {
            NodeKind::Normal(c) => Some(&**c),
            NodeKind::Compacted(run) => run.cursor().checked_sub(1).map(|i| run.command(i)),
        }
    }

    pub fn compact_run(&self) -> Option<&CompactRun<'a>> {
        match &self.kind {
            NodeKind::Compacted(run) => Some(run),
            _ => None,
        }
    }

    pub(crate) fn compact_run_mut(&mut self) -> Option<&mut CompactRun<'a>> {
        match &mut self.kind {
            NodeKind::Compacted(run) => Some(run),
            _ => None,
        }
    }

    pub(crate) fn command_mut(&mut self) -> Option<&mut (dyn Command + 'a)> {
        match &mut self.kind {
            NodeKind::Normal(c) => Some(&mut **c),
            _ => None,
        }
    }

    /// Target hash shared by everything this node records.
    pub fn target_hash(&self) -> TargetHash {
        match &self.kind {
            NodeKind::Normal(c) => c.target_hash(),
            NodeKind::Compacted(run) => run.command(0).target_hash(),
        }
    }

    /// Number of user-visible edits this node stands for.
    pub fn edit_count(&self) -> usize {
        match &self.kind {
            NodeKind::Normal(_) => 1,
            NodeKind::Compacted(run) => run.len(),
        }
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<NodeId> {
        &mut self.children
    }

    pub(crate) fn into_parts(self) -> (NodeId, Option<NodeId>, Vec<NodeId>, NodeKind<'a>) {
        (self.id, self.parent, self.children, self.kind)
    }

    pub(crate) fn debug_information(&self, indent: usize) -> String {
        match &self.kind {
            NodeKind::Normal(c) => format!(
                "{:indent$}#{} {}",
                "",
                self.id,
                c.debug_information(0).trim_start(),
                indent = indent
            ),
            NodeKind::Compacted(run) => {
                let mut s = format!(
                    "{:indent$}#{} compacted {}/{}",
                    "",
                    self.id,
                    run.cursor(),
                    run.len(),
                    indent = indent
                );
                for (id, command) in run.iter() {
                    s.push('\n');
                    s.push_str(&format!(
                        "{:indent$}  ({}) {}",
                        "",
                        id,
                        command.debug_information(0).trim_start(),
                        indent = indent
                    ));
                }
                s
            }
        }
    }
}

impl<'a> std::fmt::Debug for Node<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("entry_type", &self.entry_type())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::command::test::{Log, Record};
    use crate::command::Initial;
    use crate::compact::Entry;

    fn record(n: i64, log: &Log) -> Box<dyn Command> {
        Box::new(Record::new(n, vec![1, 2], log))
    }

    #[test]
    fn normal_node() {
        let log = Log::default();
        let node = Node::new(3, Some(1), NodeKind::Normal(record(3, &log)));

        assert_eq!(3, node.id());
        assert_eq!(Some(1), node.parent());
        assert!(node.children().is_empty());
        assert_eq!(EntryType::Normal, node.entry_type());
        assert!(!node.is_compacted());
        assert_eq!(vec![1, 2], node.target_hash());
        assert_eq!(1, node.edit_count());
        assert_eq!("record 3", node.command().unwrap().description());
        assert!(node.compact_run().is_none());
    }

    #[test]
    fn compacted_node_reports_applied_command() {
        let log = Log::default();
        let entries = (1..=3).map(|n| Entry::new(n, record(n as i64, &log))).collect();
        let mut node = Node::new(1, Some(0), NodeKind::Compacted(CompactRun::new(entries, 3)));

        assert!(node.is_compacted());
        assert_eq!(3, node.edit_count());
        assert_eq!("record 3", node.command().unwrap().description());

        node.compact_run_mut().unwrap().full_undo();
        assert!(node.command().is_none());
        assert!(node.command_mut().is_none());
    }

    #[test]
    fn debug_information() {
        let node = Node::new(0, None, NodeKind::Normal(Box::new(Initial)));
        assert_eq!("  #0 Initial", node.debug_information(2));
    }
}
