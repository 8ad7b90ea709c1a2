use crate::command::{Command, Initial};
use crate::compact::{CompactRun, Entry};
use crate::node::{Node, NodeId, NodeKind};
use std::collections::HashMap;

/// Arena of history nodes addressed by [NodeId].
///
/// The root holds an [Initial] command and is the only node without a parent.
pub(crate) struct Tree<'a> {
    nodes: HashMap<NodeId, Node<'a>>,
    root: NodeId,
}

impl<'a> Tree<'a> {
    pub(crate) fn new(root: NodeId) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(root, Node::new(root, None, NodeKind::Normal(Box::new(Initial))));
        Self { nodes, root }
    }

    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&Node<'a>> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node<'a>> {
        self.nodes.get_mut(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Node<'a>> + '_ {
        self.nodes.values()
    }

    /// Appends a new normal node as the newest child of `parent`.
    ///
    /// # Return
    /// false if `parent` does not exist or `id` is already used.
    pub(crate) fn add_child(
        &mut self,
        parent: NodeId,
        id: NodeId,
        command: Box<dyn Command + 'a>,
    ) -> bool {
        if self.nodes.contains_key(&id) {
            return false;
        }
        match self.nodes.get_mut(&parent) {
            Some(p) => p.children_mut().push(id),
            None => return false,
        }
        self.nodes
            .insert(id, Node::new(id, Some(parent), NodeKind::Normal(command)));
        true
    }

    /// Returns ids from the root down to `id`, both inclusive.
    /// The result is empty if `id` is not in the tree.
    pub(crate) fn path_from_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut cursor = Some(id);
        while let Some(node) = cursor.and_then(|id| self.nodes.get(&id)) {
            path.push(node.id());
            cursor = node.parent();
            if self.nodes.len() < path.len() {
                debug_assert!(false, "cycle in history tree");
                return Vec::new();
            }
        }
        path.reverse();
        path
    }

    /// Ids in depth-first order, children visited in creation order.
    pub(crate) fn depth_first(&self) -> Vec<(usize, NodeId)> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(0, self.root)];
        while let Some((depth, id)) = stack.pop() {
            order.push((depth, id));
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children().iter().rev().map(|c| (depth + 1, *c)));
            }
        }
        order
    }

    /// Replaces a linear run of normal nodes by one compacted node.
    ///
    /// Every node of `run` except the last must have exactly one child: the next node.
    /// The compacted node takes over the id of the first node and the position of the
    /// run; the children of the last node become its children.
    ///
    /// # Return
    /// The id of the compacted node, or [None] if `run` is not a valid run.
    /// The tree is unchanged in the latter case.
    pub(crate) fn insert_in_tree(&mut self, run: &[NodeId], cursor: usize) -> Option<NodeId> {
        let (&first, &last) = (run.first()?, run.last()?);
        let parent = self.nodes.get(&first)?.parent()?;
        for pair in run.windows(2) {
            let node = self.nodes.get(&pair[0])?;
            if node.is_compacted() || node.children() != [pair[1]] {
                return None;
            }
        }
        if self.nodes.get(&last)?.is_compacted() || run.len() < cursor {
            return None;
        }

        let mut entries = Vec::with_capacity(run.len());
        let mut children = Vec::new();
        for id in run {
            if let Some(node) = self.nodes.remove(id) {
                let (id, _, c, kind) = node.into_parts();
                children = c;
                if let NodeKind::Normal(command) = kind {
                    entries.push(Entry::new(id, command));
                }
            }
        }
        debug_assert_eq!(run.len(), entries.len());

        for child in &children {
            if let Some(node) = self.nodes.get_mut(child) {
                node.set_parent(Some(first));
            }
        }

        let mut node = Node::new(
            first,
            Some(parent),
            NodeKind::Compacted(CompactRun::new(entries, cursor)),
        );
        *node.children_mut() = children;
        self.nodes.insert(first, node);
        Some(first)
    }

    /// Splices a compacted node back into the tree as its original linear run.
    ///
    /// # Return
    /// Ids of the restored nodes in run order, or [None] if `id` is not a compacted node.
    pub(crate) fn uncompact(&mut self, id: NodeId) -> Option<Vec<NodeId>> {
        if !self.nodes.get(&id)?.is_compacted() {
            return None;
        }
        let (id, parent, children, kind) = self.nodes.remove(&id)?.into_parts();
        let entries = match kind {
            NodeKind::Compacted(run) => run.into_entries(),
            NodeKind::Normal(_) => return None,
        };

        let ids: Vec<NodeId> = entries.iter().map(|e| e.id).collect();
        debug_assert_eq!(Some(&id), ids.first());
        let last = ids.last().copied().unwrap_or(id);

        for child in &children {
            if let Some(node) = self.nodes.get_mut(child) {
                node.set_parent(Some(last));
            }
        }

        let mut prev = parent;
        let mut tail = Some(children);
        for (i, entry) in entries.into_iter().enumerate() {
            let mut node = Node::new(entry.id, prev, NodeKind::Normal(entry.command));
            match ids.get(i + 1) {
                Some(next) => node.children_mut().push(*next),
                None => *node.children_mut() = tail.take().unwrap_or_default(),
            }
            prev = Some(entry.id);
            self.nodes.insert(entry.id, node);
        }

        Some(ids)
    }

    /// Uncompacts every compacted node, returning how many were expanded.
    pub(crate) fn uncompact_all(&mut self) -> usize {
        let compacted: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.is_compacted())
            .map(|n| n.id())
            .collect();
        compacted
            .into_iter()
            .filter_map(|id| self.uncompact(id))
            .count()
    }
}
