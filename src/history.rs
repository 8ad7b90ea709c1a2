use crate::command::Command;
use crate::compact::{self, CompactRun};
use crate::error::Result;
use crate::event::Event;
use crate::metrics::Depth;
use crate::node::{Node, NodeId, NodeKind};
use crate::scheduler::{CompactionTimer, Tick};
use crate::settings::{CompactingStrategy, Settings};
use crate::tree::Tree;
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// A builder to create a [History].
pub struct HistoryBuilder<'a> {
    settings: Settings,
    observer: Box<dyn FnMut(&Event) + 'a>,
}

impl<'a> HistoryBuilder<'a> {
    /// Create a new builder instance with default [Settings].
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
            observer: Box::new(|_e| {}),
        }
    }

    /// Replaces all settings at once.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn min_entries_to_compact(mut self, n: usize) -> Self {
        self.settings.min_entries_to_compact = n;
        self
    }

    pub fn auto_compacting_min_size(mut self, n: usize) -> Self {
        self.settings.auto_compacting_min_size = n;
        self
    }

    pub fn auto_compacting_delay(mut self, delay: Duration) -> Self {
        self.settings.auto_compacting_delay = delay;
        self
    }

    pub fn notify_interval(mut self, interval: Duration) -> Self {
        self.settings.notify_interval = interval;
        self
    }

    pub fn strategy(mut self, strategy: CompactingStrategy) -> Self {
        self.settings.strategy = strategy;
        self
    }

    /// Takes a closure receiving every [Event] of the history.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Event) + 'a,
    {
        self.observer = Box::new(f);
        self
    }

    /// Create a new [History].
    ///
    /// # Errors
    /// Fails if the settings are invalid or the compaction timer cannot be started.
    pub fn build(self) -> Result<History<'a>> {
        History::new(self.settings, self.observer)
    }
}

impl<'a> Default for HistoryBuilder<'a> {
    fn default() -> Self {
        Self::new()
    }
}

/// A tree-structured undo-redo history with compaction.
///
/// # Recording
/// The caller executes a [Command] itself, then records it with [add](History::add).
/// The command becomes a child of the current node, and the current node advances to it.
/// Adding after an undo does not discard anything: it starts a new branch.
/// ```txt
/// add c1, add c2, undo, add c3:
///
/// root --- c1 --- c2
///             \
///              -- c3 <- current
/// ```
/// [redo](History::redo) follows the most recent branch;
/// [redo_branch](History::redo_branch) picks one explicitly.
///
/// # Navigation
/// [undo](History::undo) and [redo](History::redo) move one node at a time.
/// [revert_to](History::revert_to) jumps to any node: it undoes the current path up to the
/// lowest common ancestor, then redoes the path down to the target.
///
/// # Compaction
/// [compact](History::compact) replaces long linear runs of commands with the same
/// target hash by compacted nodes. See [compact](crate::compact) for the rules.
/// A compacted node can be undone/redone as a whole, or step by step with `step = true`.
///
/// # Thread-safety
/// [History] is meant to be driven by one thread.
/// Time-based compaction runs its timer on another thread, but the ticks are only acted
/// upon in [poll_timer](History::poll_timer).
pub struct History<'a> {
    tree: Tree<'a>,
    current: NodeId,
    next_id: NodeId,

    settings: Settings,
    observer: Box<dyn FnMut(&Event) + 'a>,
    timer: Option<CompactionTimer>,

    steps: usize,
    last_compaction_steps: usize,
    compacting: bool,
}

impl<'a> History<'a> {
    pub(crate) fn new(settings: Settings, observer: Box<dyn FnMut(&Event) + 'a>) -> Result<Self> {
        settings.validate()?;
        let timer = Self::start_timer(&settings)?;
        Ok(Self {
            tree: Tree::new(0),
            current: 0,
            next_id: 1,
            settings,
            observer,
            timer,
            steps: 0,
            last_compaction_steps: 0,
            compacting: false,
        })
    }

    fn start_timer(settings: &Settings) -> Result<Option<CompactionTimer>> {
        match settings.strategy {
            CompactingStrategy::EveryXMinutes => Ok(Some(CompactionTimer::start(
                settings.auto_compacting_delay,
                settings.notify_interval,
            )?)),
            _ => Ok(None),
        }
    }

    fn emit(&mut self, event: Event) {
        (self.observer)(&event);
    }

    fn emit_modified(&mut self, slot: Slot) {
        let event = self.command_at(slot).map(|c| Event::ObjectModified {
            kind: c.target_kind().map(str::to_string),
            targets: c.target_hash(),
        });
        if let Some(event) = event {
            self.emit(event);
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replaces the compaction settings.
    ///
    /// The running compaction timer is replaced once the new one has started.
    /// On error the previous settings and timer stay in effect.
    pub fn set_settings(&mut self, settings: Settings) -> Result<()> {
        settings.validate()?;
        let timer = Self::start_timer(&settings)?;
        self.timer = timer;
        self.settings = settings;
        self.last_compaction_steps = self.steps;
        Ok(())
    }

    pub fn root_id(&self) -> NodeId {
        self.tree.root()
    }

    pub fn current_id(&self) -> NodeId {
        self.current
    }

    /// Returns the node `id`, or [None] if no live node has that id.
    ///
    /// Nodes hidden inside a compacted node are not found; the compacted node carries
    /// the id of its first command.
    pub fn node_with_id(&self, id: NodeId) -> Option<&Node<'a>> {
        self.tree.get(id)
    }

    pub fn current_command(&self) -> Option<&(dyn Command + 'a)> {
        self.tree.get(self.current)?.command()
    }

    /// Number of live nodes, including the root.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// true if nothing has been recorded since creation or [clear](History::clear).
    pub fn is_empty(&self) -> bool {
        self.tree.len() <= 1
    }

    fn command_at(&self, slot: Slot) -> Option<&(dyn Command + 'a)> {
        let found = self.tree.get(slot.node).and_then(|node| match node.kind() {
            NodeKind::Normal(c) if slot.node == slot.id => Some(&**c),
            NodeKind::Compacted(run) if slot.index < run.len() && run.id(slot.index) == slot.id => {
                Some(run.command(slot.index))
            }
            _ => None,
        });
        // An auto-compaction since the slot was taken may have moved the command.
        found.or_else(|| self.find_command(slot.id))
    }

    fn find_command(&self, id: NodeId) -> Option<&(dyn Command + 'a)> {
        self.tree.iter().find_map(|node| match node.kind() {
            NodeKind::Normal(c) if node.id() == id => Some(&**c),
            NodeKind::Normal(_) => None,
            NodeKind::Compacted(run) => run.iter().find(|(eid, _)| *eid == id).map(|(_, c)| c),
        })
    }

    fn current_run(&self) -> Option<&CompactRun<'a>> {
        self.tree.get(self.current)?.compact_run()
    }

    pub fn can_undo(&self) -> bool {
        self.tree
            .get(self.current)
            .map_or(false, |n| n.parent().is_some())
            || self.can_step_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.tree
            .get(self.current)
            .map_or(false, |n| !n.children().is_empty())
            || self.can_step_redo()
    }

    /// true if the current node is compacted and has applied commands.
    pub fn can_step_undo(&self) -> bool {
        self.current_run().map_or(false, |r| r.has_step_undo())
    }

    /// true if the current node is compacted and has unapplied commands.
    pub fn can_step_redo(&self) -> bool {
        self.current_run().map_or(false, |r| r.has_step_redo())
    }

    /// Records an already executed command as the newest child of the current node.
    ///
    /// # Return
    /// The id of the new node, which becomes the current node.
    pub fn add<C: Command + 'a>(&mut self, command: C) -> NodeId {
        self.add_boxed(Box::new(command))
    }

    /// Same as [add](History::add) for a boxed command.
    pub fn add_boxed(&mut self, command: Box<dyn Command + 'a>) -> NodeId {
        // A partially applied run cannot get a child; split it first.
        if self.can_step_redo() {
            self.uncompact_current();
        }

        let id = self.next_id;
        self.next_id += 1;
        let added = self.tree.add_child(self.current, id, command);
        debug_assert!(added);
        self.current = id;

        tracing::debug!(id, "history node added");
        self.emit(Event::NodeAdded { id });
        self.emit_modified(Slot::node(id));
        id
    }

    /// Undoes the current node.
    ///
    /// On a compacted node, `step = true` undoes one command of the run and stays on the
    /// node; `step = false` undoes the rest of the run and moves to the parent.
    ///
    /// # Return
    /// [None] if nothing was undone, otherwise the undone command.
    pub fn undo(&mut self, step: bool) -> Option<&(dyn Command + 'a)> {
        let slot = self.undo_impl(step)?;
        tracing::debug!(id = slot.id, step, current = self.current, "undo");
        self.emit(Event::UndoPerformed { id: slot.id });
        self.emit_modified(slot);
        self.after_step();
        self.command_at(slot)
    }

    fn undo_impl(&mut self, step: bool) -> Option<Slot> {
        loop {
            let current = self.current;
            let node = self.tree.get_mut(current)?;
            let parent = node.parent();

            if let Some(run) = node.compact_run_mut() {
                if step {
                    if let Some(index) = run.step_undo() {
                        return Some(Slot::entry(run, current, index));
                    }
                } else if run.full_undo() > 0 {
                    self.current = parent?;
                    return Some(Slot::entry(run, current, 0));
                }
                // Nothing of the run is applied: the state is the parent's.
                self.current = parent?;
                continue;
            }

            let parent = parent?;
            node.command_mut()?.undo();
            self.current = parent;
            return Some(Slot::node(current));
        }
    }

    /// Redoes along the most recent branch.
    ///
    /// On a compacted node, `step = true` redoes one command of the run;
    /// `step = false` redoes the rest of the run.
    ///
    /// # Return
    /// [None] if nothing was redone, otherwise the redone command.
    pub fn redo(&mut self, step: bool) -> Option<&(dyn Command + 'a)> {
        self.redo_with(step, None)
    }

    /// Same as [redo](History::redo), but descends into the `child`-th child of the current
    /// node, counting in creation order.
    pub fn redo_branch(&mut self, step: bool, child: usize) -> Option<&(dyn Command + 'a)> {
        self.redo_with(step, Some(child))
    }

    fn redo_with(&mut self, step: bool, child: Option<usize>) -> Option<&(dyn Command + 'a)> {
        let slot = self.redo_impl(step, child)?;
        tracing::debug!(id = slot.id, step, current = self.current, "redo");
        self.emit(Event::RedoPerformed { id: slot.id });
        self.emit_modified(slot);
        self.after_step();
        self.command_at(slot)
    }

    fn redo_impl(&mut self, step: bool, child: Option<usize>) -> Option<Slot> {
        let current = self.current;
        let node = self.tree.get_mut(current)?;
        if let Some(run) = node.compact_run_mut() {
            if run.has_step_redo() {
                let index = redo_run(run, step)?;
                return Some(Slot::entry(run, current, index));
            }
        }

        let children = node.children();
        let index = match child {
            Some(index) => index,
            None => children.len().checked_sub(1)?,
        };
        let target = *children.get(index)?;

        let node = self.tree.get_mut(target)?;
        let slot = match node.compact_run_mut() {
            Some(run) => {
                debug_assert_eq!(0, run.cursor());
                let index = redo_run(run, step)?;
                Slot::entry(run, target, index)
            }
            None => {
                node.command_mut()?.redo();
                Slot::node(target)
            }
        };
        self.current = target;
        Some(slot)
    }

    /// Moves to the node `id`, undoing and redoing everything in between.
    ///
    /// Only the paths below the lowest common ancestor of the current node and the target
    /// are replayed. Compacted nodes on the way are undone/redone as a whole.
    ///
    /// # Return
    /// false if no node has that id; the history is unchanged then.
    pub fn revert_to(&mut self, id: NodeId) -> bool {
        if id == self.current {
            return true;
        }
        let new_path = self.tree.path_from_root(id);
        if new_path.is_empty() {
            return false;
        }
        let old_path = self.tree.path_from_root(self.current);
        let common = old_path
            .iter()
            .zip(&new_path)
            .take_while(|(a, b)| a == b)
            .count();

        // The current node is the common ancestor; finish its run before descending.
        if common == old_path.len() && self.can_step_redo() {
            if let Some(run) = self
                .tree
                .get_mut(self.current)
                .and_then(|n| n.compact_run_mut())
            {
                run.full_redo();
            }
        }

        for &node in old_path[common..].iter().rev() {
            self.undo_node(node);
            self.emit(Event::UndoPerformed { id: node });
            self.emit_modified(Slot::node(node));
        }
        for &node in &new_path[common..] {
            self.redo_node(node);
            self.emit(Event::RedoPerformed { id: node });
            self.emit_modified(Slot::node(node));
        }
        self.current = id;

        tracing::debug!(
            id,
            undone = old_path.len() - common,
            redone = new_path.len() - common,
            "reverted"
        );
        true
    }

    fn undo_node(&mut self, id: NodeId) {
        if let Some(node) = self.tree.get_mut(id) {
            match node.compact_run_mut() {
                Some(run) => {
                    run.full_undo();
                }
                None => {
                    if let Some(c) = node.command_mut() {
                        c.undo();
                    }
                }
            }
        }
    }

    fn redo_node(&mut self, id: NodeId) {
        if let Some(node) = self.tree.get_mut(id) {
            match node.compact_run_mut() {
                Some(run) => {
                    run.full_redo();
                }
                None => {
                    if let Some(c) = node.command_mut() {
                        c.redo();
                    }
                }
            }
        }
    }

    /// Discards the whole history. Node ids keep increasing.
    pub fn clear(&mut self) {
        let root = self.next_id;
        self.next_id += 1;
        self.tree = Tree::new(root);
        self.current = root;
        self.steps = 0;
        self.last_compaction_steps = 0;

        tracing::debug!(root, "history cleared");
        self.emit(Event::Cleared);
    }

    /// Returns the distance from the current node up to the root.
    pub fn undo_depth(&self) -> Depth {
        let mut depth = Depth::zero();
        let mut cursor = self.tree.get(self.current);
        while let Some(node) = cursor {
            let parent = match node.parent() {
                Some(parent) => parent,
                None => break,
            };
            let edits = node.compact_run().map_or(1, |r| r.cursor());
            depth = depth.make_next(1, edits);
            cursor = self.tree.get(parent);
        }
        depth
    }

    /// Returns the distance from the current node down the most recent branches.
    pub fn redo_depth(&self) -> Depth {
        let mut depth = match self.current_run() {
            Some(run) => Depth::zero().make_next(0, run.len() - run.cursor()),
            None => Depth::zero(),
        };
        let mut cursor = self.tree.get(self.current);
        while let Some(node) = cursor
            .and_then(|n| n.children().last())
            .and_then(|c| self.tree.get(*c))
        {
            depth = depth.make_next(1, node.edit_count());
            cursor = Some(node);
        }
        depth
    }

    // Splices the current node back if it is compacted, keeping the state where it is.
    fn uncompact_current(&mut self) {
        let (cursor, parent) = match self.tree.get(self.current) {
            Some(node) => match node.compact_run() {
                Some(run) => (run.cursor(), node.parent()),
                None => return,
            },
            None => return,
        };
        if let Some(ids) = self.tree.uncompact(self.current) {
            self.current = match cursor.checked_sub(1) {
                Some(i) => ids[i],
                None => parent.unwrap_or(self.tree.root()),
            };
        }
    }

    /// Rebuilds every compacted node from scratch.
    ///
    /// All compacted nodes are expanded first, then every eligible run becomes a new
    /// compacted node. The undo/redo state is unchanged: a run containing the current node
    /// becomes the current node, with its cursor just after the current command.
    ///
    /// # Return
    /// The number of compacted nodes, or [None] if called while a compaction is running.
    pub fn compact(&mut self) -> Option<usize> {
        if self.compacting {
            tracing::warn!("reentrant compaction ignored");
            return None;
        }
        self.compacting = true;
        let started = Instant::now();

        self.uncompact_current();
        self.tree.uncompact_all();

        let runs = compact::find_runs(&self.tree, self.settings.min_entries_to_compact);
        let on_path: HashSet<NodeId> = self.tree.path_from_root(self.current).into_iter().collect();

        let mut compacted = 0;
        let mut nodes = 0;
        for run in &runs {
            let position = run.iter().position(|id| *id == self.current);
            let cursor = match position {
                Some(i) => i + 1,
                None if on_path.contains(&run[0]) => run.len(),
                None => 0,
            };
            if let Some(id) = self.tree.insert_in_tree(run, cursor) {
                if position.is_some() {
                    self.current = id;
                }
                compacted += 1;
                nodes += run.len();
            }
        }

        self.compacting = false;
        tracing::debug!(
            runs = compacted,
            nodes,
            elapsed = ?started.elapsed(),
            "history compacted"
        );
        self.emit(Event::Compacted {
            runs: compacted,
            nodes,
        });
        Some(compacted)
    }

    fn after_step(&mut self) {
        if self.settings.strategy != CompactingStrategy::AfterXSize {
            return;
        }
        self.steps += 1;
        let due = self.last_compaction_steps + self.settings.auto_compacting_min_size;
        if due <= self.steps {
            self.compact();
            self.last_compaction_steps = self.steps;
        } else {
            self.emit(Event::CompactionPending {
                remaining_edits: due - self.steps,
            });
        }
    }

    /// Handles the ticks of the time-based compaction timer.
    ///
    /// Call this regularly from the thread owning the history.
    ///
    /// # Return
    /// The number of compactions run.
    pub fn poll_timer(&mut self) -> usize {
        let ticks = match &self.timer {
            Some(timer) => timer.drain(),
            None => return 0,
        };
        let mut count = 0;
        for tick in ticks {
            match tick {
                Tick::Compact => {
                    if self.compact().is_some() {
                        count += 1;
                    }
                }
                Tick::Remaining(remaining) => self.emit(Event::CompactionScheduled { remaining }),
            }
        }
        count
    }

    /// Dumps the whole tree for crash logs, one node per line.
    pub fn debug_information(&self) -> String {
        self.tree
            .depth_first()
            .into_iter()
            .filter_map(|(depth, id)| {
                let mut lines = self.tree.get(id)?.debug_information(depth * 2);
                if id == self.current {
                    let end = lines.find('\n').unwrap_or(lines.len());
                    lines.insert_str(end, " <- current");
                }
                Some(lines)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// Where a replayed command lives.
#[derive(Debug, Clone, Copy)]
struct Slot {
    // Id the command was recorded with.
    id: NodeId,
    // Live node holding it.
    node: NodeId,
    // Index in the run if `node` is compacted.
    index: usize,
}

impl Slot {
    fn node(id: NodeId) -> Self {
        Self {
            id,
            node: id,
            index: 0,
        }
    }

    fn entry(run: &CompactRun<'_>, node: NodeId, index: usize) -> Self {
        Self {
            id: run.id(index),
            node,
            index,
        }
    }
}

// Returns the index of the last redone command.
fn redo_run(run: &mut CompactRun<'_>, step: bool) -> Option<usize> {
    if step {
        run.step_redo()
    } else if run.full_redo() > 0 {
        Some(run.cursor() - 1)
    } else {
        None
    }
}

impl<'a> std::fmt::Debug for History<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("current", &self.current)
            .field("len", &self.tree.len())
            .field("settings", &self.settings)
            .field("timer", &self.timer)
            .finish()
    }
}
