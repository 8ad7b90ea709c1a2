/// Ordered list of object identifiers a [`Command`] affects.
///
/// Two hashes are equal only if they contain the same identifiers in the same order.
/// [`History::compact`](crate::history::History::compact) uses it as the grouping key.
pub type TargetHash = Vec<u64>;

/// One reversible unit of change.
///
/// [`History`](crate::history::History) never executes a command on its own behalf:
/// the caller runs [`execute`](Command::execute) first, then records the command with
/// [`History::add`](crate::history::History::add).
/// After that the history calls [`undo`](Command::undo) and [`redo`](Command::redo)
/// while navigating.
///
/// [`undo`](Command::undo) MUST be the exact inverse of [`execute`](Command::execute) and
/// [`redo`](Command::redo). Nothing else about the command's semantics is assumed.
///
/// Example
/// ```
/// # use tur::command::{Command, TargetHash};
/// # use std::cell::RefCell;
/// # use std::rc::Rc;
/// struct Add {
///     value: Rc<RefCell<i32>>,
///     delta: i32,
/// }
///
/// impl Command for Add {
///     fn execute(&mut self) {
///         *self.value.borrow_mut() += self.delta;
///     }
///     fn undo(&mut self) {
///         *self.value.borrow_mut() -= self.delta;
///     }
///     fn target_hash(&self) -> TargetHash {
///         vec![0]
///     }
///     fn description(&self) -> String {
///         format!("add {}", self.delta)
///     }
/// }
/// ```
pub trait Command {
    fn execute(&mut self);
    fn undo(&mut self);

    /// Re-applies the command after an [`undo`](Command::undo).
    fn redo(&mut self) {
        self.execute()
    }

    fn target_hash(&self) -> TargetHash;

    /// Type name of the objects this command touches, e.g. `"layer"`.
    fn target_kind(&self) -> Option<&str> {
        None
    }

    fn description(&self) -> String;

    /// Diagnostic dump used for crash logs. Must never panic.
    fn debug_information(&self, indent: usize) -> String {
        format!("{:indent$}{}", "", self.description(), indent = indent)
    }
}

/// The no-op command held by the root of every history tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct Initial;

impl Command for Initial {
    fn execute(&mut self) {}
    fn undo(&mut self) {}
    fn target_hash(&self) -> TargetHash {
        Vec::new()
    }
    fn description(&self) -> String {
        "Initial".to_string()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// A shared log of `(+n | -n)` calls made by [`Record`] commands.
    pub(crate) type Log = Rc<RefCell<Vec<i64>>>;

    /// Test command logging `+n` on execute/redo and `-n` on undo.
    pub(crate) struct Record {
        pub(crate) n: i64,
        pub(crate) targets: TargetHash,
        pub(crate) log: Log,
    }

    impl Record {
        pub(crate) fn new(n: i64, targets: TargetHash, log: &Log) -> Self {
            Self {
                n,
                targets,
                log: log.clone(),
            }
        }
    }

    impl Command for Record {
        fn execute(&mut self) {
            self.log.borrow_mut().push(self.n);
        }
        fn undo(&mut self) {
            self.log.borrow_mut().push(-self.n);
        }
        fn target_hash(&self) -> TargetHash {
            self.targets.clone()
        }
        fn target_kind(&self) -> Option<&str> {
            Some("record")
        }
        fn description(&self) -> String {
            format!("record {}", self.n)
        }
    }

    #[test]
    fn redo_defaults_to_execute() {
        let log = Log::default();
        let mut c = Record::new(3, vec![1], &log);

        c.execute();
        c.undo();
        c.redo();

        assert_eq!(vec![3, -3, 3], *log.borrow());
    }

    #[test]
    fn debug_information_indents() {
        let log = Log::default();
        let c = Record::new(7, vec![1], &log);

        assert_eq!("    record 7", c.debug_information(4));
        assert_eq!("record 7", c.debug_information(0));
    }

    #[test]
    fn initial_is_noop() {
        let mut c = Initial;
        c.execute();
        c.undo();
        c.redo();

        assert!(c.target_hash().is_empty());
        assert_eq!("Initial", c.description());
        assert_eq!(None, c.target_kind());
    }
}
