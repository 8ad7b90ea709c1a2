//! A tree-structured undo-redo framework with history compaction.
//!
//! Example
//!
//! ```rust
//! use tur::prelude::*;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! struct Append {
//!     text: Rc<RefCell<String>>,
//!     c: char,
//! }
//!
//! impl Command for Append {
//!     fn execute(&mut self) {
//!         self.text.borrow_mut().push(self.c);
//!     }
//!     fn undo(&mut self) {
//!         self.text.borrow_mut().pop();
//!     }
//!     fn target_hash(&self) -> TargetHash {
//!         vec![0]
//!     }
//!     fn description(&self) -> String {
//!         format!("append {}", self.c)
//!     }
//! }
//!
//! fn main() {
//!     let text = Rc::new(RefCell::new(String::new()));
//!     let mut history = HistoryBuilder::new().build().unwrap();
//!
//!     for c in "hello".chars() {
//!         let mut command = Append { text: text.clone(), c };
//!         command.execute();
//!         history.add(command);
//!     }
//!     assert_eq!("hello", *text.borrow());
//!
//!     // Five edits of the same object become one compacted node.
//!     assert_eq!(Some(1), history.compact());
//!     assert_eq!(5, history.undo_depth().edits());
//!
//!     history.undo(true);
//!     assert_eq!("hell", *text.borrow());
//!
//!     history.undo(false);
//!     assert_eq!("", *text.borrow());
//!
//!     history.redo(false);
//!     assert_eq!("hello", *text.borrow());
//! }
//! ```
pub mod command;
pub mod compact;
pub mod error;
pub mod event;
pub mod history;
pub mod metrics;
pub mod node;
pub mod scheduler;
pub mod settings;
mod tree;

pub mod prelude {
    pub use crate::command::{Command, TargetHash};
    pub use crate::error::{Error, Result};
    pub use crate::event::Event;
    pub use crate::history::{History, HistoryBuilder};
    pub use crate::settings::{CompactingStrategy, Settings};
}
