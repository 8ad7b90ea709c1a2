/// Undo-redo demo
/// This program prints which commands are called, and in which order, during `add`, `undo`,
/// `redo`, `compact`, and `revert_to`.
///
use std::cell::RefCell;
use std::rc::Rc;
use tur::prelude::*;

/// Adds a value to a shared counter.
/// The methods print messages when they are called.
struct AddTo {
    counter: Rc<RefCell<i32>>,
    value: i32,
    target: u64,
}

impl Command for AddTo {
    fn execute(&mut self) {
        *self.counter.borrow_mut() += self.value;
        println!("{}: Execute. -> {}", self.description(), self.counter.borrow());
    }
    fn undo(&mut self) {
        *self.counter.borrow_mut() -= self.value;
        println!("{}: Undo. -> {}", self.description(), self.counter.borrow());
    }
    fn redo(&mut self) {
        *self.counter.borrow_mut() += self.value;
        println!("{}: Redo. -> {}", self.description(), self.counter.borrow());
    }
    fn target_hash(&self) -> TargetHash {
        vec![self.target]
    }
    fn target_kind(&self) -> Option<&str> {
        Some("counter")
    }
    fn description(&self) -> String {
        format!("add {} to #{}", self.value, self.target)
    }
}

fn main() -> Result<()> {
    println!("# INITIALIZE #");
    let counter = Rc::new(RefCell::new(0));
    let mut history = HistoryBuilder::new()
        .on_event(|event| {
            if let Event::Compacted { runs, nodes } = event {
                println!("(compacted {} nodes into {} runs)", nodes, runs);
            }
        })
        .build()?;

    println!("\n# ADD 6 TIMES #");
    for i in 0..6 {
        let mut command = AddTo {
            counter: counter.clone(),
            value: i + 1,
            target: if i < 5 { 0 } else { 1 },
        };
        command.execute();
        history.add(command);
    }

    println!("\n# COMPACT #");
    history.compact();
    println!("{}", history.debug_information());

    println!("\n# STEP UNDO 3 TIMES #");
    for i in 0..3 {
        println!("## Undo({}) ##", i);
        history.undo(true);
    }

    println!("\n# FULL REDO #");
    history.redo(false);

    println!("\n# REVERT TO ROOT #");
    history.revert_to(history.root_id());

    println!("\n# REDO ALL #");
    while history.can_redo() {
        history.redo(false);
    }

    println!("\n# HISTORY #");
    println!("{}", history.debug_information());
    Ok(())
}
