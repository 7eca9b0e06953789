//! Transaction and batch builders.
//!
//! Callers record path operations on a builder, then seal it with
//! `write()`/`commit()`. The sealed [`Transaction`] is handed by value to
//! the owning database.

mod builder;
mod operation;

pub use builder::{
    Batch, BatchMode, CommitTarget, ListItem, ListItemOptions, TransactionBuilder, TransactionMode,
    WriteBuilder,
};
pub use operation::{Transaction, TransactionOperation};
