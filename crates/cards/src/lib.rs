//! Card catalog reference data.
//!
//! Read-only during the workflow: the selection and narration stages consume
//! catalog entries, nothing mutates them.

pub mod catalog;

pub use catalog::{Arcana, Card, CardCatalog, DECK_SIZE};
