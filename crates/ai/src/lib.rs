//! `arcana-ai`
//!
//! **Responsibility:** the external capability boundary.
//!
//! The four stages of a reading (policy, analysis, selection, narration) are
//! delegations to non-deterministic external systems. This crate defines their
//! contracts and output validation only:
//! - It must not mutate domain state.
//! - Each contract validates its own output shape before returning; a bad
//!   shape is a typed, retryable error.
//! - Policy disapproval is a *value*, never an error — it must not be retried.
//!
//! The `Local*` implementations are deterministic in-process stand-ins for
//! dev and test; production wiring substitutes real model-backed clients.

pub mod analysis;
pub mod error;
pub mod narration;
pub mod policy;
pub mod selection;
pub mod stages;

pub use analysis::{AnalysisStage, LocalAnalysisStage};
pub use error::StageError;
pub use narration::{fallback_reading, LocalNarrationStage, NarrationStage};
pub use policy::{LocalPolicyStage, PolicyOutcome, PolicyStage};
pub use selection::{CardSelection, LocalSelectionStage, SelectionStage};
pub use stages::StageSet;
