//! Bundled stage set for dependency injection.

use std::sync::Arc;

use arcana_cards::CardCatalog;

use crate::analysis::{AnalysisStage, LocalAnalysisStage};
use crate::narration::{LocalNarrationStage, NarrationStage};
use crate::policy::{LocalPolicyStage, PolicyStage};
use crate::selection::{LocalSelectionStage, SelectionStage};

/// The four capabilities the orchestrator drives, as injectable trait
/// objects. Constructed once at wiring time and cloned per job.
#[derive(Clone)]
pub struct StageSet {
    pub policy: Arc<dyn PolicyStage>,
    pub analysis: Arc<dyn AnalysisStage>,
    pub selection: Arc<dyn SelectionStage>,
    pub narration: Arc<dyn NarrationStage>,
}

impl StageSet {
    pub fn new(
        policy: Arc<dyn PolicyStage>,
        analysis: Arc<dyn AnalysisStage>,
        selection: Arc<dyn SelectionStage>,
        narration: Arc<dyn NarrationStage>,
    ) -> Self {
        Self {
            policy,
            analysis,
            selection,
            narration,
        }
    }

    /// Deterministic in-process stages for dev/test.
    pub fn local(catalog: Arc<CardCatalog>) -> Self {
        Self {
            policy: Arc::new(LocalPolicyStage::new()),
            analysis: Arc::new(LocalAnalysisStage),
            selection: Arc::new(LocalSelectionStage),
            narration: Arc::new(LocalNarrationStage::new(catalog)),
        }
    }
}
