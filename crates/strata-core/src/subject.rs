//! The subject that change-scripts evolve.

use async_trait::async_trait;

/// The stateful object change-scripts mutate.
///
/// The engine never inspects a subject. It only hands it to change-scripts
/// and tells it when a run has finished.
#[async_trait]
pub trait Subject: Send + Sync {
    /// Called once after a run has persisted its state.
    ///
    /// `warning_count` is the number of active change-scripts left in an
    /// error state. It is not called when the run fails before completion.
    async fn evolution_complete(&self, warning_count: usize) {
        let _ = warning_count;
    }
}
