//! Intent drift analysis core.
//!
//! Single-call path: [`prompt`] → [`ModelCaller`] → [`validate`] →
//! [`postprocess`]. The ensemble path fans the same pipeline out over
//! thinking levels and folds the results with [`compute_consensus`].

mod analyzer;
mod caller;
pub mod demo;
mod ensemble;
pub mod postprocess;
pub mod prompt;
mod types;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_support;

pub use analyzer::{validate_request, DriftAnalyzer};
pub use caller::{CallOutcome, ModelCaller};
pub use ensemble::{compute_consensus, EnsembleOrchestrator, MIN_SUCCESS_COUNT};
pub use types::*;

use tracing::warn;

use crate::storage::{Invocation, SqliteStorage, Storage};

/// Invocation log name for single analyses.
pub const ANALYZE_TOOL: &str = "drift_analyze";

/// Invocation log name for ensemble analyses.
pub const ENSEMBLE_TOOL: &str = "drift_analyze_ensemble";

/// Persist an invocation. A storage failure never fails the analysis.
async fn record_invocation(storage: &SqliteStorage, invocation: &Invocation) {
    if let Err(e) = storage.log_invocation(invocation).await {
        warn!(
            tool = %invocation.tool_name,
            error = %e,
            "Failed to log invocation"
        );
    }
}
