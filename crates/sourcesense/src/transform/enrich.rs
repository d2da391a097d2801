//! Workflow provenance attached to every envelope.

use serde::{Deserialize, Serialize};

use crate::core::{AttributeSet, RawRecord};

/// Attribute key holding the workflow identifier.
pub const LAST_SYNC_WORKFLOW: &str = "lastSyncWorkflowName";

/// Attribute key holding the workflow run identifier.
pub const LAST_SYNC_RUN: &str = "lastSyncRun";

/// Identity of the run that produced an envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    pub workflow_id: String,
    pub workflow_run_id: String,
}

impl RunIdentity {
    pub fn new(workflow_id: impl Into<String>, workflow_run_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            workflow_run_id: workflow_run_id.into(),
        }
    }

    /// Provenance for this run.
    pub fn enrich(&self, raw: &RawRecord) -> AttributeSet {
        enrich(&self.workflow_id, &self.workflow_run_id, raw)
    }
}

/// Build the provenance attributes for one row.
///
/// Provenance lives in `attributes` only; the returned custom set is always
/// empty. The raw record is accepted so enrichment can grow row-dependent
/// fields without changing callers, but today's output depends on the run
/// identifiers alone.
pub fn enrich(workflow_id: &str, workflow_run_id: &str, _raw: &RawRecord) -> AttributeSet {
    AttributeSet::new()
        .attr(LAST_SYNC_WORKFLOW, workflow_id)
        .attr(LAST_SYNC_RUN, workflow_run_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RawValue;

    #[test]
    fn test_enrich_sets_provenance() {
        let set = enrich("wf-1", "run-9", &RawRecord::new());
        assert_eq!(set.attributes[LAST_SYNC_WORKFLOW], RawValue::from("wf-1"));
        assert_eq!(set.attributes[LAST_SYNC_RUN], RawValue::from("run-9"));
        assert!(set.custom_attributes.is_empty());
    }

    #[test]
    fn test_enrich_ignores_row_content() {
        let run = RunIdentity::new("wf", "run");
        let a = run.enrich(&RawRecord::new());
        let b = run.enrich(&RawRecord::new().with("table_name", "orders"));
        assert_eq!(a, b);
    }
}
