use semver::Version;

/// Where reconciliation stands for one installation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileState {
    Idle,
    NeedsBootstrap,
    Reconciling { version: Version },
    UpToDate { version: Version },
}

impl ReconcileState {
    pub fn is_up_to_date(&self) -> bool {
        matches!(self, ReconcileState::UpToDate { .. })
    }
}
