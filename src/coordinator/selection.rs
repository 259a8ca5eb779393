//! Branch selection: reconcile what the caller asked for with what is
//! actually registered.

use tracing::warn;

use crate::collector::BranchKind;

/// Intersect `requested` with `registered`, preserving registration order
/// and dropping duplicates. An empty request, or a request that matches
/// nothing, falls back to every registered branch so a typo never produces
/// an empty run.
pub fn select_branches(requested: &[BranchKind], registered: &[BranchKind]) -> Vec<BranchKind> {
    if requested.is_empty() {
        return registered.to_vec();
    }
    let selected: Vec<BranchKind> = registered
        .iter()
        .copied()
        .filter(|branch| requested.contains(branch))
        .collect();
    if selected.is_empty() {
        warn!(
            ?requested,
            "no requested branch is registered, running all branches"
        );
        return registered.to_vec();
    }
    selected
}
