use crate::services::merge::MergeMode;
use crate::services::merge::identity::TrackIdentitySet;

/// Mutations needed to bring the target in line with the sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Source uris missing from the target, in source order.
    pub to_add: Vec<String>,
    /// Target uris missing from every source, in target order. Only filled
    /// when syncing an existing playlist.
    pub to_remove: Vec<String>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

pub fn compute_plan(
    source: &TrackIdentitySet,
    target: &TrackIdentitySet,
    sync: bool,
    mode: MergeMode,
) -> ReconciliationPlan {
    let to_add = source.difference(target);
    let to_remove = if sync && mode == MergeMode::Update {
        target.difference(source)
    } else {
        Vec::new()
    };

    ReconciliationPlan { to_add, to_remove }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> TrackIdentitySet {
        items.iter().collect()
    }

    #[test]
    fn test_sync_update() {
        let plan = compute_plan(&set(&["A", "B", "C"]), &set(&["A", "D"]), true, MergeMode::Update);

        assert_eq!(plan.to_add, vec!["B", "C"]);
        assert_eq!(plan.to_remove, vec!["D"]);
    }

    #[test]
    fn test_no_removals_without_sync() {
        let source = set(&["A", "B"]);
        let target = set(&["C", "D", "A"]);

        for mode in [MergeMode::Create, MergeMode::Update] {
            let plan = compute_plan(&source, &target, false, mode);
            assert!(plan.to_remove.is_empty());
        }
    }

    #[test]
    fn test_no_removals_on_create() {
        let plan = compute_plan(&set(&["A"]), &set(&["Z"]), true, MergeMode::Create);
        assert!(plan.to_remove.is_empty());
    }

    #[test]
    fn test_additions_never_duplicate_target() {
        let source = set(&["A", "B", "C", "D"]);
        let target = set(&["D", "B"]);

        let plan = compute_plan(&source, &target, true, MergeMode::Update);

        assert!(plan.to_add.iter().all(|uri| !target.contains(uri)));
        assert_eq!(plan.to_add, vec!["A", "C"]);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let source = set(&["x", "c", "a", "q", "b"]);
        let target = set(&["b", "z", "y", "x"]);

        let first = compute_plan(&source, &target, true, MergeMode::Update);
        for _ in 0..10 {
            assert_eq!(compute_plan(&source, &target, true, MergeMode::Update), first);
        }
        assert_eq!(first.to_remove, vec!["z", "y"]);
    }

    #[test]
    fn test_identical_sets_need_nothing() {
        let both = set(&["A", "B"]);
        assert!(compute_plan(&both, &both, true, MergeMode::Update).is_empty());
    }
}
