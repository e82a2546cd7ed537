use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultMode {
    Flat,
    PerPackage,
}

impl ResultMode {
    pub fn from_per_package(per_package: bool) -> Self {
        if per_package {
            Self::PerPackage
        } else {
            Self::Flat
        }
    }

    pub fn is_per_package(self) -> bool {
        self == Self::PerPackage
    }
}

/// Outcome of a grouping request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingChange {
    /// The requested mode differs from the visible one and may be applied.
    Switch(ResultMode),
    /// Already showing the requested mode.
    Unchanged,
    /// Per-package view requested while the toggle is disabled.
    Disabled,
}

/// Flat vs. per-package view switch.
///
/// The toggle is disabled once the package list resolves to exactly one
/// package; with zero or several packages it stays enabled.
#[derive(Debug, Clone)]
pub struct GroupingController {
    visible: ResultMode,
    toggle_enabled: bool,
}

impl Default for GroupingController {
    fn default() -> Self {
        Self {
            visible: ResultMode::Flat,
            toggle_enabled: true,
        }
    }
}

impl GroupingController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible(&self) -> ResultMode {
        self.visible
    }

    pub fn toggle_enabled(&self) -> bool {
        self.toggle_enabled
    }

    /// Update toggle availability from the resolved package list.
    /// Returns the new enabled state.
    pub fn set_packages(&mut self, packages: &[String]) -> bool {
        self.toggle_enabled = packages.len() != 1;
        self.toggle_enabled
    }

    /// Decide what a request for `requested` means without applying it.
    pub fn request(&self, requested: ResultMode) -> GroupingChange {
        if requested == ResultMode::PerPackage && !self.toggle_enabled {
            return GroupingChange::Disabled;
        }
        if requested == self.visible {
            return GroupingChange::Unchanged;
        }
        GroupingChange::Switch(requested)
    }

    /// Mark `mode` as visible. Called after history has been rewritten.
    pub fn commit(&mut self, mode: ResultMode) {
        self.visible = mode;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_mode_is_noop() {
        let grouping = GroupingController::new();
        assert_eq!(grouping.request(ResultMode::Flat), GroupingChange::Unchanged);
    }

    #[test]
    fn test_switch_and_back() {
        let mut grouping = GroupingController::new();
        assert_eq!(
            grouping.request(ResultMode::PerPackage),
            GroupingChange::Switch(ResultMode::PerPackage)
        );
        grouping.commit(ResultMode::PerPackage);
        assert_eq!(
            grouping.request(ResultMode::PerPackage),
            GroupingChange::Unchanged
        );
        assert_eq!(
            grouping.request(ResultMode::Flat),
            GroupingChange::Switch(ResultMode::Flat)
        );
    }

    #[test]
    fn test_single_package_disables_toggle() {
        let mut grouping = GroupingController::new();
        assert!(!grouping.set_packages(&["i3-wm".to_string()]));
        assert_eq!(
            grouping.request(ResultMode::PerPackage),
            GroupingChange::Disabled
        );
        // switching back to flat is always allowed
        assert_eq!(grouping.request(ResultMode::Flat), GroupingChange::Unchanged);

        assert!(grouping.set_packages(&[]));
        assert!(grouping.set_packages(&["a".to_string(), "b".to_string()]));
        assert_eq!(
            grouping.request(ResultMode::PerPackage),
            GroupingChange::Switch(ResultMode::PerPackage)
        );
    }
}
