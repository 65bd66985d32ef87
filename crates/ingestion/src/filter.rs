//! Item allow-list filtering.

use std::collections::HashSet;

use market_core::{AllowList, Snapshot};

/// Narrows snapshots to the tracked item universe.
///
/// Items absent from every category are dropped silently.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// `None` keeps every item.
    allowed: Option<HashSet<String>>,
}

impl ItemFilter {
    /// A filter that keeps everything.
    pub fn allow_all() -> Self {
        Self { allowed: None }
    }

    /// Keep only items listed in some category of `list`.
    pub fn from_allow_list(list: &AllowList) -> Self {
        Self {
            allowed: Some(list.item_set()),
        }
    }

    /// Keep only the given items.
    pub fn from_items<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: Some(items.into_iter().map(Into::into).collect()),
        }
    }

    /// Whether `item` is tracked.
    #[inline]
    pub fn allows(&self, item: &str) -> bool {
        self.allowed.as_ref().map_or(true, |set| set.contains(item))
    }

    /// Number of tracked items, `None` when unrestricted.
    pub fn len(&self) -> Option<usize> {
        self.allowed.as_ref().map(HashSet::len)
    }

    /// Drop untracked items from one snapshot, keeping document order.
    pub fn apply(&self, snapshot: &mut Snapshot) {
        if self.allowed.is_some() {
            snapshot.items.retain(|q| self.allows(&q.item));
        }
    }

    /// Drop untracked items from every snapshot.
    pub fn apply_all(&self, snapshots: &mut [Snapshot]) {
        for snapshot in snapshots {
            self.apply(snapshot);
        }
    }
}
