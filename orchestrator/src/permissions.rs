// Group-scoped authorization for job and trigger access

use crate::errors::SchedulerError;
use std::collections::BTreeSet;
use tracing::warn;

/// Group entry granting access to every group
pub const WILDCARD_GROUP: &str = "*";

/// Job groups a caller may see or act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermittedGroups {
    All,
    Only(BTreeSet<String>),
}

impl PermittedGroups {
    /// Build from the caller's group list; a `*` entry grants every group
    pub fn from_groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let groups: BTreeSet<String> = groups.into_iter().map(Into::into).collect();
        if groups.contains(WILDCARD_GROUP) {
            PermittedGroups::All
        } else {
            PermittedGroups::Only(groups)
        }
    }

    pub fn all() -> Self {
        PermittedGroups::All
    }

    pub fn none() -> Self {
        PermittedGroups::Only(BTreeSet::new())
    }

    pub fn authorize(&self, group: &str) -> bool {
        match self {
            PermittedGroups::All => true,
            PermittedGroups::Only(groups) => groups.contains(group),
        }
    }

    /// `Unauthorized` unless the caller may act on `group`
    pub fn ensure_authorized(&self, group: &str) -> Result<(), SchedulerError> {
        if self.authorize(group) {
            return Ok(());
        }
        warn!(group = %group, "Caller not permitted for group");
        Err(SchedulerError::Unauthorized(group.to_string()))
    }

    /// Subset of `candidates` the caller may see, order preserved
    pub fn filter_groups<I, S>(&self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        candidates
            .into_iter()
            .map(Into::into)
            .filter(|group| self.authorize(group))
            .collect()
    }
}
