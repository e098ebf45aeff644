//! Which groups' worker models a caller may see.

use crate::api::models::users::CurrentUser;
use crate::db::models::groups::GroupDBResponse;
use crate::errors::{Error, Result};
use crate::types::{GroupId, Operation, Permission, Resource};
use std::collections::BTreeSet;

/// Set of owning groups whose worker models are visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibleGroups {
    /// No group restriction (admins and maintainers)
    All,
    Only(BTreeSet<GroupId>),
}

impl VisibleGroups {
    /// Visibility of an entity (project, group) owned by `groups`, always including the shared
    /// infrastructure group.
    pub fn owned_by(groups: impl IntoIterator<Item = GroupId>, shared_infra_group: GroupId) -> Self {
        let mut set: BTreeSet<GroupId> = groups.into_iter().collect();
        set.insert(shared_infra_group);
        VisibleGroups::Only(set)
    }

    pub fn contains(&self, group_id: GroupId) -> bool {
        match self {
            VisibleGroups::All => true,
            VisibleGroups::Only(groups) => groups.contains(&group_id),
        }
    }

    /// Group IDs to filter on, `None` meaning unrestricted
    pub fn as_filter(&self) -> Option<Vec<GroupId>> {
        match self {
            VisibleGroups::All => None,
            VisibleGroups::Only(groups) => Some(groups.iter().copied().collect()),
        }
    }

    /// Stable key fragment identifying this set, used to scope cached listings.
    pub fn cache_scope(&self) -> String {
        match self {
            VisibleGroups::All => "all".to_string(),
            VisibleGroups::Only(groups) => groups.iter().map(|g| g.simple().to_string()).collect::<Vec<_>>().join(","),
        }
    }
}

/// Groups whose worker models `caller` may list.
///
/// Admins and maintainers see everything. Other callers see their own groups plus the shared
/// infrastructure group, which is visible to every authenticated caller.
pub fn resolve_visible_groups(caller: &CurrentUser, shared_infra_group: GroupId) -> VisibleGroups {
    if caller.is_admin() || caller.is_maintainer() {
        return VisibleGroups::All;
    }
    VisibleGroups::owned_by(caller.group_ids(), shared_infra_group)
}

/// Members of a group and admins may read a group's worker models.
///
/// The group has already been resolved, so a missing group surfaces as NotFound before this is
/// reached and never turns into a permission error.
pub fn authorize_group_read(caller: &CurrentUser, group: &GroupDBResponse) -> Result<()> {
    if caller.is_admin() || caller.is_group_member(group.id) {
        return Ok(());
    }
    Err(Error::InsufficientPermissions {
        required: Permission::Any(vec![Permission::Allow(Resource::Groups, Operation::ReadAll), Permission::GroupMember]),
        action: Operation::ReadOwn,
        resource: format!("group '{}'", group.name),
    })
}
