//! Role-dependent rules applied to worker model mutations.
//!
//! Every mutation runs in the same order: structural validation, then the policy rules for the
//! caller's role, then type validation. Admins are an explicit override and skip the rules
//! entirely. For everyone else:
//!
//! - a non-restricted model gets `provision` forced to 0 and must name a provisioning pattern
//! - a restricted model may only be created by a member of its owning group
//! - `is_official` cannot be granted, and on update is kept from the stored model
//! - on update the type and type-specific data are kept from the stored model, whatever the
//!   request says
//! - on update, moving a model to another group requires membership of that group

use crate::api::models::users::CurrentUser;
use crate::api::models::worker_models::{WorkerModelDefinition, WorkerModelSpec};
use crate::db::models::groups::GroupDBResponse;
use crate::db::models::worker_models::WorkerModelDBResponse;
use crate::errors::{Error, Result};
use crate::policy::validator::{WorkerModelStructure, validate_structure, validate_type};
use crate::types::{GroupId, Operation, Permission, Resource};

/// A definition that passed every check for a given caller, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedWorkerModel {
    pub name: String,
    pub description: Option<String>,
    pub group_id: GroupId,
    pub spec: WorkerModelSpec,
    pub restricted: bool,
    pub provision: i32,
    pub pattern_name: Option<String>,
    pub registered_capabilities: Vec<String>,
    pub is_deprecated: bool,
    pub disabled: bool,
    pub is_official: bool,
}

impl PreparedWorkerModel {
    fn assemble(structure: WorkerModelStructure, spec: WorkerModelSpec, definition: WorkerModelDefinition) -> Self {
        let pattern_name = Some(definition.pattern_name.trim().to_string()).filter(|p| !p.is_empty());
        Self {
            name: structure.name,
            description: definition.description,
            group_id: structure.group_id,
            spec,
            restricted: definition.restricted,
            // validate_structure bounds provision to 0..=i32::MAX and the rules only lower it
            provision: definition.provision as i32,
            pattern_name,
            registered_capabilities: definition.registered_capabilities,
            is_deprecated: definition.is_deprecated,
            disabled: definition.disabled,
            is_official: definition.is_official,
        }
    }
}

fn forbidden(operation: Operation, resource: String) -> Error {
    Error::InsufficientPermissions {
        required: Permission::Any(vec![Permission::Allow(Resource::WorkerModels, operation), Permission::GroupMember]),
        action: operation,
        resource,
    }
}

/// Provisioning rule for non-admins: non-restricted models cannot pre-warm instances and must
/// go through a shared pattern.
fn apply_provision_rules(definition: &mut WorkerModelDefinition) -> Result<()> {
    if definition.restricted {
        return Ok(());
    }
    definition.provision = 0;
    if definition.pattern_name.trim().is_empty() {
        return Err(Error::MissingPatternReference);
    }
    Ok(())
}

/// Validate and sanitize a definition submitted for creation.
pub fn prepare_for_create(caller: &CurrentUser, mut definition: WorkerModelDefinition) -> Result<PreparedWorkerModel> {
    let structure = validate_structure(&definition)?;

    if !caller.is_admin() {
        apply_provision_rules(&mut definition)?;

        if definition.restricted && !caller.is_group_member(structure.group_id) {
            return Err(forbidden(
                Operation::CreateAll,
                format!("restricted worker models in group {}", structure.group_id),
            ));
        }

        definition.is_official = false;
    }

    let spec = validate_type(&definition, structure.model_type)?;
    Ok(PreparedWorkerModel::assemble(structure, spec, definition))
}

/// Validate and sanitize a definition replacing `existing`.
///
/// The caller must already have passed [`authorize_update`] against the existing model's group.
pub fn prepare_for_update(
    caller: &CurrentUser,
    existing: &WorkerModelDBResponse,
    mut definition: WorkerModelDefinition,
) -> Result<PreparedWorkerModel> {
    let mut structure = validate_structure(&definition)?;

    if !caller.is_admin() {
        apply_provision_rules(&mut definition)?;

        if structure.group_id != existing.group_id && !caller.is_group_member(structure.group_id) {
            return Err(forbidden(
                Operation::UpdateAll,
                format!("worker models of group {}", structure.group_id),
            ));
        }

        definition.is_official = existing.is_official;

        // Type and configuration stay whatever an admin last set
        structure.model_type = existing.spec.model_type();
        definition.model_type = Some(structure.model_type.to_string());
        definition.docker = existing.spec.docker().cloned();
        definition.virtual_machine = existing.spec.virtual_machine().cloned();
    }

    let spec = validate_type(&definition, structure.model_type)?;
    Ok(PreparedWorkerModel::assemble(structure, spec, definition))
}

/// Admins and members of the owning group may update a worker model.
pub fn authorize_update(caller: &CurrentUser, group: &GroupDBResponse) -> Result<()> {
    if caller.is_admin() || caller.is_group_member(group.id) {
        return Ok(());
    }
    Err(forbidden(
        Operation::UpdateAll,
        format!("worker models of group '{}'", group.name),
    ))
}

/// Admins and administrators of the owning group may delete a worker model.
pub fn authorize_delete(caller: &CurrentUser, group: &GroupDBResponse) -> Result<()> {
    if caller.is_admin() || caller.is_group_admin(group.id) {
        return Ok(());
    }
    Err(Error::InsufficientPermissions {
        required: Permission::Any(vec![
            Permission::Allow(Resource::WorkerModels, Operation::DeleteAll),
            Permission::GroupAdmin,
        ]),
        action: Operation::DeleteOwn,
        resource: format!("worker models of group '{}'", group.name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::api::models::worker_models::{DockerSpec, VirtualMachineSpec, WorkerModelType};
    use crate::db::models::groups::GroupMembership;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(role: Role, groups: &[(GroupId, bool)]) -> CurrentUser {
        let id = Uuid::new_v4();
        CurrentUser {
            id,
            username: format!("{role:?}").to_lowercase(),
            role,
            memberships: groups
                .iter()
                .map(|&(group_id, is_group_admin)| GroupMembership {
                    group_id,
                    user_id: id,
                    is_group_admin,
                })
                .collect(),
        }
    }

    fn group(id: GroupId, name: &str) -> GroupDBResponse {
        GroupDBResponse {
            id,
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }

    fn docker_section() -> DockerSpec {
        DockerSpec {
            image: "debian:12".to_string(),
            cmd: "./worker".to_string(),
            shell: "sh -c".to_string(),
            ..Default::default()
        }
    }

    fn docker_definition(group_id: GroupId) -> WorkerModelDefinition {
        WorkerModelDefinition {
            name: Some("docker-debian".to_string()),
            model_type: Some("docker".to_string()),
            group_id: Some(group_id.to_string()),
            docker: Some(docker_section()),
            ..Default::default()
        }
    }

    fn vsphere_definition(group_id: GroupId) -> WorkerModelDefinition {
        WorkerModelDefinition {
            model_type: Some("vsphere".to_string()),
            docker: None,
            virtual_machine: Some(VirtualMachineSpec {
                image: "ubuntu-24.04".to_string(),
                cmd: "./worker".to_string(),
                ..Default::default()
            }),
            ..docker_definition(group_id)
        }
    }

    fn stored(group_id: GroupId, spec: WorkerModelSpec) -> WorkerModelDBResponse {
        let now = Utc::now();
        WorkerModelDBResponse {
            id: Uuid::new_v4(),
            name: "docker-debian".to_string(),
            description: None,
            group_id,
            spec,
            restricted: false,
            provision: 0,
            pattern_name: Some("default".to_string()),
            registered_capabilities: vec![],
            is_deprecated: false,
            disabled: false,
            is_official: true,
            nb_spawn_err: 0,
            last_spawn_err: None,
            need_registration: false,
            last_registration: None,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_non_admin_unrestricted_create_requires_pattern() {
        let g1 = Uuid::new_v4();
        let caller = user(Role::Member, &[(g1, false)]);

        let mut definition = docker_definition(g1);
        definition.provision = 5;
        let err = prepare_for_create(&caller, definition.clone()).unwrap_err();
        assert!(matches!(err, Error::MissingPatternReference));

        definition.pattern_name = "default".to_string();
        let prepared = prepare_for_create(&caller, definition).unwrap();
        assert_eq!(prepared.provision, 0);
        assert_eq!(prepared.pattern_name.as_deref(), Some("default"));
    }

    #[test]
    fn test_admin_keeps_provision() {
        let g1 = Uuid::new_v4();
        let admin = user(Role::Admin, &[]);

        let mut definition = docker_definition(g1);
        definition.restricted = true;
        definition.provision = 3;
        let prepared = prepare_for_create(&admin, definition).unwrap();
        assert_eq!(prepared.provision, 3);

        // Admins skip the pattern rule as well
        let mut definition = docker_definition(g1);
        definition.provision = 2;
        let prepared = prepare_for_create(&admin, definition).unwrap();
        assert_eq!(prepared.provision, 2);
        assert_eq!(prepared.pattern_name, None);
    }

    #[test]
    fn test_non_admin_restricted_keeps_provision() {
        let g1 = Uuid::new_v4();
        let caller = user(Role::Member, &[(g1, false)]);

        let mut definition = docker_definition(g1);
        definition.restricted = true;
        definition.provision = 4;
        let prepared = prepare_for_create(&caller, definition).unwrap();
        assert_eq!(prepared.provision, 4);
        assert!(prepared.restricted);
    }

    #[test]
    fn test_restricted_create_requires_group_membership() {
        let (g1, g2) = (Uuid::new_v4(), Uuid::new_v4());
        let caller = user(Role::Member, &[(g1, false)]);

        let mut definition = docker_definition(g2);
        definition.restricted = true;
        let err = prepare_for_create(&caller, definition).unwrap_err();
        assert!(matches!(err, Error::InsufficientPermissions { .. }));
    }

    #[test]
    fn test_non_admin_cannot_grant_official() {
        let g1 = Uuid::new_v4();
        let caller = user(Role::Member, &[(g1, false)]);

        let mut definition = docker_definition(g1);
        definition.pattern_name = "default".to_string();
        definition.is_official = true;
        assert!(!prepare_for_create(&caller, definition.clone()).unwrap().is_official);

        let admin = user(Role::Admin, &[]);
        assert!(prepare_for_create(&admin, definition).unwrap().is_official);
    }

    #[test]
    fn test_structure_checked_before_policy() {
        let g1 = Uuid::new_v4();
        let caller = user(Role::Member, &[(g1, false)]);

        // Missing name and missing pattern: the structural error wins
        let mut definition = docker_definition(g1);
        definition.name = None;
        let err = prepare_for_create(&caller, definition).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_policy_checked_before_type() {
        let g1 = Uuid::new_v4();
        let caller = user(Role::Member, &[(g1, false)]);

        let mut definition = docker_definition(g1);
        definition.docker = None;
        let err = prepare_for_create(&caller, definition.clone()).unwrap_err();
        assert!(matches!(err, Error::MissingPatternReference));

        definition.pattern_name = "default".to_string();
        let err = prepare_for_create(&caller, definition).unwrap_err();
        assert!(matches!(err, Error::TypeValidation(_)));
    }

    #[test]
    fn test_non_admin_update_keeps_type_data() {
        let g1 = Uuid::new_v4();
        let caller = user(Role::Member, &[(g1, false)]);
        let existing = stored(g1, WorkerModelSpec::Docker(docker_section()));

        let mut definition = vsphere_definition(g1);
        definition.pattern_name = "default".to_string();
        let prepared = prepare_for_update(&caller, &existing, definition.clone()).unwrap();
        assert_eq!(prepared.spec, existing.spec);
        assert_eq!(prepared.spec.model_type(), WorkerModelType::Docker);

        // The same request from an admin changes the type
        let admin = user(Role::Admin, &[]);
        let prepared = prepare_for_update(&admin, &existing, definition).unwrap();
        assert_eq!(prepared.spec.model_type(), WorkerModelType::Vsphere);
    }

    #[test]
    fn test_non_admin_update_keeps_official_flag() {
        let g1 = Uuid::new_v4();
        let caller = user(Role::Member, &[(g1, false)]);
        let existing = stored(g1, WorkerModelSpec::Docker(docker_section()));

        let mut definition = docker_definition(g1);
        definition.pattern_name = "default".to_string();
        definition.is_official = false;
        assert!(prepare_for_update(&caller, &existing, definition).unwrap().is_official);
    }

    #[test]
    fn test_non_admin_update_applies_provision_rules() {
        let g1 = Uuid::new_v4();
        let caller = user(Role::Member, &[(g1, false)]);
        let existing = stored(g1, WorkerModelSpec::Docker(docker_section()));

        let mut definition = docker_definition(g1);
        definition.provision = 7;
        let err = prepare_for_update(&caller, &existing, definition.clone()).unwrap_err();
        assert!(matches!(err, Error::MissingPatternReference));

        definition.pattern_name = "default".to_string();
        assert_eq!(prepare_for_update(&caller, &existing, definition).unwrap().provision, 0);
    }

    #[test]
    fn test_update_into_foreign_group_is_forbidden() {
        let (g1, g2) = (Uuid::new_v4(), Uuid::new_v4());
        let caller = user(Role::Member, &[(g1, false)]);
        let existing = stored(g1, WorkerModelSpec::Docker(docker_section()));

        let mut definition = docker_definition(g2);
        definition.pattern_name = "default".to_string();
        let err = prepare_for_update(&caller, &existing, definition.clone()).unwrap_err();
        assert!(matches!(err, Error::InsufficientPermissions { .. }));

        // Moving between two of the caller's groups is fine
        let caller = user(Role::Member, &[(g1, false), (g2, false)]);
        assert_eq!(prepare_for_update(&caller, &existing, definition).unwrap().group_id, g2);
    }

    #[test]
    fn test_update_and_delete_rights() {
        let (g1, g2) = (Uuid::new_v4(), Uuid::new_v4());
        let owning = group(g1, "team-a");

        let member = user(Role::Member, &[(g1, false)]);
        assert!(authorize_update(&member, &owning).is_ok());
        assert!(authorize_delete(&member, &owning).is_err());

        let group_admin = user(Role::Member, &[(g1, true)]);
        assert!(authorize_delete(&group_admin, &owning).is_ok());

        let outsider = user(Role::Maintainer, &[(g2, true)]);
        assert!(authorize_update(&outsider, &owning).is_err());
        assert!(authorize_delete(&outsider, &owning).is_err());

        let admin = user(Role::Admin, &[]);
        assert!(authorize_update(&admin, &owning).is_ok());
        assert!(authorize_delete(&admin, &owning).is_ok());
    }
}
