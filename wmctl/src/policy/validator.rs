//! Structural and type-specific validation of worker model definitions.
//!
//! Both checks are pure functions of the definition. [`validate_structure`] looks at what every
//! model needs regardless of its backend; [`validate_type`] checks the section required by the
//! declared type and turns the definition into a [`WorkerModelSpec`], so a model whose
//! type-specific data is missing can never reach the store.

use crate::api::models::worker_models::{WorkerModelDefinition, WorkerModelSpec, WorkerModelType};
use crate::types::GroupId;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid worker model name")]
    MissingName,

    #[error("invalid worker model name '{0}': only letters, digits, '.', '_' and '-' are allowed")]
    InvalidName(String),

    #[error("invalid worker model type")]
    MissingType,

    #[error("unknown worker model type '{0}'")]
    UnknownType(String),

    #[error("missing worker model group data")]
    MissingGroup,

    #[error("malformed worker model group reference '{0}'")]
    MalformedGroup(String),

    #[error("invalid worker model provision {0}")]
    InvalidProvision(i64),
}

impl ValidationError {
    /// Name of the offending field in the request body
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingName | ValidationError::InvalidName(_) => "name",
            ValidationError::MissingType | ValidationError::UnknownType(_) => "type",
            ValidationError::MissingGroup | ValidationError::MalformedGroup(_) => "group_id",
            ValidationError::InvalidProvision(_) => "provision",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeValidationError {
    #[error("worker model of type {model_type} requires a '{section}' section")]
    MissingSection {
        model_type: WorkerModelType,
        section: &'static str,
    },

    #[error("worker model of type {model_type} cannot carry a '{section}' section")]
    UnexpectedSection {
        model_type: WorkerModelType,
        section: &'static str,
    },

    #[error("invalid worker model {field} for type {model_type}")]
    MissingField {
        model_type: WorkerModelType,
        field: &'static str,
    },
}

impl TypeValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            TypeValidationError::MissingSection { section, .. } | TypeValidationError::UnexpectedSection { section, .. } => section,
            TypeValidationError::MissingField { field, .. } => field,
        }
    }
}

/// The caller-independent identity of a definition, as established by [`validate_structure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerModelStructure {
    pub name: String,
    pub model_type: WorkerModelType,
    pub group_id: GroupId,
}

fn is_valid_name(name: &str) -> bool {
    name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Reject definitions with a missing or invalid name, a missing or unknown type, a missing or
/// malformed group reference, or a provision outside `0..=i32::MAX`.
pub fn validate_structure(definition: &WorkerModelDefinition) -> Result<WorkerModelStructure, ValidationError> {
    let name = match definition.name.as_deref().map(str::trim) {
        None | Some("") => return Err(ValidationError::MissingName),
        Some(name) if !is_valid_name(name) => return Err(ValidationError::InvalidName(name.to_string())),
        Some(name) => name.to_string(),
    };

    let model_type = match definition.model_type.as_deref().map(str::trim) {
        None | Some("") => return Err(ValidationError::MissingType),
        Some(raw) => raw.parse::<WorkerModelType>().map_err(ValidationError::UnknownType)?,
    };

    let group_id = match definition.group_id.as_deref().map(str::trim) {
        None | Some("") => return Err(ValidationError::MissingGroup),
        Some(raw) => Uuid::parse_str(raw).map_err(|_| ValidationError::MalformedGroup(raw.to_string()))?,
    };

    if definition.provision < 0 || definition.provision > i64::from(i32::MAX) {
        return Err(ValidationError::InvalidProvision(definition.provision));
    }

    Ok(WorkerModelStructure { name, model_type, group_id })
}

fn require(value: &str, model_type: WorkerModelType, field: &'static str) -> Result<(), TypeValidationError> {
    if value.trim().is_empty() {
        return Err(TypeValidationError::MissingField { model_type, field });
    }
    Ok(())
}

/// Check the type-specific section of `definition` against `model_type` and build the
/// persisted spec from it.
pub fn validate_type(definition: &WorkerModelDefinition, model_type: WorkerModelType) -> Result<WorkerModelSpec, TypeValidationError> {
    match model_type {
        WorkerModelType::Docker => {
            if definition.virtual_machine.is_some() {
                return Err(TypeValidationError::UnexpectedSection {
                    model_type,
                    section: "virtual_machine",
                });
            }
            let docker = definition.docker.as_ref().ok_or(TypeValidationError::MissingSection {
                model_type,
                section: "docker",
            })?;
            require(&docker.image, model_type, "docker.image")?;
            require(&docker.cmd, model_type, "docker.cmd")?;
            require(&docker.shell, model_type, "docker.shell")?;
            Ok(WorkerModelSpec::Docker(docker.clone()))
        }
        WorkerModelType::Host | WorkerModelType::Openstack | WorkerModelType::Vsphere => {
            if definition.docker.is_some() {
                return Err(TypeValidationError::UnexpectedSection {
                    model_type,
                    section: "docker",
                });
            }
            let vm = definition.virtual_machine.as_ref().ok_or(TypeValidationError::MissingSection {
                model_type,
                section: "virtual_machine",
            })?;
            require(&vm.image, model_type, "virtual_machine.image")?;
            require(&vm.cmd, model_type, "virtual_machine.cmd")?;

            Ok(match model_type {
                WorkerModelType::Openstack => {
                    require(&vm.flavor, model_type, "virtual_machine.flavor")?;
                    WorkerModelSpec::Openstack(vm.clone())
                }
                WorkerModelType::Vsphere => WorkerModelSpec::Vsphere(vm.clone()),
                _ => WorkerModelSpec::Host(vm.clone()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::worker_models::{DockerSpec, VirtualMachineSpec};

    fn docker_definition() -> WorkerModelDefinition {
        WorkerModelDefinition {
            name: Some("docker-debian".to_string()),
            model_type: Some("docker".to_string()),
            group_id: Some(Uuid::new_v4().to_string()),
            docker: Some(DockerSpec {
                image: "debian:12".to_string(),
                cmd: "curl -sSL $API/download | sh".to_string(),
                shell: "sh -c".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn vm_definition(model_type: &str) -> WorkerModelDefinition {
        WorkerModelDefinition {
            model_type: Some(model_type.to_string()),
            docker: None,
            virtual_machine: Some(VirtualMachineSpec {
                image: "ubuntu-24.04".to_string(),
                cmd: "./worker".to_string(),
                ..Default::default()
            }),
            ..docker_definition()
        }
    }

    #[test]
    fn test_structure_accepts_valid_definition() {
        let definition = docker_definition();
        let structure = validate_structure(&definition).unwrap();
        assert_eq!(structure.name, "docker-debian");
        assert_eq!(structure.model_type, WorkerModelType::Docker);
        assert_eq!(structure.group_id.to_string(), definition.group_id.unwrap());
    }

    #[test]
    fn test_structure_rejects_missing_and_invalid_name() {
        let mut definition = docker_definition();
        definition.name = None;
        assert_eq!(validate_structure(&definition), Err(ValidationError::MissingName));

        definition.name = Some("   ".to_string());
        assert_eq!(validate_structure(&definition), Err(ValidationError::MissingName));

        definition.name = Some("my model!".to_string());
        let err = validate_structure(&definition).unwrap_err();
        assert_eq!(err, ValidationError::InvalidName("my model!".to_string()));
        assert_eq!(err.field(), "name");
    }

    #[test]
    fn test_structure_rejects_missing_and_unknown_type() {
        let mut definition = docker_definition();
        definition.model_type = None;
        assert_eq!(validate_structure(&definition), Err(ValidationError::MissingType));

        definition.model_type = Some("kubernetes".to_string());
        assert_eq!(
            validate_structure(&definition),
            Err(ValidationError::UnknownType("kubernetes".to_string()))
        );
    }

    #[test]
    fn test_structure_rejects_bad_group_reference() {
        let mut definition = docker_definition();
        definition.group_id = None;
        assert_eq!(validate_structure(&definition), Err(ValidationError::MissingGroup));

        definition.group_id = Some("not-a-uuid".to_string());
        let err = validate_structure(&definition).unwrap_err();
        assert_eq!(err, ValidationError::MalformedGroup("not-a-uuid".to_string()));
        assert_eq!(err.field(), "group_id");
    }

    #[test]
    fn test_structure_rejects_negative_provision() {
        let mut definition = docker_definition();
        definition.provision = -1;
        assert_eq!(validate_structure(&definition), Err(ValidationError::InvalidProvision(-1)));

        definition.provision = i64::from(i32::MAX) + 1;
        assert!(validate_structure(&definition).is_err());
    }

    #[test]
    fn test_structure_ignores_type_specific_data() {
        let mut definition = docker_definition();
        definition.docker = None;
        assert!(validate_structure(&definition).is_ok());
    }

    #[test]
    fn test_type_docker_requires_image_cmd_and_shell() {
        let definition = docker_definition();
        let spec = validate_type(&definition, WorkerModelType::Docker).unwrap();
        assert_eq!(spec.docker().unwrap().image, "debian:12");

        for (field, clear) in [
            ("docker.image", (|d: &mut DockerSpec| d.image.clear()) as fn(&mut DockerSpec)),
            ("docker.cmd", |d: &mut DockerSpec| d.cmd.clear()),
            ("docker.shell", |d: &mut DockerSpec| d.shell = "  ".to_string()),
        ] {
            let mut definition = docker_definition();
            clear(definition.docker.as_mut().unwrap());
            let err = validate_type(&definition, WorkerModelType::Docker).unwrap_err();
            assert_eq!(err.field(), field);
        }
    }

    #[test]
    fn test_type_rejects_missing_section() {
        let mut definition = docker_definition();
        definition.docker = None;
        assert_eq!(
            validate_type(&definition, WorkerModelType::Docker),
            Err(TypeValidationError::MissingSection {
                model_type: WorkerModelType::Docker,
                section: "docker",
            })
        );
    }

    #[test]
    fn test_type_rejects_section_of_other_backend() {
        let mut definition = vm_definition("vsphere");
        definition.docker = docker_definition().docker;
        assert_eq!(
            validate_type(&definition, WorkerModelType::Vsphere),
            Err(TypeValidationError::UnexpectedSection {
                model_type: WorkerModelType::Vsphere,
                section: "docker",
            })
        );

        // A vsphere payload declared as docker is inconsistent too
        let definition = vm_definition("vsphere");
        let err = validate_type(&definition, WorkerModelType::Docker).unwrap_err();
        assert_eq!(err.field(), "virtual_machine");
    }

    #[test]
    fn test_type_virtual_machine_variants() {
        let spec = validate_type(&vm_definition("vsphere"), WorkerModelType::Vsphere).unwrap();
        assert_eq!(spec.model_type(), WorkerModelType::Vsphere);

        let spec = validate_type(&vm_definition("host"), WorkerModelType::Host).unwrap();
        assert_eq!(spec.model_type(), WorkerModelType::Host);

        // Openstack additionally needs a flavor
        let mut definition = vm_definition("openstack");
        let err = validate_type(&definition, WorkerModelType::Openstack).unwrap_err();
        assert_eq!(err.field(), "virtual_machine.flavor");

        definition.virtual_machine.as_mut().unwrap().flavor = "b2-7".to_string();
        let spec = validate_type(&definition, WorkerModelType::Openstack).unwrap();
        assert_eq!(spec.virtual_machine().unwrap().flavor, "b2-7");
    }
}
