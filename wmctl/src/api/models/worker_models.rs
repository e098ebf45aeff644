//! API request/response models for worker models.
//!
//! A worker model is a template describing the runtime environment of an ephemeral build
//! agent. Its type decides which type-specific section is required: docker models carry a
//! [`DockerSpec`], every virtual-machine flavoured type (`host`, `openstack`, `vsphere`)
//! carries a [`VirtualMachineSpec`].
//!
//! Incoming definitions ([`WorkerModelDefinition`]) are deliberately loosely typed: the type
//! and the owning group arrive as strings so that [`crate::policy::validator`] can reject
//! unknown or malformed values with a typed error instead of a deserialization failure.

use crate::db::models::worker_models::WorkerModelDBResponse;
use crate::types::{GroupId, UserId, WorkerModelId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};

/// Execution backend of a worker model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerModelType {
    Docker,
    Host,
    Openstack,
    Vsphere,
}

impl WorkerModelType {
    pub const ALL: [WorkerModelType; 4] = [
        WorkerModelType::Docker,
        WorkerModelType::Host,
        WorkerModelType::Openstack,
        WorkerModelType::Vsphere,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerModelType::Docker => "docker",
            WorkerModelType::Host => "host",
            WorkerModelType::Openstack => "openstack",
            WorkerModelType::Vsphere => "vsphere",
        }
    }
}

impl fmt::Display for WorkerModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkerModelType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Channel a spawned worker uses to talk back to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerModelCommunication {
    Http,
    Grpc,
}

impl WorkerModelCommunication {
    pub const ALL: [WorkerModelCommunication; 2] = [WorkerModelCommunication::Http, WorkerModelCommunication::Grpc];
}

/// Container settings for docker worker models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct DockerSpec {
    /// Image reference, e.g. `debian:12`
    #[schema(example = "debian:12")]
    pub image: String,
    /// Command launching the worker binary inside the container
    pub cmd: String,
    /// Shell used to run job steps
    #[schema(example = "sh -c")]
    pub shell: String,
    /// Extra environment variables
    pub envs: BTreeMap<String, String>,
    /// Memory limit in megabytes (0 = scheduler default)
    pub memory: i64,
    /// Whether the image lives in a private registry
    pub private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Virtual machine settings for `host`, `openstack` and `vsphere` worker models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct VirtualMachineSpec {
    /// Base image / template name
    pub image: String,
    /// Hardware flavor (required for openstack)
    pub flavor: String,
    /// Commands run before the worker starts
    pub pre_cmd: String,
    /// Command launching the worker binary
    pub cmd: String,
    /// Commands run after the worker exits
    pub post_cmd: String,
    /// User the worker runs as
    pub user: String,
}

/// Validated, type-tagged worker model configuration.
///
/// This is the only shape persisted: a model cannot exist without the section its type
/// requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerModelSpec {
    Docker(DockerSpec),
    Host(VirtualMachineSpec),
    Openstack(VirtualMachineSpec),
    Vsphere(VirtualMachineSpec),
}

impl WorkerModelSpec {
    pub fn model_type(&self) -> WorkerModelType {
        match self {
            WorkerModelSpec::Docker(_) => WorkerModelType::Docker,
            WorkerModelSpec::Host(_) => WorkerModelType::Host,
            WorkerModelSpec::Openstack(_) => WorkerModelType::Openstack,
            WorkerModelSpec::Vsphere(_) => WorkerModelType::Vsphere,
        }
    }

    pub fn docker(&self) -> Option<&DockerSpec> {
        match self {
            WorkerModelSpec::Docker(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn virtual_machine(&self) -> Option<&VirtualMachineSpec> {
        match self {
            WorkerModelSpec::Docker(_) => None,
            WorkerModelSpec::Host(spec) | WorkerModelSpec::Openstack(spec) | WorkerModelSpec::Vsphere(spec) => Some(spec),
        }
    }
}

/// Request body for creating or replacing a worker model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct WorkerModelDefinition {
    /// Model name, unique within its group
    #[schema(example = "docker-debian")]
    pub name: Option<String>,
    pub description: Option<String>,
    /// One of `docker`, `host`, `openstack`, `vsphere`
    #[serde(rename = "type")]
    #[schema(example = "docker")]
    pub model_type: Option<String>,
    /// Owning group ID
    #[schema(format = "uuid")]
    pub group_id: Option<String>,
    pub docker: Option<DockerSpec>,
    pub virtual_machine: Option<VirtualMachineSpec>,
    /// Restricted models are only usable by their owning group
    pub restricted: bool,
    /// Number of pre-warmed instances to keep ready
    pub provision: i64,
    /// Shared provisioning template, required for non-restricted models of non-admins
    #[schema(example = "default")]
    pub pattern_name: String,
    /// Binaries advertised by the model
    pub registered_capabilities: Vec<String>,
    pub is_deprecated: bool,
    pub disabled: bool,
    pub is_official: bool,
}

/// Worker model as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkerModelResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: WorkerModelId,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = String, format = "uuid")]
    pub group_id: GroupId,
    #[serde(rename = "type")]
    pub model_type: WorkerModelType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_machine: Option<VirtualMachineSpec>,
    pub restricted: bool,
    pub provision: i32,
    pub pattern_name: Option<String>,
    pub registered_capabilities: Vec<String>,
    pub is_deprecated: bool,
    pub disabled: bool,
    pub is_official: bool,
    pub nb_spawn_err: i32,
    pub last_spawn_err: Option<String>,
    pub need_registration: bool,
    pub last_registration: Option<DateTime<Utc>>,
    #[schema(value_type = String, format = "uuid")]
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Whether the requesting caller may modify this model. Computed per request.
    pub editable: bool,
}

impl From<WorkerModelDBResponse> for WorkerModelResponse {
    fn from(db: WorkerModelDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            description: db.description,
            group_id: db.group_id,
            model_type: db.spec.model_type(),
            docker: db.spec.docker().cloned(),
            virtual_machine: db.spec.virtual_machine().cloned(),
            restricted: db.restricted,
            provision: db.provision,
            pattern_name: db.pattern_name,
            registered_capabilities: db.registered_capabilities,
            is_deprecated: db.is_deprecated,
            disabled: db.disabled,
            is_official: db.is_official,
            nb_spawn_err: db.nb_spawn_err,
            last_spawn_err: db.last_spawn_err,
            need_registration: db.need_registration,
            last_registration: db.last_registration,
            created_by: db.created_by,
            created_at: db.created_at,
            updated_at: db.updated_at,
            editable: false, // Set at the response boundary, see policy::editable
        }
    }
}

/// Lifecycle state used to filter worker model listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StateFilter {
    Disabled,
    Official,
    Error,
    Register,
    Deprecated,
    Active,
}

impl StateFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateFilter::Disabled => "disabled",
            StateFilter::Official => "official",
            StateFilter::Error => "error",
            StateFilter::Register => "register",
            StateFilter::Deprecated => "deprecated",
            StateFilter::Active => "active",
        }
    }
}

impl FromStr for StateFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" => Ok(StateFilter::Disabled),
            "official" => Ok(StateFilter::Official),
            "error" => Ok(StateFilter::Error),
            "register" => Ok(StateFilter::Register),
            "deprecated" => Ok(StateFilter::Deprecated),
            "active" => Ok(StateFilter::Active),
            other => Err(other.to_string()),
        }
    }
}

/// Query parameters for listing worker models
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListWorkerModelsQuery {
    /// Only models advertising a binary whose name contains this value
    pub binary: Option<String>,
    /// One of `disabled`, `official`, `error`, `register`, `deprecated`, `active`
    pub state: Option<String>,
}
