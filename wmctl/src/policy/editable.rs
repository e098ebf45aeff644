//! Per-caller `editable` flag on worker model responses.
//!
//! The flag depends on who is asking, so it is computed here at the response boundary and never
//! stored or cached alongside the model.

use crate::api::models::users::CurrentUser;
use crate::api::models::worker_models::WorkerModelResponse;
use crate::db::models::worker_models::WorkerModelDBResponse;

/// Whether `caller` holds update rights on `model`: admin, or member of the owning group.
pub fn is_editable(caller: &CurrentUser, model: &WorkerModelDBResponse) -> bool {
    caller.is_admin() || caller.is_group_member(model.group_id)
}

impl WorkerModelResponse {
    pub fn for_caller(model: WorkerModelDBResponse, caller: &CurrentUser) -> Self {
        let editable = is_editable(caller, &model);
        Self {
            editable,
            ..Self::from(model)
        }
    }
}
