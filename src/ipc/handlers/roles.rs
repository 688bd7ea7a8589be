use rusqlite::Connection;
use serde_json::json;

use crate::directory::{Role, SqlDirectory};
use crate::ipc::helpers::{admin_dispatch, get_opt_str, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::staffing::{self, StaffingError};

fn roles_assign(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "userId")?;
    let role_raw = get_required_str(params, "role")?;
    let role = Role::parse(&role_raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown role: {}", role_raw)))?;
    let department_code = get_opt_str(params, "departmentCode");

    let mut dir = SqlDirectory::new(conn);
    match staffing::assign_role(&mut dir, &user_id, role, department_code.as_deref()) {
        Ok(()) => Ok(json!({ "message": format!("Role {} assigned", role.as_str()) })),
        Err(StaffingError::TargetNotFound) => Err(HandlerErr::not_found("user not found")),
        Err(StaffingError::Directory(e)) => Err(e.into()),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roles.assign" => Some(admin_dispatch(state, req, roles_assign)),
        _ => None,
    }
}
