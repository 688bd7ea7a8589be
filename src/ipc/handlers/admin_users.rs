use rusqlite::Connection;
use serde_json::json;

use crate::directory::{
    derive_password, Identity, IdentityDirectory, NewIdentity, Profile, Role, SqlDirectory,
};
use crate::enrollment;
use crate::ipc::helpers::{admin_dispatch, get_opt_str, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};

fn admin_stats(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM identities", [], |r| r.get(0))?;
    Ok(json!({ "totalUsers": total }))
}

/// Build one identity-creation request from loose params. `email` and `role`
/// are required; the password chain is explicit > DOB-derived > fallback.
fn new_identity_from_params(params: &serde_json::Value) -> Result<NewIdentity, HandlerErr> {
    let email = get_required_str(params, "email")?;
    let role_raw = get_required_str(params, "role")?;
    let role = Role::parse(&role_raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown role: {}", role_raw)))?;

    let metadata = params.get("metadata").cloned().unwrap_or(json!({}));
    let dob = metadata.get("dob").and_then(|v| v.as_str()).map(String::from);
    let password = derive_password(
        params.get("password").and_then(|v| v.as_str()),
        dob.as_deref(),
    );

    Ok(NewIdentity {
        email,
        password,
        profile: Profile {
            full_name: get_opt_str(params, "name"),
            role: role.as_str().to_string(),
            department_code: metadata
                .get("departmentCode")
                .and_then(|v| v.as_str())
                .map(String::from),
            semester: metadata
                .get("semester")
                .and_then(|v| v.as_str())
                .map(String::from),
            dob,
        },
        roles: vec![role.as_str().to_string()],
        admission_number: metadata
            .get("admissionNumber")
            .and_then(|v| v.as_str())
            .map(String::from),
    })
}

fn users_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let new = new_identity_from_params(params)?;
    let mut dir = SqlDirectory::new(conn);
    let identity = dir.create_user(new)?;
    if let Err(e) = dir.set_role_mirror(&identity.id, &identity.roles) {
        log::warn!("role mirror update failed for {}: {}", identity.id, e);
    }
    Ok(json!({
        "message": "User created successfully",
        "user": { "id": identity.id, "email": identity.email }
    }))
}

fn users_bulk_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let Some(entries) = params.get("users").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("users must be an array"));
    };

    let mut results = enrollment::BulkOutcome::default();
    let mut batch = Vec::new();
    for entry in entries {
        match new_identity_from_params(entry) {
            Ok(new) => batch.push(new),
            Err(e) => {
                // Malformed entries fail their row, not the whole call.
                results.failed += 1;
                results.errors.push(enrollment::RowError {
                    email: entry
                        .get("email")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    message: e.message,
                });
            }
        }
    }

    let mut dir = SqlDirectory::new(conn);
    let applied = enrollment::apply_new_users(&mut dir, batch);
    results.success += applied.success;
    results.failed += applied.failed;
    results.errors.extend(applied.errors);

    Ok(json!({
        "message": "Bulk processing complete",
        "results": serde_json::to_value(&results).unwrap_or_default()
    }))
}

fn users_import(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let text = get_required_str(params, "text")?;
    let batch = enrollment::parse_roster(&text);
    let mut dir = SqlDirectory::new(conn);
    let results = enrollment::apply_new_users(&mut dir, batch);
    Ok(json!({
        "message": "Roster import complete",
        "results": serde_json::to_value(&results).unwrap_or_default()
    }))
}

fn list_entry(u: &Identity) -> serde_json::Value {
    let role: &str = if u.profile.role.is_empty() {
        u.roles.first().map(String::as_str).unwrap_or("USER")
    } else {
        &u.profile.role
    };
    json!({
        "id": u.id,
        "email": u.email,
        "name": u.profile.full_name.as_deref().unwrap_or("N/A"),
        "role": role,
        "dept": u.profile.department_code.as_deref().unwrap_or("N/A"),
        "status": if u.last_sign_in_at.is_some() { "Active" } else { "Inactive" },
        "dob": u.profile.dob.as_deref().unwrap_or("N/A")
    })
}

fn users_list(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let dir = SqlDirectory::new(conn);
    let users: Vec<serde_json::Value> = dir.list_users()?.iter().map(list_entry).collect();
    Ok(json!({ "users": users }))
}

fn users_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "userId")?;
    let dir = SqlDirectory::new(conn);
    let Some(u) = dir.get_user(&user_id)? else {
        return Err(HandlerErr::not_found("user not found"));
    };
    Ok(json!({
        "user": {
            "id": u.id,
            "email": u.email,
            "profile": {
                "fullName": u.profile.full_name,
                "role": u.profile.role,
                "departmentCode": u.profile.department_code,
                "semester": u.profile.semester,
                "dob": u.profile.dob
            },
            "roles": u.roles,
            "createdAt": u.created_at,
            "lastSignInAt": u.last_sign_in_at
        }
    }))
}

fn users_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "userId")?;
    let mut dir = SqlDirectory::new(conn);
    if dir.get_user(&user_id)?.is_none() {
        return Err(HandlerErr::not_found("user not found"));
    }
    dir.delete_user(&user_id)?;
    Ok(json!({ "message": "User deleted" }))
}

fn users_promote(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let mut dir = SqlDirectory::new(conn);
    let outcome = enrollment::promote_students(&mut dir)?;
    Ok(json!({
        "message": "Promotion complete",
        "promoted": outcome.promoted,
        "graduated": outcome.graduated
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "admin.stats" => Some(admin_dispatch(state, req, admin_stats)),
        "users.create" => Some(admin_dispatch(state, req, users_create)),
        "users.bulkCreate" => Some(admin_dispatch(state, req, users_bulk_create)),
        "users.import" => Some(admin_dispatch(state, req, users_import)),
        "users.list" => Some(admin_dispatch(state, req, users_list)),
        "users.get" => Some(admin_dispatch(state, req, users_get)),
        "users.delete" => Some(admin_dispatch(state, req, users_delete)),
        "users.promote" => Some(admin_dispatch(state, req, users_promote)),
        _ => None,
    }
}
