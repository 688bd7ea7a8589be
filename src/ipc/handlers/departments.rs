use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use crate::ipc::helpers::{admin_dispatch, get_opt_str, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};

fn departments_list(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn.prepare(
        "SELECT d.id, d.name, d.code,
           (SELECT COUNT(*) FROM classes c WHERE c.department_code = d.code) AS class_count
         FROM departments d
         ORDER BY d.name",
    )?;
    let departments = stmt
        .query_map([], |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "name": row.get::<_, String>(1)?,
                "code": row.get::<_, String>(2)?,
                "classCount": row.get::<_, i64>(3)?
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "departments": departments }))
}

fn departments_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let code = get_required_str(params, "code")?;
    if name.trim().is_empty() || code.trim().is_empty() {
        return Err(HandlerErr::bad_params("name and code must not be empty"));
    }

    let id = Uuid::new_v4().to_string();
    // Code uniqueness is the store's constraint, not a pre-check here.
    conn.execute(
        "INSERT INTO departments(id, name, code) VALUES(?, ?, ?)",
        rusqlite::params![id, name.trim(), code.trim()],
    )
    .map_err(|e| HandlerErr::db("db_insert_failed", e))?;

    Ok(json!({ "id": id, "name": name.trim(), "code": code.trim() }))
}

fn departments_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let existing: Option<(String, String)> = conn
        .query_row(
            "SELECT name, code FROM departments WHERE id = ?",
            [&id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((cur_name, cur_code)) = existing else {
        return Err(HandlerErr::not_found("department not found"));
    };

    let name = get_opt_str(params, "name").unwrap_or(cur_name);
    let code = get_opt_str(params, "code").unwrap_or(cur_code);
    conn.execute(
        "UPDATE departments SET name = ?, code = ? WHERE id = ?",
        rusqlite::params![name, code, id],
    )
    .map_err(|e| HandlerErr::db("db_update_failed", e))?;

    Ok(json!({ "id": id, "name": name, "code": code }))
}

fn departments_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    // Classes reference the code string; no cascade or restrict here, the
    // store's rules (none) decide. Dangling codes are the caller's problem.
    let n = conn
        .execute("DELETE FROM departments WHERE id = ?", [&id])
        .map_err(|e| HandlerErr::db("db_delete_failed", e))?;
    if n == 0 {
        return Err(HandlerErr::not_found("department not found"));
    }
    Ok(json!({ "message": "Department deleted" }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "departments.list" => Some(admin_dispatch(state, req, departments_list)),
        "departments.create" => Some(admin_dispatch(state, req, departments_create)),
        "departments.update" => Some(admin_dispatch(state, req, departments_update)),
        "departments.delete" => Some(admin_dispatch(state, req, departments_delete)),
        _ => None,
    }
}
