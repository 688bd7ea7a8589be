use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use crate::ipc::helpers::{
    admin_dispatch, get_opt_i64, get_opt_str, get_required_i64, get_required_str, HandlerErr,
};
use crate::ipc::types::{AppState, Request};

const SUBJECT_TYPES: [&str; 3] = ["Core", "Lab", "Elective"];

fn subjects_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    // Optional curriculum filter by department + semester.
    let department = get_opt_str(params, "department");
    let semester = get_opt_i64(params, "semester");

    let mut sql = String::from(
        "SELECT id, code, name, type, credits, department, semester FROM subjects",
    );
    let mut clauses = Vec::new();
    let mut args: Vec<rusqlite::types::Value> = Vec::new();
    if let Some(d) = department {
        clauses.push("department = ?");
        args.push(d.into());
    }
    if let Some(s) = semester {
        clauses.push("semester = ?");
        args.push(s.into());
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY department, semester, code");

    let mut stmt = conn.prepare(&sql)?;
    let subjects = stmt
        .query_map(rusqlite::params_from_iter(args), |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "code": row.get::<_, String>(1)?,
                "name": row.get::<_, String>(2)?,
                "type": row.get::<_, String>(3)?,
                "credits": row.get::<_, i64>(4)?,
                "department": row.get::<_, String>(5)?,
                "semester": row.get::<_, i64>(6)?
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "subjects": subjects }))
}

fn subjects_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let code = get_required_str(params, "code")?;
    let name = get_required_str(params, "name")?;
    let kind = get_required_str(params, "type")?;
    let credits = get_required_i64(params, "credits")?;
    let department = get_required_str(params, "department")?;
    let semester = get_required_i64(params, "semester")?;

    if !SUBJECT_TYPES.contains(&kind.as_str()) {
        return Err(HandlerErr::bad_params(format!(
            "type must be one of {:?}",
            SUBJECT_TYPES
        )));
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO subjects(id, code, name, type, credits, department, semester)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![id, code, name, kind, credits, department, semester],
    )
    .map_err(|e| HandlerErr::db("db_insert_failed", e))?;

    Ok(json!({ "id": id, "code": code }))
}

fn subjects_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM subjects WHERE id = ?", [&id], |r| r.get(0))
        .optional()?;
    if exists.is_none() {
        return Err(HandlerErr::not_found("subject not found"));
    }

    if let Some(kind) = get_opt_str(params, "type") {
        if !SUBJECT_TYPES.contains(&kind.as_str()) {
            return Err(HandlerErr::bad_params(format!(
                "type must be one of {:?}",
                SUBJECT_TYPES
            )));
        }
        conn.execute("UPDATE subjects SET type = ? WHERE id = ?", rusqlite::params![kind, id])
            .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    }
    if let Some(name) = get_opt_str(params, "name") {
        conn.execute("UPDATE subjects SET name = ? WHERE id = ?", rusqlite::params![name, id])
            .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    }
    if let Some(credits) = get_opt_i64(params, "credits") {
        conn.execute(
            "UPDATE subjects SET credits = ? WHERE id = ?",
            rusqlite::params![credits, id],
        )
        .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    }
    Ok(json!({ "message": "Subject updated" }))
}

fn subjects_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let n = conn
        .execute("DELETE FROM subjects WHERE id = ?", [&id])
        .map_err(|e| HandlerErr::db("db_delete_failed", e))?;
    if n == 0 {
        return Err(HandlerErr::not_found("subject not found"));
    }
    Ok(json!({ "message": "Subject deleted" }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(admin_dispatch(state, req, subjects_list)),
        "subjects.create" => Some(admin_dispatch(state, req, subjects_create)),
        "subjects.update" => Some(admin_dispatch(state, req, subjects_update)),
        "subjects.delete" => Some(admin_dispatch(state, req, subjects_delete)),
        _ => None,
    }
}
