use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use crate::ipc::helpers::{
    admin_dispatch, get_opt_i64, get_opt_str, get_required_i64, get_required_str, HandlerErr,
};
use crate::ipc::types::{AppState, Request};

fn classes_list(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name, c.department_code, c.semester, c.batch, c.tutor_id,
           (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id) AS student_count,
           (SELECT i.full_name FROM identities i WHERE i.id = c.tutor_id) AS tutor_name
         FROM classes c
         ORDER BY c.department_code, c.semester, c.name",
    )?;
    let classes = stmt
        .query_map([], |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "name": row.get::<_, String>(1)?,
                "departmentCode": row.get::<_, String>(2)?,
                "semester": row.get::<_, i64>(3)?,
                "batch": row.get::<_, Option<String>>(4)?,
                "tutorId": row.get::<_, Option<String>>(5)?,
                "studentCount": row.get::<_, i64>(6)?,
                "tutorName": row.get::<_, Option<String>>(7)?
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "classes": classes }))
}

fn classes_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let department_code = get_required_str(params, "departmentCode")?;
    let semester = get_required_i64(params, "semester")?;
    let batch = get_opt_str(params, "batch");
    let tutor_id = get_opt_str(params, "tutorId");

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(id, name, department_code, semester, batch, tutor_id)
         VALUES(?, ?, ?, ?, ?, ?)",
        rusqlite::params![id, name, department_code, semester, batch, tutor_id],
    )
    .map_err(|e| HandlerErr::db("db_insert_failed", e))?;

    Ok(json!({ "id": id, "name": name }))
}

fn classes_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [&id], |r| r.get(0))
        .optional()?;
    if exists.is_none() {
        return Err(HandlerErr::not_found("class not found"));
    }

    if let Some(name) = get_opt_str(params, "name") {
        conn.execute("UPDATE classes SET name = ? WHERE id = ?", rusqlite::params![name, id])
            .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    }
    if let Some(sem) = get_opt_i64(params, "semester") {
        conn.execute(
            "UPDATE classes SET semester = ? WHERE id = ?",
            rusqlite::params![sem, id],
        )
        .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    }
    if let Some(batch) = get_opt_str(params, "batch") {
        conn.execute("UPDATE classes SET batch = ? WHERE id = ?", rusqlite::params![batch, id])
            .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    }
    if let Some(tutor) = get_opt_str(params, "tutorId") {
        conn.execute(
            "UPDATE classes SET tutor_id = ? WHERE id = ?",
            rusqlite::params![tutor, id],
        )
        .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    }
    Ok(json!({ "message": "Class updated" }))
}

fn classes_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let n = conn
        .execute("DELETE FROM classes WHERE id = ?", [&id])
        .map_err(|e| HandlerErr::db("db_delete_failed", e))?;
    if n == 0 {
        return Err(HandlerErr::not_found("class not found"));
    }
    Ok(json!({ "message": "Class deleted" }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(admin_dispatch(state, req, classes_list)),
        "classes.create" => Some(admin_dispatch(state, req, classes_create)),
        "classes.update" => Some(admin_dispatch(state, req, classes_update)),
        "classes.delete" => Some(admin_dispatch(state, req, classes_delete)),
        _ => None,
    }
}
