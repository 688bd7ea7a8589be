use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use crate::ipc::helpers::{
    admin_dispatch, get_opt_str, get_required_i64, get_required_str, HandlerErr,
};
use crate::ipc::types::{AppState, Request};

const STATUSES: [&str; 2] = ["PRESENT", "ABSENT"];

/// Record one attendance mark. (student, date, period) is checked
/// defensively before insert; the schema carries no unique constraint.
fn attendance_mark(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let class_id = get_required_str(params, "classId")?;
    let subject_id = get_required_str(params, "subjectId")?;
    let period = get_required_i64(params, "period")?;
    let date = get_required_str(params, "date")?;
    let status = get_required_str(params, "status")?;
    let marked_by = get_opt_str(params, "markedBy");

    if !STATUSES.contains(&status.as_str()) {
        return Err(HandlerErr::bad_params("status must be PRESENT or ABSENT"));
    }

    let duplicate: Option<String> = conn
        .query_row(
            "SELECT id FROM attendance WHERE student_id = ? AND date = ? AND period = ?",
            rusqlite::params![student_id, date, period],
            |r| r.get(0),
        )
        .optional()?;
    if duplicate.is_some() {
        return Err(HandlerErr::conflict(
            "attendance already recorded for this student, date and period",
        ));
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO attendance(id, student_id, class_id, subject_id, period, date, status, marked_by)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![id, student_id, class_id, subject_id, period, date, status, marked_by],
    )
    .map_err(|e| HandlerErr::db("db_insert_failed", e))?;

    Ok(json!({ "attendanceId": id }))
}

fn attendance_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let mut stmt = conn.prepare(
        "SELECT id, class_id, subject_id, period, date, status, marked_by
         FROM attendance
         WHERE student_id = ?
         ORDER BY date, period",
    )?;
    let records = stmt
        .query_map([&student_id], |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "classId": row.get::<_, String>(1)?,
                "subjectId": row.get::<_, String>(2)?,
                "period": row.get::<_, i64>(3)?,
                "date": row.get::<_, String>(4)?,
                "status": row.get::<_, String>(5)?,
                "markedBy": row.get::<_, Option<String>>(6)?
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "records": records }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.mark" => Some(admin_dispatch(state, req, attendance_mark)),
        "attendance.list" => Some(admin_dispatch(state, req, attendance_list)),
        _ => None,
    }
}
