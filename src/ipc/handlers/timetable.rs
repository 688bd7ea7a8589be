use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use crate::ipc::helpers::{
    admin_dispatch, get_opt_str, get_required_i64, get_required_str, HandlerErr,
};
use crate::ipc::types::{AppState, Request};

fn timetable_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let mut stmt = conn.prepare(
        "SELECT t.id, t.day_of_week, t.period, t.start_time, t.end_time,
           t.subject_id, sub.name, sub.code,
           t.staff_id, staff.full_name
         FROM timetable_slots t
         LEFT JOIN subjects sub ON sub.id = t.subject_id
         LEFT JOIN identities staff ON staff.id = t.staff_id
         WHERE t.class_id = ?
         ORDER BY t.day_of_week, t.period",
    )?;
    let slots = stmt
        .query_map([&class_id], |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "dayOfWeek": row.get::<_, String>(1)?,
                "period": row.get::<_, i64>(2)?,
                "startTime": row.get::<_, Option<String>>(3)?,
                "endTime": row.get::<_, Option<String>>(4)?,
                "subject": {
                    "id": row.get::<_, String>(5)?,
                    "name": row.get::<_, Option<String>>(6)?,
                    "code": row.get::<_, Option<String>>(7)?
                },
                "staff": {
                    "id": row.get::<_, Option<String>>(8)?,
                    "fullName": row.get::<_, Option<String>>(9)?
                }
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "timetable": slots }))
}

/// Upsert by the intended (class, day, period) key: the store holds no
/// unique constraint, so the existing row is looked up first.
fn timetable_set_slot(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let subject_id = get_required_str(params, "subjectId")?;
    let day = get_required_str(params, "dayOfWeek")?;
    let period = get_required_i64(params, "period")?;
    let staff_id = get_opt_str(params, "staffId");
    let start_time = get_opt_str(params, "startTime");
    let end_time = get_opt_str(params, "endTime");

    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM timetable_slots WHERE class_id = ? AND day_of_week = ? AND period = ?",
            rusqlite::params![class_id, day, period],
            |r| r.get(0),
        )
        .optional()?;

    match existing {
        Some(slot_id) => {
            conn.execute(
                "UPDATE timetable_slots SET subject_id = ?, staff_id = ?,
                   start_time = ?, end_time = ? WHERE id = ?",
                rusqlite::params![subject_id, staff_id, start_time, end_time, slot_id],
            )
            .map_err(|e| HandlerErr::db("db_update_failed", e))?;
            Ok(json!({ "slotId": slot_id, "updated": true }))
        }
        None => {
            let slot_id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO timetable_slots(id, class_id, subject_id, staff_id,
                   day_of_week, period, start_time, end_time)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
                rusqlite::params![
                    slot_id, class_id, subject_id, staff_id, day, period, start_time, end_time
                ],
            )
            .map_err(|e| HandlerErr::db("db_insert_failed", e))?;
            Ok(json!({ "slotId": slot_id, "updated": false }))
        }
    }
}

fn timetable_delete_slot(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let slot_id = get_required_str(params, "slotId")?;
    let n = conn
        .execute("DELETE FROM timetable_slots WHERE id = ?", [&slot_id])
        .map_err(|e| HandlerErr::db("db_delete_failed", e))?;
    if n == 0 {
        return Err(HandlerErr::not_found("timetable slot not found"));
    }
    Ok(json!({ "message": "Slot deleted" }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "timetable.list" => Some(admin_dispatch(state, req, timetable_list)),
        "timetable.setSlot" => Some(admin_dispatch(state, req, timetable_set_slot)),
        "timetable.deleteSlot" => Some(admin_dispatch(state, req, timetable_delete_slot)),
        _ => None,
    }
}
