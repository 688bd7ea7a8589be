use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

use crate::academics::{self, AttendanceMark, SubjectRef};
use crate::ipc::helpers::{get_required_str, open_dispatch, HandlerErr};
use crate::ipc::types::{AppState, Request};

struct StudentRow {
    id: String,
    user_id: String,
    admission_number: Option<String>,
    department: Option<String>,
    class_id: Option<String>,
}

struct ClassRow {
    name: String,
    semester: i64,
    batch: Option<String>,
    tutor_id: Option<String>,
}

fn student_by_user(conn: &Connection, user_id: &str) -> Result<Option<StudentRow>, HandlerErr> {
    Ok(conn
        .query_row(
            "SELECT id, user_id, admission_number, department, class_id
             FROM students WHERE user_id = ?",
            [user_id],
            |r| {
                Ok(StudentRow {
                    id: r.get(0)?,
                    user_id: r.get(1)?,
                    admission_number: r.get(2)?,
                    department: r.get(3)?,
                    class_id: r.get(4)?,
                })
            },
        )
        .optional()?)
}

fn class_by_id(conn: &Connection, class_id: &str) -> Result<Option<ClassRow>, HandlerErr> {
    Ok(conn
        .query_row(
            "SELECT name, semester, batch, tutor_id FROM classes WHERE id = ?",
            [class_id],
            |r| {
                Ok(ClassRow {
                    name: r.get(0)?,
                    semester: r.get(1)?,
                    batch: r.get(2)?,
                    tutor_id: r.get(3)?,
                })
            },
        )
        .optional()?)
}

fn identity_name(conn: &Connection, id: &str) -> Result<Option<String>, HandlerErr> {
    Ok(conn
        .query_row("SELECT full_name FROM identities WHERE id = ?", [id], |r| {
            r.get::<_, Option<String>>(0)
        })
        .optional()?
        .flatten())
}

fn curriculum_subjects(
    conn: &Connection,
    department: &str,
    semester: i64,
) -> Result<Vec<SubjectRef>, HandlerErr> {
    let mut stmt = conn.prepare(
        "SELECT id, code, name, type, credits FROM subjects
         WHERE department = ? AND semester = ?
         ORDER BY code",
    )?;
    let subjects = stmt
        .query_map(rusqlite::params![department, semester], |r| {
            Ok(SubjectRef {
                id: r.get(0)?,
                code: r.get(1)?,
                name: r.get(2)?,
                kind: r.get(3)?,
                credits: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(subjects)
}

fn attendance_marks(conn: &Connection, student_row_id: &str) -> Result<Vec<AttendanceMark>, HandlerErr> {
    let mut stmt =
        conn.prepare("SELECT subject_id, status FROM attendance WHERE student_id = ?")?;
    let marks = stmt
        .query_map([student_row_id], |r| {
            let subject_id: String = r.get(0)?;
            let status: String = r.get(1)?;
            Ok(AttendanceMark {
                subject_id,
                present: status == "PRESENT",
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(marks)
}

fn student_dashboard(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "studentId")?;
    let Some(student) = student_by_user(conn, &user_id)? else {
        return Err(HandlerErr::not_found("student profile not found"));
    };

    let class = match student.class_id.as_deref() {
        Some(cid) => class_by_id(conn, cid)?,
        None => None,
    };
    let tutor_name = match class.as_ref().and_then(|c| c.tutor_id.as_deref()) {
        Some(tid) => identity_name(conn, tid)?,
        None => None,
    };

    // Curriculum set: department + the class's semester. Subjects actually
    // on the timetable may differ; the display follows the curriculum.
    let subjects = match (student.department.as_deref(), class.as_ref()) {
        (Some(dept), Some(c)) => curriculum_subjects(conn, dept, c.semester)?,
        _ => Vec::new(),
    };
    let marks = attendance_marks(conn, &student.id)?;
    let academics = academics::summarize(subjects, &marks);

    Ok(json!({
        "profile": {
            // Attendance records key on this row id, not the identity id.
            "studentId": student.id,
            "name": identity_name(conn, &student.user_id)?,
            "admission": student.admission_number,
            "department": student.department,
            "semester": class.as_ref().map(|c| c.semester),
            "batch": class.as_ref().and_then(|c| c.batch.clone()),
            "tutor": tutor_name.unwrap_or_else(|| "Not Assigned".to_string()),
            "className": class.as_ref().map(|c| c.name.clone())
        },
        "academics": serde_json::to_value(&academics).unwrap_or_default()
    }))
}

fn student_courses(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "studentId")?;
    let Some(student) = student_by_user(conn, &user_id)? else {
        return Err(HandlerErr::not_found("student not found"));
    };
    let courses = match (student.department.as_deref(), student.class_id.as_deref()) {
        (Some(dept), Some(cid)) => match class_by_id(conn, cid)? {
            Some(class) => curriculum_subjects(conn, dept, class.semester)?,
            None => Vec::new(),
        },
        _ => Vec::new(),
    };
    Ok(json!({ "courses": serde_json::to_value(&courses).unwrap_or_default() }))
}

fn student_timetable(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "studentId")?;
    let Some(student) = student_by_user(conn, &user_id)? else {
        return Err(HandlerErr::not_found("student not found"));
    };
    let Some(class_id) = student.class_id else {
        return Ok(json!({ "timetable": [] }));
    };

    let mut stmt = conn.prepare(
        "SELECT t.day_of_week, t.period, t.start_time, t.end_time,
           sub.name, sub.code, staff.full_name
         FROM timetable_slots t
         LEFT JOIN subjects sub ON sub.id = t.subject_id
         LEFT JOIN identities staff ON staff.id = t.staff_id
         WHERE t.class_id = ?
         ORDER BY t.day_of_week, t.period",
    )?;
    let timetable = stmt
        .query_map([&class_id], |row| {
            Ok(json!({
                "dayOfWeek": row.get::<_, String>(0)?,
                "period": row.get::<_, i64>(1)?,
                "startTime": row.get::<_, Option<String>>(2)?,
                "endTime": row.get::<_, Option<String>>(3)?,
                "subject": {
                    "name": row.get::<_, Option<String>>(4)?,
                    "code": row.get::<_, Option<String>>(5)?
                },
                "staff": { "fullName": row.get::<_, Option<String>>(6)? }
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "timetable": timetable }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "student.dashboard" => Some(open_dispatch(state, req, student_dashboard)),
        "student.courses" => Some(open_dispatch(state, req, student_courses)),
        "student.timetable" => Some(open_dispatch(state, req, student_timetable)),
        _ => None,
    }
}
