//! Demo-data seeding: departments, users, the CS curriculum, a round-robin
//! timetable and a week of attendance. Every insert is guarded by an
//! existence check, so running it twice changes nothing.

use chrono::{Datelike, Duration, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use crate::directory::{derive_password, IdentityDirectory, NewIdentity, Profile, SqlDirectory};
use crate::enrollment::format_semester;
use crate::ipc::helpers::{admin_dispatch, HandlerErr};
use crate::ipc::types::{AppState, Request};

const DEPARTMENTS: [(&str, &str); 5] = [
    ("Computer Science", "CS"),
    ("Electronics", "EC"),
    ("Mechanical Engineering", "ME"),
    ("Civil Engineering", "CE"),
    ("Mathematics", "MA"),
];

// (email, name, department, semester, dob)
const STUDENTS: [(&str, &str, &str, i64, &str); 5] = [
    ("student1@campus.com", "Arjun Das", "CS", 4, "2004-05-10"),
    ("student2@campus.com", "Sneha Nair", "ME", 4, "2004-08-22"),
    ("student3@campus.com", "Rahul Varma", "EC", 2, "2005-01-15"),
    ("student4@campus.com", "Anjali Menon", "CE", 4, "2004-12-05"),
    ("student5@campus.com", "Kiran Joseph", "CS", 6, "2003-11-30"),
];

const STAFF: [(&str, &str, &str, &str); 5] = [
    ("staff1@campus.com", "Dr. Ramesh Kumar", "CS", "1975-04-12"),
    ("staff2@campus.com", "Prof. Lakshmi Iyer", "MA", "1982-09-25"),
    ("staff3@campus.com", "Dr. Suresh Gopi", "ME", "1978-01-10"),
    ("staff4@campus.com", "Ms. Bindu Ravi", "EC", "1985-06-18"),
    ("staff5@campus.com", "Dr. Vinod Pillai", "CE", "1972-12-01"),
];

// (semester, code, name, type, credits)
const CS_SUBJECTS: [(i64, &str, &str, &str, i64); 10] = [
    (1, "MAT101", "Calculus I", "Core", 4),
    (1, "CS101", "Intro to Computing", "Core", 3),
    (1, "PHY101", "Eng. Physics", "Core", 4),
    (4, "CS202", "Computer Org.", "Core", 3),
    (4, "CS204", "Algorithms", "Core", 4),
    (4, "MAT206", "Prob. & Stats", "Core", 3),
    (4, "CS208", "OS Lab", "Lab", 2),
    (6, "CS302", "Compiler Design", "Core", 4),
    (6, "CS304", "Computer Networks", "Core", 3),
    (6, "CS306", "AI & ML", "Elective", 3),
];

const DAYS: [&str; 5] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"];

fn email_exists(conn: &Connection, email: &str) -> Result<bool, HandlerErr> {
    Ok(conn
        .query_row("SELECT 1 FROM identities WHERE email = ?", [email], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

fn first_staff_for(conn: &Connection, dept: &str) -> Result<Option<String>, HandlerErr> {
    Ok(conn
        .query_row(
            "SELECT id FROM identities
             WHERE role = 'STAFF' AND department_code = ?
             ORDER BY email LIMIT 1",
            [dept],
            |r| r.get(0),
        )
        .optional()?)
}

fn seed_departments(conn: &Connection) -> Result<u32, HandlerErr> {
    let mut inserted = 0;
    for (name, code) in DEPARTMENTS {
        let exists: Option<i64> = conn
            .query_row("SELECT 1 FROM departments WHERE code = ?", [code], |r| {
                r.get(0)
            })
            .optional()?;
        if exists.is_none() {
            conn.execute(
                "INSERT INTO departments(id, name, code) VALUES(?, ?, ?)",
                rusqlite::params![Uuid::new_v4().to_string(), name, code],
            )
            .map_err(|e| HandlerErr::db("db_insert_failed", e))?;
            inserted += 1;
        }
    }
    Ok(inserted)
}

fn seed_subjects(conn: &Connection) -> Result<u32, HandlerErr> {
    let mut inserted = 0;
    for (semester, code, name, kind, credits) in CS_SUBJECTS {
        let exists: Option<i64> = conn
            .query_row("SELECT 1 FROM subjects WHERE code = ?", [code], |r| r.get(0))
            .optional()?;
        if exists.is_none() {
            conn.execute(
                "INSERT INTO subjects(id, code, name, type, credits, department, semester)
                 VALUES(?, ?, ?, ?, ?, 'CS', ?)",
                rusqlite::params![Uuid::new_v4().to_string(), code, name, kind, credits, semester],
            )
            .map_err(|e| HandlerErr::db("db_insert_failed", e))?;
            inserted += 1;
        }
    }
    Ok(inserted)
}

fn seed_classes(conn: &Connection) -> Result<u32, HandlerErr> {
    let mut inserted = 0;
    let tutor = first_staff_for(conn, "CS")?;
    for sem in [4i64, 6] {
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM classes WHERE department_code = 'CS' AND semester = ?",
                [sem],
                |r| r.get(0),
            )
            .optional()?;
        if exists.is_none() {
            conn.execute(
                "INSERT INTO classes(id, name, department_code, semester, batch, tutor_id)
                 VALUES(?, ?, 'CS', ?, 'A', ?)",
                rusqlite::params![
                    Uuid::new_v4().to_string(),
                    format!("CS S{} A", sem),
                    sem,
                    tutor
                ],
            )
            .map_err(|e| HandlerErr::db("db_insert_failed", e))?;
            inserted += 1;
        }
    }
    Ok(inserted)
}

fn seed_staff(conn: &Connection) -> Result<u32, HandlerErr> {
    let mut inserted = 0;
    let mut dir = SqlDirectory::new(conn);

    if !email_exists(conn, "admin@campus.com")? {
        let identity = dir.create_user(NewIdentity {
            email: "admin@campus.com".into(),
            password: "admin".into(),
            profile: Profile {
                full_name: Some("Root Admin".into()),
                role: "SUPER_ADMIN".into(),
                department_code: Some("IT".into()),
                semester: None,
                dob: None,
            },
            roles: vec!["SUPER_ADMIN".into()],
            admission_number: None,
        })?;
        dir.set_role_mirror(&identity.id, &identity.roles)?;
        inserted += 1;
    }

    for (email, name, dept, dob) in STAFF {
        if email_exists(conn, email)? {
            continue;
        }
        let identity = dir.create_user(NewIdentity {
            email: email.into(),
            password: derive_password(None, Some(dob)),
            profile: Profile {
                full_name: Some(name.into()),
                role: "STAFF".into(),
                department_code: Some(dept.into()),
                semester: None,
                dob: Some(dob.into()),
            },
            roles: vec!["STAFF".into()],
            admission_number: None,
        })?;
        dir.set_role_mirror(&identity.id, &identity.roles)?;
        inserted += 1;
    }

    Ok(inserted)
}

fn seed_students(conn: &Connection) -> Result<u32, HandlerErr> {
    let mut inserted = 0;
    let mut dir = SqlDirectory::new(conn);

    for (i, &(email, name, dept, semester, dob)) in STUDENTS.iter().enumerate() {
        if email_exists(conn, email)? {
            continue;
        }
        let identity = dir.create_user(NewIdentity {
            email: email.into(),
            password: derive_password(None, Some(dob)),
            profile: Profile {
                full_name: Some(name.into()),
                role: "STUDENT".into(),
                department_code: Some(dept.into()),
                // Ordinal form so the promotion parse can read it back.
                semester: Some(format_semester(semester)),
                dob: Some(dob.into()),
            },
            roles: vec!["STUDENT".into()],
            admission_number: Some(format!("ADM{:04}", i + 1)),
        })?;
        dir.set_role_mirror(&identity.id, &identity.roles)?;
        inserted += 1;
    }

    Ok(inserted)
}

fn seed_timetable(conn: &Connection) -> Result<u32, HandlerErr> {
    let mut inserted = 0;
    let staff = first_staff_for(conn, "CS")?;

    let mut class_stmt =
        conn.prepare("SELECT id, semester FROM classes WHERE department_code = 'CS'")?;
    let classes = class_stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    for (class_id, semester) in classes {
        let mut sub_stmt = conn.prepare(
            "SELECT id FROM subjects WHERE department = 'CS' AND semester = ? ORDER BY code",
        )?;
        let subjects = sub_stmt
            .query_map([semester], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        if subjects.is_empty() {
            continue;
        }

        for (day_idx, day) in DAYS.iter().enumerate() {
            for period in 1i64..=5 {
                let exists: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM timetable_slots
                         WHERE class_id = ? AND day_of_week = ? AND period = ?",
                        rusqlite::params![class_id, day, period],
                        |r| r.get(0),
                    )
                    .optional()?;
                if exists.is_some() {
                    continue;
                }
                // Round-robin over the semester's subjects.
                let subject = &subjects[(period as usize + day_idx) % subjects.len()];
                conn.execute(
                    "INSERT INTO timetable_slots(id, class_id, subject_id, staff_id,
                       day_of_week, period, start_time, end_time)
                     VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
                    rusqlite::params![
                        Uuid::new_v4().to_string(),
                        class_id,
                        subject,
                        staff,
                        day,
                        period,
                        format!("{}:00:00", 8 + period),
                        format!("{}:00:00", 9 + period)
                    ],
                )
                .map_err(|e| HandlerErr::db("db_insert_failed", e))?;
                inserted += 1;
            }
        }
    }
    Ok(inserted)
}

fn seed_attendance(conn: &Connection) -> Result<u32, HandlerErr> {
    let mut inserted = 0;
    let today = Utc::now().date_naive();

    let mut stud_stmt = conn.prepare(
        "SELECT id, class_id FROM students WHERE department = 'CS' AND class_id IS NOT NULL",
    )?;
    let students = stud_stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    for (student_id, class_id) in students {
        let mut slot_stmt = conn.prepare(
            "SELECT subject_id, staff_id, day_of_week, period
             FROM timetable_slots WHERE class_id = ?",
        )?;
        let slots = slot_stmt
            .query_map([&class_id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, Option<String>>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        if slots.is_empty() {
            continue;
        }

        for back in 0..5 {
            let date = today - Duration::days(back);
            let day_idx = date.weekday().num_days_from_monday() as usize;
            if day_idx >= DAYS.len() {
                continue; // weekend
            }
            let day_name = DAYS[day_idx];
            let date_str = date.format("%Y-%m-%d").to_string();

            for (subject_id, staff_id, slot_day, period) in &slots {
                if slot_day != day_name {
                    continue;
                }
                let exists: Option<String> = conn
                    .query_row(
                        "SELECT id FROM attendance
                         WHERE student_id = ? AND date = ? AND period = ?",
                        rusqlite::params![student_id, date_str, period],
                        |r| r.get(0),
                    )
                    .optional()?;
                if exists.is_some() {
                    continue;
                }
                // Deterministic stand-in for the original's random statuses.
                let status = if (period + day_idx as i64) % 5 == 0 {
                    "ABSENT"
                } else {
                    "PRESENT"
                };
                conn.execute(
                    "INSERT INTO attendance(id, student_id, class_id, subject_id,
                       period, date, status, marked_by)
                     VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
                    rusqlite::params![
                        Uuid::new_v4().to_string(),
                        student_id,
                        class_id,
                        subject_id,
                        period,
                        date_str,
                        status,
                        staff_id
                    ],
                )
                .map_err(|e| HandlerErr::db("db_insert_failed", e))?;
                inserted += 1;
            }
        }
    }
    Ok(inserted)
}

fn seed_demo(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let departments = seed_departments(conn)?;
    // Staff before classes so classes can pick up a tutor; classes before
    // students so student rows land in their class.
    let mut users = seed_staff(conn)?;
    let classes = seed_classes(conn)?;
    let subjects = seed_subjects(conn)?;
    users += seed_students(conn)?;
    let slots = seed_timetable(conn)?;
    let attendance = seed_attendance(conn)?;

    log::info!(
        "seed.demo: {} departments, {} users, {} classes, {} subjects, {} slots, {} attendance",
        departments,
        users,
        classes,
        subjects,
        slots,
        attendance
    );
    Ok(json!({
        "message": "Demo data seeded",
        "inserted": {
            "departments": departments,
            "users": users,
            "classes": classes,
            "subjects": subjects,
            "timetableSlots": slots,
            "attendance": attendance
        }
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "seed.demo" => Some(admin_dispatch(state, req, seed_demo)),
        _ => None,
    }
}
