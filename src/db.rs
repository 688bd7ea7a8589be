use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("campus.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    // Identity records. The hosted auth service of the original deployment
    // owns these; here they live behind the directory adapter in the same
    // workspace store. Passwords are write-only digests.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS identities(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_digest TEXT NOT NULL,
            full_name TEXT,
            role TEXT NOT NULL,
            department_code TEXT,
            semester TEXT,
            dob TEXT,
            roles TEXT NOT NULL,
            created_at TEXT NOT NULL,
            last_sign_in_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_identities_department ON identities(department_code)",
        [],
    )?;

    // Query-convenience mirror of the role-claim list.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS user_roles(
            user_id TEXT PRIMARY KEY,
            roles TEXT NOT NULL
        )",
        [],
    )?;

    // Student profile rows, provisioned alongside STUDENT identities.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE,
            admission_number TEXT,
            department TEXT,
            class_id TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS departments(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    // Classes reference departments by code string; deleting a department
    // leaves the code dangling (no client-side referential guard).
    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            department_code TEXT NOT NULL,
            semester INTEGER NOT NULL,
            batch TEXT,
            tutor_id TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_dept_sem ON classes(department_code, semester)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            credits INTEGER NOT NULL,
            department TEXT NOT NULL,
            semester INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_dept_sem ON subjects(department, semester)",
        [],
    )?;

    // (class, day, period) is intended unique per class; callers check for
    // an existing slot before insert rather than the store enforcing it.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable_slots(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            staff_id TEXT,
            day_of_week TEXT NOT NULL,
            period INTEGER NOT NULL,
            start_time TEXT,
            end_time TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timetable_class ON timetable_slots(class_id)",
        [],
    )?;

    // (student, date, period) uniqueness is checked defensively before
    // insert, not constrained here.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            period INTEGER NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            marked_by TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student_date ON attendance(student_id, date)",
        [],
    )?;

    Ok(conn)
}
