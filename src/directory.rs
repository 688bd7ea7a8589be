use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::enrollment;

/// Fallback credential when neither an explicit password nor a DOB is given.
pub const FALLBACK_PASSWORD: &str = "Campus@123";

/// Authorization role claims. An identity may hold more than one
/// (e.g. `[HOD, STAFF]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Staff,
    Hod,
    Principal,
    SuperAdmin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "STUDENT" => Some(Role::Student),
            "STAFF" => Some(Role::Staff),
            "HOD" => Some(Role::Hod),
            "PRINCIPAL" => Some(Role::Principal),
            "SUPER_ADMIN" => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Staff => "STAFF",
            Role::Hod => "HOD",
            Role::Principal => "PRINCIPAL",
            Role::SuperAdmin => "SUPER_ADMIN",
        }
    }
}

/// Typed profile carried on an identity record. The original deployment kept
/// these as a loose metadata bag; fields are explicit here. `semester` stays
/// a raw string ("4th Semester", "4", ...) because promotion's
/// leading-integer parse over it is observable behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub full_name: Option<String>,
    pub role: String,
    pub department_code: Option<String>,
    pub semester: Option<String>,
    pub dob: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub profile: Profile,
    pub roles: Vec<String>,
    pub created_at: String,
    pub last_sign_in_at: Option<String>,
}

impl Identity {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|r| r == role.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub password: String,
    pub profile: Profile,
    pub roles: Vec<String>,
    /// Provisioning input for the student profile row; not read back on the
    /// identity itself.
    pub admission_number: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct IdentityPatch {
    pub profile: Option<Profile>,
    pub roles: Option<Vec<String>>,
    pub password: Option<String>,
}

/// Admin-privileged handle over the identity store. The shipped
/// implementation is SQLite-backed; tests substitute an in-memory fake.
pub trait IdentityDirectory {
    fn create_user(&mut self, new: NewIdentity) -> anyhow::Result<Identity>;
    fn update_user(&mut self, id: &str, patch: IdentityPatch) -> anyhow::Result<Identity>;
    fn delete_user(&mut self, id: &str) -> anyhow::Result<()>;
    fn get_user(&self, id: &str) -> anyhow::Result<Option<Identity>>;
    fn list_users(&self) -> anyhow::Result<Vec<Identity>>;
    /// Current HOD incumbent for a department, by profile role or claim list.
    fn find_department_hod(&self, department_code: &str) -> anyhow::Result<Option<Identity>>;
    /// Best-effort mirror of the claim list into the user_roles table.
    fn set_role_mirror(&mut self, user_id: &str, roles: &[String]) -> anyhow::Result<()>;
}

/// DOB "YYYY-MM-DD" -> "DDMMYYYY".
pub fn password_from_dob(dob: &str) -> Option<String> {
    let mut parts = dob.trim().splitn(3, '-');
    let y = parts.next()?;
    let m = parts.next()?;
    let d = parts.next()?;
    if y.is_empty() || m.is_empty() || d.is_empty() {
        return None;
    }
    Some(format!("{}{}{}", d, m, y))
}

/// Default-password chain: explicit, then DOB-derived, then the fallback.
pub fn derive_password(explicit: Option<&str>, dob: Option<&str>) -> String {
    if let Some(p) = explicit {
        if !p.is_empty() {
            return p.to_string();
        }
    }
    if let Some(d) = dob {
        if let Some(p) = password_from_dob(d) {
            return p;
        }
    }
    FALLBACK_PASSWORD.to_string()
}

pub fn password_digest(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn now_utc() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub struct SqlDirectory<'a> {
    conn: &'a Connection,
}

impl<'a> SqlDirectory<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        SqlDirectory { conn }
    }

    fn row_to_identity(row: &rusqlite::Row<'_>) -> rusqlite::Result<Identity> {
        let roles_raw: String = row.get(8)?;
        let roles: Vec<String> = serde_json::from_str(&roles_raw).unwrap_or_default();
        Ok(Identity {
            id: row.get(0)?,
            email: row.get(1)?,
            profile: Profile {
                full_name: row.get(2)?,
                role: row.get(3)?,
                department_code: row.get(4)?,
                semester: row.get(5)?,
                dob: row.get(6)?,
            },
            roles,
            created_at: row.get(7)?,
            last_sign_in_at: row.get(9)?,
        })
    }

    const SELECT_COLS: &'static str = "id, email, full_name, role, department_code, semester, \
         dob, created_at, roles, last_sign_in_at";

    /// Provision the student profile row next to a STUDENT identity. Class
    /// assignment is a best-effort match on department + semester.
    fn provision_student_row(&self, identity: &Identity, admission: Option<&str>) -> anyhow::Result<()> {
        let class_id: Option<String> = match (
            identity.profile.department_code.as_deref(),
            identity
                .profile
                .semester
                .as_deref()
                .and_then(enrollment::parse_semester),
        ) {
            (Some(dept), Some(sem)) => self
                .conn
                .query_row(
                    "SELECT id FROM classes WHERE department_code = ? AND semester = ? LIMIT 1",
                    rusqlite::params![dept, sem],
                    |r| r.get(0),
                )
                .optional()?,
            _ => None,
        };
        self.conn.execute(
            "INSERT INTO students(id, user_id, admission_number, department, class_id)
             VALUES(?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
               admission_number = COALESCE(excluded.admission_number, admission_number),
               department = excluded.department,
               class_id = COALESCE(excluded.class_id, class_id)",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                identity.id,
                admission,
                identity.profile.department_code,
                class_id
            ],
        )?;
        Ok(())
    }
}

impl IdentityDirectory for SqlDirectory<'_> {
    fn create_user(&mut self, new: NewIdentity) -> anyhow::Result<Identity> {
        let id = Uuid::new_v4().to_string();
        let roles_json = serde_json::to_string(&new.roles)?;
        let created_at = now_utc();
        self.conn.execute(
            "INSERT INTO identities(id, email, password_digest, full_name, role,
               department_code, semester, dob, roles, created_at, last_sign_in_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)",
            rusqlite::params![
                id,
                new.email,
                password_digest(&new.password),
                new.profile.full_name,
                new.profile.role,
                new.profile.department_code,
                new.profile.semester,
                new.profile.dob,
                roles_json,
                created_at
            ],
        )?;
        let identity = Identity {
            id,
            email: new.email,
            profile: new.profile,
            roles: new.roles,
            created_at,
            last_sign_in_at: None,
        };
        if identity.has_role(Role::Student) {
            self.provision_student_row(&identity, new.admission_number.as_deref())?;
        }
        Ok(identity)
    }

    fn update_user(&mut self, id: &str, patch: IdentityPatch) -> anyhow::Result<Identity> {
        let existing = self
            .get_user(id)?
            .ok_or_else(|| anyhow::anyhow!("user not found: {}", id))?;

        let profile = patch.profile.unwrap_or(existing.profile);
        let roles = patch.roles.unwrap_or(existing.roles);
        let roles_json = serde_json::to_string(&roles)?;

        self.conn.execute(
            "UPDATE identities SET full_name = ?, role = ?, department_code = ?,
               semester = ?, dob = ?, roles = ? WHERE id = ?",
            rusqlite::params![
                profile.full_name,
                profile.role,
                profile.department_code,
                profile.semester,
                profile.dob,
                roles_json,
                id
            ],
        )?;
        if let Some(pw) = patch.password.as_deref() {
            self.conn.execute(
                "UPDATE identities SET password_digest = ? WHERE id = ?",
                rusqlite::params![password_digest(pw), id],
            )?;
        }
        Ok(Identity {
            id: existing.id,
            email: existing.email,
            profile,
            roles,
            created_at: existing.created_at,
            last_sign_in_at: existing.last_sign_in_at,
        })
    }

    fn delete_user(&mut self, id: &str) -> anyhow::Result<()> {
        // Graduation and removal both go through here: the identity, its
        // role mirror, and its student profile row all go. Attendance rows
        // stay behind keyed by the dead student id.
        self.conn
            .execute("DELETE FROM students WHERE user_id = ?", [id])?;
        self.conn
            .execute("DELETE FROM user_roles WHERE user_id = ?", [id])?;
        let n = self
            .conn
            .execute("DELETE FROM identities WHERE id = ?", [id])?;
        if n == 0 {
            anyhow::bail!("user not found: {}", id);
        }
        Ok(())
    }

    fn get_user(&self, id: &str) -> anyhow::Result<Option<Identity>> {
        let sql = format!(
            "SELECT {} FROM identities WHERE id = ?",
            Self::SELECT_COLS
        );
        Ok(self
            .conn
            .query_row(&sql, [id], Self::row_to_identity)
            .optional()?)
    }

    fn list_users(&self) -> anyhow::Result<Vec<Identity>> {
        let sql = format!(
            "SELECT {} FROM identities ORDER BY created_at, email",
            Self::SELECT_COLS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let users = stmt
            .query_map([], Self::row_to_identity)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn find_department_hod(&self, department_code: &str) -> anyhow::Result<Option<Identity>> {
        // Targeted query instead of a full-directory scan. The claim list is
        // stored as a JSON array, so the claim match is a substring test.
        let sql = format!(
            "SELECT {} FROM identities
             WHERE department_code = ? AND (role = 'HOD' OR roles LIKE '%\"HOD\"%')
             LIMIT 1",
            Self::SELECT_COLS
        );
        Ok(self
            .conn
            .query_row(&sql, [department_code], Self::row_to_identity)
            .optional()?)
    }

    fn set_role_mirror(&mut self, user_id: &str, roles: &[String]) -> anyhow::Result<()> {
        let roles_json = serde_json::to_string(roles)?;
        self.conn.execute(
            "INSERT INTO user_roles(user_id, roles) VALUES(?, ?)
             ON CONFLICT(user_id) DO UPDATE SET roles = excluded.roles",
            rusqlite::params![user_id, roles_json],
        )?;
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;

    /// In-memory directory for workflow tests. `fail_mirror` exercises the
    /// logged-not-fatal role-mirror path.
    #[derive(Default)]
    pub struct MemDirectory {
        pub users: Vec<Identity>,
        pub mirror: HashMap<String, Vec<String>>,
        pub fail_mirror: bool,
        pub next: u32,
    }

    impl MemDirectory {
        pub fn add(&mut self, email: &str, profile: Profile, roles: &[&str]) -> String {
            self.next += 1;
            let id = format!("u{}", self.next);
            self.users.push(Identity {
                id: id.clone(),
                email: email.to_string(),
                profile,
                roles: roles.iter().map(|r| r.to_string()).collect(),
                created_at: String::new(),
                last_sign_in_at: None,
            });
            id
        }

        pub fn user(&self, id: &str) -> &Identity {
            self.users.iter().find(|u| u.id == id).expect("user")
        }
    }

    impl IdentityDirectory for MemDirectory {
        fn create_user(&mut self, new: NewIdentity) -> anyhow::Result<Identity> {
            if self.users.iter().any(|u| u.email == new.email) {
                anyhow::bail!("email already registered: {}", new.email);
            }
            self.next += 1;
            let identity = Identity {
                id: format!("u{}", self.next),
                email: new.email,
                profile: new.profile,
                roles: new.roles,
                created_at: String::new(),
                last_sign_in_at: None,
            };
            self.users.push(identity.clone());
            Ok(identity)
        }

        fn update_user(&mut self, id: &str, patch: IdentityPatch) -> anyhow::Result<Identity> {
            let u = self
                .users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or_else(|| anyhow::anyhow!("user not found: {}", id))?;
            if let Some(p) = patch.profile {
                u.profile = p;
            }
            if let Some(r) = patch.roles {
                u.roles = r;
            }
            Ok(u.clone())
        }

        fn delete_user(&mut self, id: &str) -> anyhow::Result<()> {
            let before = self.users.len();
            self.users.retain(|u| u.id != id);
            if self.users.len() == before {
                anyhow::bail!("user not found: {}", id);
            }
            self.mirror.remove(id);
            Ok(())
        }

        fn get_user(&self, id: &str) -> anyhow::Result<Option<Identity>> {
            Ok(self.users.iter().find(|u| u.id == id).cloned())
        }

        fn list_users(&self) -> anyhow::Result<Vec<Identity>> {
            Ok(self.users.clone())
        }

        fn find_department_hod(&self, department_code: &str) -> anyhow::Result<Option<Identity>> {
            Ok(self
                .users
                .iter()
                .find(|u| {
                    u.profile.department_code.as_deref() == Some(department_code)
                        && (u.profile.role == "HOD" || u.has_role(Role::Hod))
                })
                .cloned())
        }

        fn set_role_mirror(&mut self, user_id: &str, roles: &[String]) -> anyhow::Result<()> {
            if self.fail_mirror {
                anyhow::bail!("mirror table unavailable");
            }
            self.mirror.insert(user_id.to_string(), roles.to_vec());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_from_dob_formats_ddmmyyyy() {
        assert_eq!(password_from_dob("2004-05-10").as_deref(), Some("10052004"));
        assert_eq!(password_from_dob("1975-04-12").as_deref(), Some("12041975"));
        // Garbage in, garbage out, like the original's split-and-join.
        assert_eq!(password_from_dob("a-b-c").as_deref(), Some("cba"));
        assert_eq!(password_from_dob("2004"), None);
        assert_eq!(password_from_dob(""), None);
    }

    #[test]
    fn derive_password_prefers_explicit_then_dob_then_fallback() {
        assert_eq!(derive_password(Some("secret"), Some("2004-05-10")), "secret");
        assert_eq!(derive_password(None, Some("2004-05-10")), "10052004");
        assert_eq!(derive_password(Some(""), Some("2004-05-10")), "10052004");
        assert_eq!(derive_password(None, None), FALLBACK_PASSWORD);
        assert_eq!(derive_password(None, Some("2004")), FALLBACK_PASSWORD);
    }

    #[test]
    fn role_parse_round_trips() {
        for s in ["STUDENT", "STAFF", "HOD", "PRINCIPAL", "SUPER_ADMIN"] {
            assert_eq!(Role::parse(s).map(Role::as_str), Some(s));
        }
        assert!(Role::parse("TEACHER").is_none());
        assert!(Role::parse("hod").is_none());
    }

    #[test]
    fn digest_is_hex_sha256() {
        let d = password_digest("Campus@123");
        assert_eq!(d.len(), 64);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(d, password_digest("Campus@124"));
    }
}
