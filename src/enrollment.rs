//! Student-population workflows: semester promotion and roster onboarding.

use serde::Serialize;

use crate::directory::{derive_password, IdentityDirectory, IdentityPatch, NewIdentity, Profile, Role};

/// Students at or past this semester graduate (their identity is removed).
pub const TERMINAL_SEMESTER: i64 = 8;

/// Leading-integer parse over the stored semester string: "4th Semester" and
/// "4" both give 4, "S4" and "" give nothing. Matches the original's
/// `parseInt` semantics for non-negative values.
pub fn parse_semester(raw: &str) -> Option<i64> {
    let digits: String = raw
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

pub fn ordinal_suffix(n: i64) -> &'static str {
    let v = n % 100;
    if (11..=13).contains(&v) {
        return "th";
    }
    match v % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

pub fn format_semester(n: i64) -> String {
    format!("{}{} Semester", n, ordinal_suffix(n))
}

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct PromotionOutcome {
    pub promoted: u32,
    pub graduated: u32,
}

/// Advance every STUDENT identity by one semester; remove identities at or
/// past the terminal semester. Unparseable semesters are skipped silently
/// and count toward neither total. Not transactional across identities.
pub fn promote_students(dir: &mut dyn IdentityDirectory) -> anyhow::Result<PromotionOutcome> {
    // One listing call; the population is assumed to fit it.
    let users = dir.list_users()?;
    let mut outcome = PromotionOutcome::default();

    for user in users {
        if !user.has_role(Role::Student) {
            continue;
        }
        let Some(sem) = user.profile.semester.as_deref().and_then(parse_semester) else {
            continue;
        };
        if sem >= TERMINAL_SEMESTER {
            dir.delete_user(&user.id)?;
            outcome.graduated += 1;
        } else {
            let mut profile = user.profile.clone();
            profile.semester = Some(format_semester(sem + 1));
            dir.update_user(
                &user.id,
                IdentityPatch {
                    profile: Some(profile),
                    ..Default::default()
                },
            )?;
            outcome.promoted += 1;
        }
    }

    log::info!(
        "promotion run: {} promoted, {} graduated",
        outcome.promoted,
        outcome.graduated
    );
    Ok(outcome)
}

/// Parse uploaded roster text, one student per line:
/// `email,name,department,semester,dob`. Lines whose email field lacks an
/// `@` are dropped silently (header rows, blanks, junk).
pub fn parse_roster(text: &str) -> Vec<NewIdentity> {
    let mut batch = Vec::new();
    for line in text.lines() {
        let mut fields = line.split(',').map(str::trim);
        let email = fields.next().unwrap_or("");
        if !email.contains('@') {
            continue;
        }
        let name = fields.next().unwrap_or("");
        let department = fields.next().unwrap_or("");
        let semester = fields.next().unwrap_or("");
        let dob = fields.next().unwrap_or("");

        let non_empty = |s: &str| {
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        };
        batch.push(NewIdentity {
            email: email.to_string(),
            password: derive_password(None, non_empty(dob).as_deref()),
            profile: Profile {
                full_name: non_empty(name),
                role: Role::Student.as_str().to_string(),
                department_code: non_empty(department),
                semester: non_empty(semester),
                dob: non_empty(dob),
            },
            roles: vec![Role::Student.as_str().to_string()],
            admission_number: None,
        });
    }
    batch
}

#[derive(Debug, Serialize)]
pub struct RowError {
    pub email: String,
    pub message: String,
}

#[derive(Debug, Default, Serialize)]
pub struct BulkOutcome {
    pub success: u32,
    pub failed: u32,
    pub errors: Vec<RowError>,
}

/// Apply creation requests sequentially. One row's failure does not abort
/// the rest; per-row errors are collected in the result.
pub fn apply_new_users(dir: &mut dyn IdentityDirectory, batch: Vec<NewIdentity>) -> BulkOutcome {
    let mut results = BulkOutcome::default();
    for new in batch {
        let email = new.email.clone();
        match dir.create_user(new) {
            Ok(_) => results.success += 1,
            Err(e) => {
                results.failed += 1;
                results.errors.push(RowError {
                    email,
                    message: e.to_string(),
                });
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::testing::MemDirectory;

    fn student(semester: Option<&str>) -> Profile {
        Profile {
            full_name: Some("Test Student".into()),
            role: "STUDENT".into(),
            department_code: Some("CS".into()),
            semester: semester.map(|s| s.to_string()),
            dob: None,
        }
    }

    #[test]
    fn parse_semester_takes_leading_integer() {
        assert_eq!(parse_semester("4th Semester"), Some(4));
        assert_eq!(parse_semester("4"), Some(4));
        assert_eq!(parse_semester("  12 "), Some(12));
        assert_eq!(parse_semester("S4"), None);
        assert_eq!(parse_semester("Semester 4"), None);
        assert_eq!(parse_semester(""), None);
    }

    #[test]
    fn ordinal_suffixes_match_english() {
        let cases = [
            (1, "1st"),
            (2, "2nd"),
            (3, "3rd"),
            (4, "4th"),
            (11, "11th"),
            (12, "12th"),
            (13, "13th"),
            (21, "21st"),
            (22, "22nd"),
            (23, "23rd"),
            (101, "101st"),
            (111, "111th"),
        ];
        for (n, want) in cases {
            assert_eq!(format!("{}{}", n, ordinal_suffix(n)), want);
        }
    }

    #[test]
    fn promotion_increments_below_terminal() {
        let mut dir = MemDirectory::default();
        let id = dir.add("s1@campus.com", student(Some("4th Semester")), &["STUDENT"]);

        let out = promote_students(&mut dir).expect("promote");
        assert_eq!(out, PromotionOutcome { promoted: 1, graduated: 0 });
        assert_eq!(
            dir.user(&id).profile.semester.as_deref(),
            Some("5th Semester")
        );
    }

    #[test]
    fn promotion_graduates_at_terminal_by_deleting() {
        let mut dir = MemDirectory::default();
        dir.add("s8@campus.com", student(Some("8th Semester")), &["STUDENT"]);
        dir.add("s9@campus.com", student(Some("9")), &["STUDENT"]);

        let out = promote_students(&mut dir).expect("promote");
        assert_eq!(out, PromotionOutcome { promoted: 0, graduated: 2 });
        assert!(dir.users.is_empty());
    }

    #[test]
    fn promotion_skips_unparseable_semesters_silently() {
        let mut dir = MemDirectory::default();
        let a = dir.add("sa@campus.com", student(Some("S4")), &["STUDENT"]);
        let b = dir.add("sb@campus.com", student(None), &["STUDENT"]);

        let out = promote_students(&mut dir).expect("promote");
        assert_eq!(out, PromotionOutcome { promoted: 0, graduated: 0 });
        assert_eq!(dir.user(&a).profile.semester.as_deref(), Some("S4"));
        assert_eq!(dir.user(&b).profile.semester, None);
    }

    #[test]
    fn promotion_ignores_non_students() {
        let mut dir = MemDirectory::default();
        let mut p = student(Some("4th Semester"));
        p.role = "STAFF".into();
        let id = dir.add("t@campus.com", p, &["STAFF"]);

        let out = promote_students(&mut dir).expect("promote");
        assert_eq!(out, PromotionOutcome { promoted: 0, graduated: 0 });
        assert_eq!(
            dir.user(&id).profile.semester.as_deref(),
            Some("4th Semester")
        );
    }

    #[test]
    fn roster_parses_valid_rows_and_drops_lines_without_at() {
        let text = "email,name,department,semester,dob\n\
                    a@x.com,A,CS,4,2004-05-10\n\
                    not a student line\n\
                    \n\
                    b@x.com,B,EC,2,";
        let batch = parse_roster(text);
        assert_eq!(batch.len(), 2);

        assert_eq!(batch[0].email, "a@x.com");
        assert_eq!(batch[0].password, "10052004");
        assert_eq!(batch[0].profile.department_code.as_deref(), Some("CS"));
        assert_eq!(batch[0].profile.semester.as_deref(), Some("4"));
        assert_eq!(batch[0].roles, vec!["STUDENT".to_string()]);

        // No DOB: fallback password.
        assert_eq!(batch[1].password, crate::directory::FALLBACK_PASSWORD);
    }

    #[test]
    fn bulk_apply_counts_partial_failures_without_aborting() {
        let mut dir = MemDirectory::default();
        let text = "a@x.com,A,CS,4,2004-05-10\n\
                    a@x.com,Dup,CS,4,2004-05-10\n\
                    c@x.com,C,CS,2,2005-01-15";
        let results = apply_new_users(&mut dir, parse_roster(text));

        assert_eq!(results.success, 2);
        assert_eq!(results.failed, 1);
        assert_eq!(results.errors.len(), 1);
        assert_eq!(results.errors[0].email, "a@x.com");
        assert_eq!(dir.users.len(), 2);
    }

    #[test]
    fn malformed_line_is_dropped_not_failed() {
        let mut dir = MemDirectory::default();
        let text = "a@x.com,A,CS,4,2004-05-10\nno-at-sign,B,CS,4,2004-01-01";
        let results = apply_new_users(&mut dir, parse_roster(text));
        assert_eq!(results.success, 1);
        assert_eq!(results.failed, 0);
        assert!(results.errors.is_empty());
    }
}
