//! Elevated-role assignment. HOD is single-incumbent per department: any
//! sitting holder is demoted to STAFF before the new holder is promoted.
//! The two writes are sequential, not transactional; the store-level race
//! across concurrent daemons is documented and accepted.

use crate::directory::{Identity, IdentityDirectory, IdentityPatch, Role};

#[derive(Debug)]
pub enum StaffingError {
    TargetNotFound,
    Directory(anyhow::Error),
}

impl From<anyhow::Error> for StaffingError {
    fn from(e: anyhow::Error) -> Self {
        StaffingError::Directory(e)
    }
}

fn mirror_best_effort(dir: &mut dyn IdentityDirectory, user_id: &str, roles: &[String]) {
    // Mirror failure must not roll back the identity update.
    if let Err(e) = dir.set_role_mirror(user_id, roles) {
        log::warn!("role mirror update failed for {}: {}", user_id, e);
    }
}

fn demote_to_staff(dir: &mut dyn IdentityDirectory, incumbent: Identity) -> anyhow::Result<()> {
    let mut profile = incumbent.profile;
    profile.role = Role::Staff.as_str().to_string();

    let mut roles: Vec<String> = incumbent
        .roles
        .into_iter()
        .filter(|r| r != Role::Hod.as_str())
        .collect();
    if !roles.iter().any(|r| r == Role::Staff.as_str()) {
        roles.push(Role::Staff.as_str().to_string());
    }

    dir.update_user(
        &incumbent.id,
        IdentityPatch {
            profile: Some(profile),
            roles: Some(roles.clone()),
            ..Default::default()
        },
    )?;
    mirror_best_effort(dir, &incumbent.id, &roles);
    Ok(())
}

/// Assign `role` to `user_id`. STAFF is retained as a durable base claim
/// alongside any elevated role.
pub fn assign_role(
    dir: &mut dyn IdentityDirectory,
    user_id: &str,
    role: Role,
    department_code: Option<&str>,
) -> Result<(), StaffingError> {
    if role == Role::Hod {
        if let Some(dept) = department_code {
            if let Some(incumbent) = dir.find_department_hod(dept)? {
                if incumbent.id != user_id {
                    log::info!(
                        "demoting sitting HOD {} for department {}",
                        incumbent.id,
                        dept
                    );
                    demote_to_staff(dir, incumbent)?;
                }
            }
        }
    }

    let target = dir.get_user(user_id)?.ok_or(StaffingError::TargetNotFound)?;

    let mut profile = target.profile;
    profile.role = role.as_str().to_string();
    if let Some(dept) = department_code {
        profile.department_code = Some(dept.to_string());
    }

    let mut roles = vec![role.as_str().to_string()];
    if role != Role::Staff {
        roles.push(Role::Staff.as_str().to_string());
    }

    dir.update_user(
        user_id,
        IdentityPatch {
            profile: Some(profile),
            roles: Some(roles.clone()),
            ..Default::default()
        },
    )?;
    mirror_best_effort(dir, user_id, &roles);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::testing::MemDirectory;
    use crate::directory::Profile;

    fn staff(dept: &str) -> Profile {
        Profile {
            full_name: Some("Someone".into()),
            role: "STAFF".into(),
            department_code: Some(dept.into()),
            semester: None,
            dob: None,
        }
    }

    #[test]
    fn hod_assignment_demotes_sitting_incumbent() {
        let mut dir = MemDirectory::default();
        let mut hod_profile = staff("CS");
        hod_profile.role = "HOD".into();
        let a = dir.add("a@campus.com", hod_profile, &["HOD", "STAFF"]);
        let b = dir.add("b@campus.com", staff("CS"), &["STAFF"]);

        assign_role(&mut dir, &b, Role::Hod, Some("CS")).expect("assign");

        let a_user = dir.user(&a);
        assert!(!a_user.roles.iter().any(|r| r == "HOD"));
        assert!(a_user.roles.iter().any(|r| r == "STAFF"));
        assert_eq!(a_user.profile.role, "STAFF");

        let b_user = dir.user(&b);
        assert_eq!(b_user.roles, vec!["HOD".to_string(), "STAFF".to_string()]);
        assert_eq!(b_user.profile.role, "HOD");
        assert_eq!(b_user.profile.department_code.as_deref(), Some("CS"));
    }

    #[test]
    fn incumbent_in_other_department_is_untouched() {
        let mut dir = MemDirectory::default();
        let mut ec_hod = staff("EC");
        ec_hod.role = "HOD".into();
        let a = dir.add("a@campus.com", ec_hod, &["HOD", "STAFF"]);
        let b = dir.add("b@campus.com", staff("CS"), &["STAFF"]);

        assign_role(&mut dir, &b, Role::Hod, Some("CS")).expect("assign");
        assert!(dir.user(&a).roles.iter().any(|r| r == "HOD"));
    }

    #[test]
    fn reassigning_same_user_does_not_self_demote() {
        let mut dir = MemDirectory::default();
        let mut hod_profile = staff("CS");
        hod_profile.role = "HOD".into();
        let a = dir.add("a@campus.com", hod_profile, &["HOD", "STAFF"]);

        assign_role(&mut dir, &a, Role::Hod, Some("CS")).expect("assign");
        let a_user = dir.user(&a);
        assert_eq!(a_user.profile.role, "HOD");
        assert!(a_user.roles.iter().any(|r| r == "HOD"));
    }

    #[test]
    fn principal_assignment_skips_incumbent_logic() {
        let mut dir = MemDirectory::default();
        let mut hod_profile = staff("CS");
        hod_profile.role = "HOD".into();
        let a = dir.add("a@campus.com", hod_profile, &["HOD", "STAFF"]);
        let b = dir.add("b@campus.com", staff("CS"), &["STAFF"]);

        assign_role(&mut dir, &b, Role::Principal, None).expect("assign");
        assert!(dir.user(&a).roles.iter().any(|r| r == "HOD"));
        assert_eq!(
            dir.user(&b).roles,
            vec!["PRINCIPAL".to_string(), "STAFF".to_string()]
        );
    }

    #[test]
    fn staff_assignment_keeps_single_claim() {
        let mut dir = MemDirectory::default();
        let b = dir.add("b@campus.com", staff("CS"), &["HOD", "STAFF"]);
        assign_role(&mut dir, &b, Role::Staff, None).expect("assign");
        assert_eq!(dir.user(&b).roles, vec!["STAFF".to_string()]);
    }

    #[test]
    fn mirror_failure_is_tolerated() {
        let mut dir = MemDirectory {
            fail_mirror: true,
            ..Default::default()
        };
        let b = dir.add("b@campus.com", staff("CS"), &["STAFF"]);

        assign_role(&mut dir, &b, Role::Hod, Some("CS")).expect("assign despite mirror failure");
        assert_eq!(dir.user(&b).profile.role, "HOD");
        assert!(dir.mirror.is_empty());
    }

    #[test]
    fn missing_target_is_reported() {
        let mut dir = MemDirectory::default();
        match assign_role(&mut dir, "nope", Role::Hod, Some("CS")) {
            Err(StaffingError::TargetNotFound) => {}
            other => panic!("expected TargetNotFound, got {:?}", other.err()),
        }
    }

    #[test]
    fn mirror_records_claims_on_success() {
        let mut dir = MemDirectory::default();
        let b = dir.add("b@campus.com", staff("CS"), &["STAFF"]);
        assign_role(&mut dir, &b, Role::Hod, Some("CS")).expect("assign");
        assert_eq!(
            dir.mirror.get(&b).cloned().unwrap_or_default(),
            vec!["HOD".to_string(), "STAFF".to_string()]
        );
    }
}
