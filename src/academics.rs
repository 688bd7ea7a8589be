//! Attendance aggregation for the student dashboard: per-subject counts and
//! an overall percentage over the curriculum subject set.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SubjectRef {
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub credits: i64,
}

#[derive(Debug, Clone)]
pub struct AttendanceMark {
    pub subject_id: String,
    pub present: bool,
}

#[derive(Debug, Serialize)]
pub struct SubjectStats {
    #[serde(flatten)]
    pub subject: SubjectRef,
    pub total: usize,
    pub present: usize,
    pub percentage: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicSummary {
    pub overall_attendance: i64,
    pub subject_stats: Vec<SubjectStats>,
}

/// Integer percentage, rounded half-up; 0 when nothing was recorded.
pub fn percentage(present: usize, total: usize) -> i64 {
    if total == 0 {
        return 0;
    }
    ((present as f64 / total as f64) * 100.0).round() as i64
}

/// Join attendance marks against the curriculum subject set. Marks for
/// subjects outside the set do not contribute anywhere; the display set is
/// the curriculum, not whatever the timetable happens to teach.
pub fn summarize(subjects: Vec<SubjectRef>, marks: &[AttendanceMark]) -> AcademicSummary {
    let mut total_sessions = 0usize;
    let mut present_sessions = 0usize;

    let subject_stats: Vec<SubjectStats> = subjects
        .into_iter()
        .map(|sub| {
            let total = marks.iter().filter(|m| m.subject_id == sub.id).count();
            let present = marks
                .iter()
                .filter(|m| m.subject_id == sub.id && m.present)
                .count();
            total_sessions += total;
            present_sessions += present;
            SubjectStats {
                percentage: percentage(present, total),
                subject: sub,
                total,
                present,
            }
        })
        .collect();

    AcademicSummary {
        overall_attendance: percentage(present_sessions, total_sessions),
        subject_stats,
    }
}
