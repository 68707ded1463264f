//! DTO → domain translation, the anti-corruption boundary.

use chrono::{DateTime, Utc};

use crate::domain::{DomainError, DomainResult, OnlineState, Student, StudentStatus, TaskCompletion};

use super::dto::{BootcampNodeDto, StudentDto, SyncDeltaDto, TaskCompletionDto};

const AWAY_THRESHOLD: chrono::Duration = chrono::Duration::minutes(30);

/// Maps an upstream student DTO to a domain `Student`, returning the XP
/// delta against `previous` (0 if this is a first sight). A non-zero delta
/// is the caller's cue to emit `XPChanged`.
pub fn map_student(dto: &StudentDto, previous: Option<&Student>, now: DateTime<Utc>) -> DomainResult<(Student, i64)> {
    let cohort = dto
        .cohort
        .clone()
        .filter(|s| !s.is_empty())
        .or_else(|| dto.pool.clone().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| "default".to_string());

    let display_name = display_name(dto);

    let online_state = if dto.is_online {
        OnlineState::Online
    } else if dto
        .last_activity_at
        .is_some_and(|t| now - t <= AWAY_THRESHOLD)
    {
        OnlineState::Away
    } else {
        OnlineState::Offline
    };

    let old_xp = previous.map(|s| s.xp).unwrap_or(dto.xp);

    let mut student = Student::new(dto.id.clone(), dto.login.clone(), display_name, cohort, now)?;
    student.email = dto.email.clone();
    student.set_xp(dto.xp)?;
    student.status = if dto.is_active {
        StudentStatus::Active
    } else {
        StudentStatus::Inactive
    };
    student.online_state = online_state;
    student.created_at = dto.created_at;
    student.updated_at = dto.updated_at;
    student.last_synced_at = now;
    if let Some(prev) = previous {
        student.preferences = prev.preferences.clone();
        student.help_rating = prev.help_rating;
        student.help_count = prev.help_count;
    }

    Ok((student, dto.xp - old_xp))
}

fn display_name(dto: &StudentDto) -> String {
    let combined = match (dto.first_name.trim(), dto.last_name.trim()) {
        ("", "") => String::new(),
        (first, "") => first.to_string(),
        ("", last) => last.to_string(),
        (first, last) => format!("{first} {last}"),
    };
    if combined.is_empty() {
        dto.login.clone()
    } else {
        combined
    }
}

/// A leaf produced by [`flatten_bootcamp_tree`]: enough to build a
/// `TaskCompletion` once paired with a student id.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedCompletion {
    pub task_id: String,
    pub xp: i64,
    pub status: &'static str,
}

/// Depth-first preorder walk. A node is a completion iff it has a non-empty
/// `id` AND `status == "COMPLETED"` AND `user_xp > 0`; week/intro container
/// nodes are traversed but not emitted. Idempotent: re-running on the same
/// tree yields the same set regardless of traversal order.
pub fn flatten_bootcamp_tree(node: &BootcampNodeDto) -> Vec<FlattenedCompletion> {
    let mut out = Vec::new();
    flatten_into(node, &mut out);
    out
}

fn flatten_into(node: &BootcampNodeDto, out: &mut Vec<FlattenedCompletion>) {
    let is_completion = node
        .id
        .as_deref()
        .is_some_and(|id| !id.is_empty())
        && node.status.as_deref() == Some("COMPLETED")
        && node.user_xp > 0;

    if is_completion {
        out.push(FlattenedCompletion {
            task_id: node.id.clone().unwrap(),
            xp: node.user_xp,
            status: "passed",
        });
    }
    for child in &node.children {
        flatten_into(child, out);
    }
}

/// `taskSlug` if present, else `taskId`; `completedAt` defaults to `now`;
/// success iff status is one of passed/completed/success.
pub fn map_task_completion(dto: &TaskCompletionDto, now: DateTime<Utc>) -> DomainResult<TaskCompletion> {
    let task_id = dto
        .task_slug
        .clone()
        .filter(|s| !s.is_empty())
        .or_else(|| dto.task_id.clone())
        .ok_or_else(|| DomainError::validation("task completion missing both taskSlug and taskId"))?;

    let success = matches!(dto.status.to_lowercase().as_str(), "passed" | "completed" | "success");
    if !success {
        return Err(DomainError::validation(format!(
            "task completion status {} is not a success status",
            dto.status
        )));
    }

    TaskCompletion::new(
        dto.student_id.clone(),
        task_id,
        dto.completed_at.unwrap_or(now),
        dto.xp_earned,
        dto.attempts.max(1),
        dto.time_spent,
    )
}

/// Per-entity mapping failure, collected rather than aborting the batch.
#[derive(Debug, Clone)]
pub struct MappingError {
    pub entity: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct SyncResult {
    pub students: Vec<Student>,
    pub xp_deltas: Vec<(String, i64)>,
    pub task_completions: Vec<TaskCompletion>,
    pub deleted_student_ids: Vec<String>,
    pub errors: Vec<MappingError>,
    pub next_sync_token: String,
    pub full_sync_required: bool,
}

/// Maps a whole sync-delta batch; a bad record is recorded in `errors` and
/// skipped rather than aborting the rest.
pub fn map_sync_delta(
    delta: &SyncDeltaDto,
    previous_students: &std::collections::HashMap<String, Student>,
    now: DateTime<Utc>,
) -> SyncResult {
    let mut result = SyncResult {
        next_sync_token: delta.next_sync_token.clone(),
        full_sync_required: delta.full_sync_required,
        deleted_student_ids: delta.deleted_student_ids.clone(),
        ..Default::default()
    };

    for dto in &delta.students {
        match map_student(dto, previous_students.get(&dto.id), now) {
            Ok((student, delta_xp)) => {
                if delta_xp != 0 {
                    result.xp_deltas.push((student.id.clone(), delta_xp));
                }
                result.students.push(student);
            }
            Err(e) => result.errors.push(MappingError {
                entity: format!("student:{}", dto.id),
                message: e.to_string(),
            }),
        }
    }

    for dto in &delta.task_completions {
        match map_task_completion(dto, now) {
            Ok(tc) => result.task_completions.push(tc),
            Err(e) => result.errors.push(MappingError {
                entity: format!("task_completion:{}:{}", dto.student_id, dto.status),
                message: e.to_string(),
            }),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn node(id: Option<&str>, status: Option<&str>, xp: i64, children: Vec<BootcampNodeDto>) -> BootcampNodeDto {
        BootcampNodeDto {
            id: id.map(str::to_string),
            title: String::new(),
            status: status.map(str::to_string),
            user_xp: xp,
            children,
        }
    }

    #[test]
    fn s4_bootcamp_flatten() {
        let tree = node(
            Some("bc1"),
            None,
            0,
            vec![node(
                None,
                None,
                0,
                vec![
                    node(Some("t1"), Some("COMPLETED"), 100, vec![]),
                    node(Some("t2"), Some("AVAILABLE"), 0, vec![]),
                ],
            )],
        );
        let flat = flatten_bootcamp_tree(&tree);
        assert_eq!(
            flat,
            vec![FlattenedCompletion {
                task_id: "t1".into(),
                xp: 100,
                status: "passed"
            }]
        );
    }

    #[test]
    fn flatten_is_idempotent() {
        let tree = node(
            Some("bc1"),
            Some("COMPLETED"),
            50,
            vec![node(Some("t2"), Some("COMPLETED"), 10, vec![])],
        );
        assert_eq!(flatten_bootcamp_tree(&tree), flatten_bootcamp_tree(&tree));
    }

    #[test]
    fn display_name_falls_back_to_login() {
        let dto = StudentDto {
            id: "1".into(),
            login: "jdoe".into(),
            first_name: String::new(),
            last_name: String::new(),
            email: None,
            xp: 0,
            cohort: None,
            pool: None,
            is_active: true,
            is_online: false,
            last_activity_at: None,
            created_at: now(),
            updated_at: now(),
        };
        assert_eq!(display_name(&dto), "jdoe");
    }

    #[test]
    fn email_is_never_synthesized() {
        let dto = StudentDto {
            id: "1".into(),
            login: "jdoe".into(),
            first_name: "J".into(),
            last_name: "Doe".into(),
            email: None,
            xp: 10,
            cohort: None,
            pool: None,
            is_active: true,
            is_online: false,
            last_activity_at: None,
            created_at: now(),
            updated_at: now(),
        };
        let (student, _) = map_student(&dto, None, now()).unwrap();
        assert_eq!(student.email, None);
    }

    #[test]
    fn xp_delta_against_previous() {
        let dto = StudentDto {
            id: "1".into(),
            login: "jdoe".into(),
            first_name: "J".into(),
            last_name: "Doe".into(),
            email: None,
            xp: 150,
            cohort: None,
            pool: None,
            is_active: true,
            is_online: false,
            last_activity_at: None,
            created_at: now(),
            updated_at: now(),
        };
        let mut prev = Student::new("1", "jdoe", "J Doe", "default", now()).unwrap();
        prev.set_xp(100).unwrap();
        let (_, delta) = map_student(&dto, Some(&prev), now()).unwrap();
        assert_eq!(delta, 50);
    }

    #[test]
    fn online_state_away_within_30_minutes() {
        let dto = StudentDto {
            id: "1".into(),
            login: "jdoe".into(),
            first_name: String::new(),
            last_name: String::new(),
            email: None,
            xp: 0,
            cohort: None,
            pool: None,
            is_active: true,
            is_online: false,
            last_activity_at: Some(now() - chrono::Duration::minutes(10)),
            created_at: now(),
            updated_at: now(),
        };
        let (student, _) = map_student(&dto, None, now()).unwrap();
        assert_eq!(student.online_state, crate::domain::OnlineState::Away);
    }

    #[test]
    fn task_completion_uses_slug_over_id() {
        let dto = TaskCompletionDto {
            task_id: Some("id-1".into()),
            task_slug: Some("slug-1".into()),
            student_id: "s1".into(),
            status: "passed".into(),
            xp_earned: 10,
            attempts: 1,
            time_spent: 5,
            completed_at: None,
        };
        let tc = map_task_completion(&dto, now()).unwrap();
        assert_eq!(tc.task_id, "slug-1");
        assert_eq!(tc.completed_at, now());
    }
}
