//! Reaction pipelines: what happens downstream of a domain event.
//!
//! Every step of a pipeline runs regardless of earlier non-fatal failures —
//! a malformed notification must never stop an achievement from being
//! recorded. The one exception is loading the acting student: if that
//! fails there is nothing sensible left to react to, so it short-circuits
//! the whole pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::warn;

use crate::domain::repo::{
    AchievementRepository, ConnectionRepository, DailyProgressRepository, StudentRepository, TaskCompletionRepository,
    XpHistoryRepository,
};
use crate::domain::{
    Achievement, ActivityAggregate, Connection, ConnectionType, DailyProgress, DomainError, DomainResult, Session,
    SolversIndex, StudentId, XpHistoryEntry,
};
use crate::notifications::{Notification, NotificationPriority, NotificationSender};

use super::error::ReactionReport;
use super::types::{HelpReceivedEvent, TaskCompletedEvent, XpChangedEvent};

/// Cumulative completed-task counts that award a milestone achievement.
const MILESTONES: &[u64] = &[1, 10, 50, 100, 500, 1000];

/// XP earned on a single task at or above which the confirmation
/// notification gets a celebratory suffix.
const CELEBRATION_THRESHOLD: i64 = 200;

pub struct ReactionCore {
    students: Arc<dyn StudentRepository>,
    task_completions: Arc<dyn TaskCompletionRepository>,
    daily_progress: Arc<dyn DailyProgressRepository>,
    achievements: Arc<dyn AchievementRepository>,
    connections: Arc<dyn ConnectionRepository>,
    notifications: Arc<dyn NotificationSender>,
    xp_history: Arc<dyn XpHistoryRepository>,
    solvers_index: Mutex<SolversIndex>,
    activity: Mutex<HashMap<StudentId, ActivityAggregate>>,
}

impl ReactionCore {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        students: Arc<dyn StudentRepository>,
        task_completions: Arc<dyn TaskCompletionRepository>,
        daily_progress: Arc<dyn DailyProgressRepository>,
        achievements: Arc<dyn AchievementRepository>,
        connections: Arc<dyn ConnectionRepository>,
        notifications: Arc<dyn NotificationSender>,
        xp_history: Arc<dyn XpHistoryRepository>,
    ) -> Self {
        Self {
            students,
            task_completions,
            daily_progress,
            achievements,
            connections,
            notifications,
            xp_history,
            solvers_index: Mutex::new(SolversIndex::new()),
            activity: Mutex::new(HashMap::new()),
        }
    }

    /// Runs the full task-completion reaction: solver indexing, activity
    /// bookkeeping, milestone awards, the help-received credit, and the
    /// confirmation notification.
    pub async fn handle_task_completed(
        &self,
        event: &TaskCompletedEvent,
        now: DateTime<Utc>,
    ) -> Result<ReactionReport, DomainError> {
        let completion = &event.completion;
        let mut report = ReactionReport::default();

        {
            let mut index = self.solvers_index.lock().await;
            index.insert(completion.task_id.clone(), completion.student_id.clone(), completion.completed_at);
        }

        let student = self
            .students
            .find_by_id(&completion.student_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("student '{}'", completion.student_id)))?;

        report.record("record_activity", self.record_activity(completion, now).await);
        report.record("milestones", self.award_milestones(&student, now).await);

        if let Some(helper_id) = &completion.received_help_from {
            report.record(
                "credit_helper",
                self.credit_helper_for_completion(helper_id, &student.id, now).await,
            );
        }

        report.record(
            "confirmation_notification",
            self.send_confirmation(&student, completion.xp_earned, now).await,
        );

        Ok(report)
    }

    async fn record_activity(&self, completion: &crate::domain::TaskCompletion, now: DateTime<Utc>) -> DomainResult<()> {
        // Idempotent: redelivering the same event hands us the same
        // `completion.id`, which the repository rejects as a conflict. That
        // is the dedup signal, not a pipeline failure.
        match self.task_completions.save(completion).await {
            Ok(()) => {}
            Err(DomainError::Conflict(_)) => {}
            Err(err) => return Err(err),
        }

        {
            let mut aggregates = self.activity.lock().await;
            let aggregate = aggregates
                .entry(completion.student_id.clone())
                .or_insert_with(|| ActivityAggregate::new(completion.student_id.clone()));
            aggregate.record_task_completion(completion.clone());
        }

        let date = completion.completed_at.date_naive();
        let mut progress = self
            .daily_progress
            .for_student_on(&completion.student_id, date)
            .await?
            .unwrap_or_else(|| DailyProgress::new(completion.student_id.clone(), date));
        progress.record_task(completion.xp_earned, completion.received_help_from.is_some());
        self.daily_progress.upsert(&progress).await?;
        let _ = now;
        Ok(())
    }

    /// Awards at most one achievement per threshold crossed, and notifies
    /// the student the first (and only the first) time each one is
    /// recorded — `insert_if_absent` is the dedup point, so redelivering
    /// the same event never produces a second achievement or notification.
    async fn award_milestones(&self, student: &crate::domain::Student, now: DateTime<Utc>) -> DomainResult<()> {
        let count = self.task_completions.count_for_student(&student.id).await?;
        for &milestone in MILESTONES {
            if count != milestone {
                continue;
            }
            let achievement = Achievement::milestone(&student.id, milestone, now);
            let newly_awarded = self.achievements.insert_if_absent(&achievement).await?;
            if newly_awarded && student.preferences.milestones_enabled {
                self.send_notification_unless_quiet(
                    student,
                    now,
                    NotificationPriority::High,
                    "Achievement unlocked",
                    format!("You've completed {milestone} tasks!"),
                )
                .await?;
            }
        }
        Ok(())
    }

    /// A task completed with help from `helper_id`: bumps the helper's
    /// activity totals and help count, records or reinforces the Helper
    /// connection between them, and lets the helper know.
    async fn credit_helper_for_completion(&self, helper_id: &str, receiver_id: &str, now: DateTime<Utc>) -> DomainResult<()> {
        {
            let mut aggregates = self.activity.lock().await;
            let aggregate = aggregates
                .entry(helper_id.to_string())
                .or_insert_with(|| ActivityAggregate::new(helper_id.to_string()));
            aggregate.totals.help_given += 1;
        }

        if let Some(mut helper) = self.students.find_by_id(helper_id).await? {
            helper.help_count += 1;
            self.students.save(&helper).await?;
        }

        let mut connection = self.connections.find_between(helper_id, receiver_id).await?;
        match &mut connection {
            Some(existing) => existing.record_interaction(now),
            None => connection = Some(Connection::new(helper_id, receiver_id, ConnectionType::Helper, None, now)?),
        }
        self.connections.save(&connection.expect("just populated")).await?;

        if let Some(helper) = self.students.find_by_id(helper_id).await? {
            self.send_notification_unless_quiet(
                &helper,
                now,
                NotificationPriority::Normal,
                "You helped someone out",
                format!("{receiver_id} just completed a task with your help."),
            )
            .await?;
        }
        Ok(())
    }

    async fn send_confirmation(
        &self,
        student: &crate::domain::Student,
        xp_earned: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if student.preferences.is_quiet_at(now) {
            return Ok(());
        }
        let mut title = "Task complete".to_string();
        if xp_earned >= CELEBRATION_THRESHOLD {
            title.push_str(" \u{1f525}");
        }
        let notification = Notification::new(
            student.id.clone(),
            NotificationPriority::Normal,
            title,
            format!("You earned {xp_earned} XP."),
        );
        self.notifications.send(notification).await
    }

    /// A help request was answered directly (outside a task-completion
    /// flow): credits the helper's activity and notifies the requester.
    pub async fn handle_help_received(&self, event: &HelpReceivedEvent) -> Result<ReactionReport, DomainError> {
        let mut report = ReactionReport::default();
        {
            let mut aggregates = self.activity.lock().await;
            let aggregate = aggregates
                .entry(event.helper_id.clone())
                .or_insert_with(|| ActivityAggregate::new(event.helper_id.clone()));
            aggregate.totals.help_given += 1;
        }

        if let Some(requester) = self.students.find_by_id(&event.requester_id).await? {
            let sent = self
                .send_notification_unless_quiet(
                    &requester,
                    event.at,
                    NotificationPriority::High,
                    "Your help request was answered",
                    format!("{} is helping you out.", event.helper_id),
                )
                .await;
            report.record("notify_requester", sent);
        } else {
            warn!(student_id = %event.requester_id, "help-received requester not found");
        }
        Ok(report)
    }

    /// Appends an entry to the append-only XP history log. This is the
    /// entire reaction — XP changes don't touch the activity aggregate or
    /// notifications directly, they just get audited.
    pub async fn handle_xp_changed(&self, event: &XpChangedEvent) -> Result<ReactionReport, DomainError> {
        let mut report = ReactionReport::default();
        let entry = XpHistoryEntry::new(
            event.student_id.clone(),
            event.previous_xp,
            event.new_xp,
            event.reason.clone(),
            event.task_id.clone(),
            event.at,
        );
        report.record("append_xp_history", self.xp_history.append(&entry).await);
        Ok(report)
    }

    async fn send_notification_unless_quiet(
        &self,
        student: &crate::domain::Student,
        at: DateTime<Utc>,
        priority: NotificationPriority,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> DomainResult<()> {
        if student.preferences.is_quiet_at(at) {
            return Ok(());
        }
        self.notifications
            .send(Notification::new(student.id.clone(), priority, title, body))
            .await
    }

    /// Starts a fresh session for `student_id`, creating its activity
    /// aggregate on first use.
    pub async fn handle_student_went_online(&self, student_id: &str, at: DateTime<Utc>) -> DomainResult<()> {
        let session = Session::start(student_id, at, at)?;
        let mut aggregates = self.activity.lock().await;
        let aggregate = aggregates
            .entry(student_id.to_string())
            .or_insert_with(|| ActivityAggregate::new(student_id.to_string()));
        aggregate.go_online(session, at)
    }

    pub async fn handle_student_went_offline(&self, student_id: &str, at: DateTime<Utc>) -> DomainResult<()> {
        let mut aggregates = self.activity.lock().await;
        let aggregate = aggregates
            .get_mut(student_id)
            .ok_or_else(|| DomainError::conflict("no activity aggregate for this student"))?;
        aggregate.go_offline(at)
    }

    pub async fn activity_snapshot(&self, student_id: &str) -> Option<ActivityAggregate> {
        self.activity.lock().await.get(student_id).cloned()
    }
}
