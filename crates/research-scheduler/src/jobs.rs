//! Builds a [`JobPayload`] from a [`Project`], denormalizing the fields a
//! worker needs without a second project-store round trip. Shared by the
//! scheduler tick and the reconciler so the two enqueue paths can't drift.

use research_core::model::{JobPayload, Project};

#[must_use]
pub fn research_job(project: &Project, is_run_now: bool) -> JobPayload {
    JobPayload {
        user_id: project.user_id,
        project_id: project.id,
        project_title: project.title.clone(),
        recipient_email: project.recipient_email.clone(),
        next_run_at: project.next_run_at,
        is_run_now,
        is_one_shot: project.this_run_is_one_shot,
    }
}

#[must_use]
pub fn delivery_job(project: &Project, is_run_now: bool) -> JobPayload {
    research_job(project, is_run_now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_core::model::{Frequency, ProjectId, ProjectStatus, SearchParameters, UserId};

    fn sample_project() -> Project {
        Project {
            id: ProjectId::new(),
            user_id: UserId::new(),
            title: "AI trends".into(),
            description: "Weekly AI trend digest".into(),
            frequency: Frequency::Weekly,
            delivery_time: "09:00".into(),
            timezone: "UTC".into(),
            day_of_week: Some(1),
            day_of_month: None,
            status: ProjectStatus::Active,
            recipient_email: "reader@example.com".into(),
            search_parameters: SearchParameters::default(),
            next_run_at: None,
            last_run_at: None,
            research_started_at: None,
            prepared_delivery_log_id: None,
            prepared_at: None,
            delivered_at: None,
            last_error: None,
            this_run_is_one_shot: true,
        }
    }

    #[test]
    fn research_job_carries_recipient_email_and_title() {
        let project = sample_project();
        let job = research_job(&project, true);
        assert_eq!(job.recipient_email, project.recipient_email);
        assert_eq!(job.project_title, project.title);
        assert!(job.is_run_now);
        assert!(job.is_one_shot);
    }

    #[test]
    fn delivery_job_mirrors_research_job_mapping() {
        let project = sample_project();
        assert_eq!(delivery_job(&project, false), research_job(&project, false));
    }
}
