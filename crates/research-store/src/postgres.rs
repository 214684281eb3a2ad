//! `PostgresProjectStore`: the sole production `ProjectStore`, grounded
//! directly on `dashflow-postgres-checkpointer`'s identifier validation,
//! parameterized-query, and schema-init patterns applied to the Project /
//! DeliveryLog schema instead of a checkpoint schema.

use async_trait::async_trait;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info};

use research_core::model::{
    DeliveryLog, DeliveryLogId, DeliveryStats, DeliveryStatus, EpochMillis, Frequency, Project,
    ProjectId, ProjectStatus, SearchParameters, UserId,
};

use crate::error::StoreError;
use crate::provider::{ProjectStore, Result};

const DEFAULT_PROJECTS_TABLE: &str = "research_projects";
const DEFAULT_DELIVERY_LOGS_TABLE: &str = "research_delivery_logs";

/// PostgreSQL identifiers: start with a letter or underscore, then letters,
/// digits, or underscores, at most 63 bytes. Reused verbatim from the
/// checkpointer's validation — SQL injection defenses don't vary by domain.
fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StoreError::InvalidIdentifier(
            "identifier cannot be empty".to_string(),
        ));
    }
    if name.len() > 63 {
        return Err(StoreError::InvalidIdentifier(format!(
            "identifier '{name}' exceeds maximum length of 63 characters"
        )));
    }
    let mut chars = name.chars();
    let first = chars.next().expect("checked non-empty above");
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(StoreError::InvalidIdentifier(format!(
            "identifier '{name}' must start with a letter or underscore"
        )));
    }
    for c in chars {
        if !c.is_ascii_alphanumeric() && c != '_' {
            return Err(StoreError::InvalidIdentifier(format!(
                "identifier '{name}' contains invalid character '{c}'"
            )));
        }
    }
    Ok(())
}

pub struct PostgresProjectStore {
    client: Client,
    projects_table: String,
    delivery_logs_table: String,
}

impl PostgresProjectStore {
    pub async fn new(connection_string: &str) -> Result<Self> {
        Self::with_table_names(
            connection_string,
            DEFAULT_PROJECTS_TABLE,
            DEFAULT_DELIVERY_LOGS_TABLE,
        )
        .await
    }

    pub async fn with_table_names(
        connection_string: &str,
        projects_table: &str,
        delivery_logs_table: &str,
    ) -> Result<Self> {
        validate_identifier(projects_table)?;
        validate_identifier(delivery_logs_table)?;

        info!("connecting to postgres project store");
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
            .await
            .map_err(StoreError::Postgres)?;

        tokio::spawn(async move {
            if let Err(err) = connection.await {
                error!("postgres connection error: {err}");
            }
        });

        let store = Self {
            client,
            projects_table: projects_table.to_string(),
            delivery_logs_table: delivery_logs_table.to_string(),
        };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        let sql = format!(
            r"
            CREATE TABLE IF NOT EXISTS {projects} (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                frequency TEXT NOT NULL,
                delivery_time TEXT NOT NULL,
                timezone TEXT NOT NULL,
                day_of_week SMALLINT,
                day_of_month SMALLINT,
                status TEXT NOT NULL,
                recipient_email TEXT NOT NULL,
                search_parameters JSONB NOT NULL,
                next_run_at BIGINT,
                last_run_at BIGINT,
                research_started_at BIGINT,
                prepared_delivery_log_id UUID,
                prepared_at BIGINT,
                delivered_at BIGINT,
                last_error TEXT,
                this_run_is_one_shot BOOLEAN NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{projects}_user_id ON {projects} (user_id);
            CREATE INDEX IF NOT EXISTS idx_{projects}_status ON {projects} (status);
            CREATE INDEX IF NOT EXISTS idx_{projects}_next_run_at ON {projects} (next_run_at);

            CREATE TABLE IF NOT EXISTS {logs} (
                id UUID PRIMARY KEY,
                project_id UUID NOT NULL,
                status TEXT NOT NULL,
                report_title TEXT NOT NULL,
                report_markdown TEXT NOT NULL,
                report_summary TEXT NOT NULL,
                delivered_at BIGINT,
                retry_count INTEGER NOT NULL,
                stats JSONB NOT NULL,
                error TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_{logs}_project_id ON {logs} (project_id);
            ",
            projects = self.projects_table,
            logs = self.delivery_logs_table,
        );

        self.client.batch_execute(&sql).await.map_err(|err| {
            error!("failed to initialize project store schema: {err}");
            StoreError::Postgres(err)
        })?;
        debug!(
            "project store schema initialized: projects={}, delivery_logs={}",
            self.projects_table, self.delivery_logs_table
        );
        Ok(())
    }

    fn deserialize_project(row: &Row) -> Result<Project> {
        let search_parameters_json: serde_json::Value = row.get("search_parameters");
        Ok(Project {
            id: ProjectId(row.get("id")),
            user_id: UserId(row.get("user_id")),
            title: row.get("title"),
            description: row.get("description"),
            frequency: frequency_from_str(row.get("frequency"))?,
            delivery_time: row.get("delivery_time"),
            timezone: row.get("timezone"),
            day_of_week: row.get::<_, Option<i16>>("day_of_week").map(|v| v as u8),
            day_of_month: row.get::<_, Option<i16>>("day_of_month").map(|v| v as u8),
            status: status_from_str(row.get("status"))?,
            recipient_email: row.get("recipient_email"),
            search_parameters: serde_json::from_value::<SearchParameters>(search_parameters_json)
                .map_err(StoreError::Json)?,
            next_run_at: row.get::<_, Option<i64>>("next_run_at").map(EpochMillis),
            last_run_at: row.get::<_, Option<i64>>("last_run_at").map(EpochMillis),
            research_started_at: row
                .get::<_, Option<i64>>("research_started_at")
                .map(EpochMillis),
            prepared_delivery_log_id: row
                .get::<_, Option<uuid::Uuid>>("prepared_delivery_log_id")
                .map(DeliveryLogId),
            prepared_at: row.get::<_, Option<i64>>("prepared_at").map(EpochMillis),
            delivered_at: row.get::<_, Option<i64>>("delivered_at").map(EpochMillis),
            last_error: row.get("last_error"),
            this_run_is_one_shot: row.get("this_run_is_one_shot"),
        })
    }

    fn deserialize_delivery_log(row: &Row) -> Result<DeliveryLog> {
        let stats_json: serde_json::Value = row.get("stats");
        Ok(DeliveryLog {
            id: DeliveryLogId(row.get("id")),
            project_id: ProjectId(row.get("project_id")),
            status: delivery_status_from_str(row.get("status"))?,
            report_title: row.get("report_title"),
            report_markdown: row.get("report_markdown"),
            report_summary: row.get("report_summary"),
            delivered_at: row.get::<_, Option<i64>>("delivered_at").map(EpochMillis),
            retry_count: row.get::<_, i32>("retry_count") as u32,
            stats: serde_json::from_value::<DeliveryStats>(stats_json).map_err(StoreError::Json)?,
            error: row.get("error"),
        })
    }

    async fn select_projects(&self, where_clause: &str, params: &[&(dyn tokio_postgres::types::ToSql + Sync)]) -> Result<Vec<Project>> {
        let sql = format!(
            "SELECT id, user_id, title, description, frequency, delivery_time, timezone,
                    day_of_week, day_of_month, status, recipient_email, search_parameters, next_run_at,
                    last_run_at, research_started_at, prepared_delivery_log_id, prepared_at,
                    delivered_at, last_error, this_run_is_one_shot
             FROM {} WHERE {where_clause}",
            self.projects_table
        );
        let rows = self.client.query(&sql, params).await.map_err(StoreError::Postgres)?;
        rows.iter().map(Self::deserialize_project).collect()
    }
}

fn frequency_from_str(s: &str) -> Result<Frequency> {
    match s {
        "daily" => Ok(Frequency::Daily),
        "weekly" => Ok(Frequency::Weekly),
        "monthly" => Ok(Frequency::Monthly),
        "once" => Ok(Frequency::Once),
        other => Err(StoreError::Configuration(format!(
            "unrecognized frequency column value '{other}'"
        ))),
    }
}

fn frequency_to_str(f: Frequency) -> &'static str {
    match f {
        Frequency::Daily => "daily",
        Frequency::Weekly => "weekly",
        Frequency::Monthly => "monthly",
        Frequency::Once => "once",
    }
}

fn status_from_str(s: &str) -> Result<ProjectStatus> {
    match s {
        "active" => Ok(ProjectStatus::Active),
        "paused" => Ok(ProjectStatus::Paused),
        "running" => Ok(ProjectStatus::Running),
        "error" => Ok(ProjectStatus::Error),
        "deleted" => Ok(ProjectStatus::Deleted),
        other => Err(StoreError::Configuration(format!(
            "unrecognized status column value '{other}'"
        ))),
    }
}

fn status_to_str(s: ProjectStatus) -> &'static str {
    match s {
        ProjectStatus::Active => "active",
        ProjectStatus::Paused => "paused",
        ProjectStatus::Running => "running",
        ProjectStatus::Error => "error",
        ProjectStatus::Deleted => "deleted",
    }
}

fn delivery_status_from_str(s: &str) -> Result<DeliveryStatus> {
    match s {
        "pending" => Ok(DeliveryStatus::Pending),
        "success" => Ok(DeliveryStatus::Success),
        "failed" => Ok(DeliveryStatus::Failed),
        "partial" => Ok(DeliveryStatus::Partial),
        other => Err(StoreError::Configuration(format!(
            "unrecognized delivery log status column value '{other}'"
        ))),
    }
}

fn delivery_status_to_str(s: DeliveryStatus) -> &'static str {
    match s {
        DeliveryStatus::Pending => "pending",
        DeliveryStatus::Success => "success",
        DeliveryStatus::Failed => "failed",
        DeliveryStatus::Partial => "partial",
    }
}

#[async_trait]
impl ProjectStore for PostgresProjectStore {
    async fn get_project(&self, user_id: UserId, project_id: ProjectId) -> Result<Option<Project>> {
        let sql = format!(
            "SELECT id, user_id, title, description, frequency, delivery_time, timezone,
                    day_of_week, day_of_month, status, recipient_email, search_parameters, next_run_at,
                    last_run_at, research_started_at, prepared_delivery_log_id, prepared_at,
                    delivered_at, last_error, this_run_is_one_shot
             FROM {} WHERE id = $1 AND user_id = $2",
            self.projects_table
        );
        let rows = self
            .client
            .query(&sql, &[&project_id.0, &user_id.0])
            .await
            .map_err(StoreError::Postgres)?;
        rows.first().map(Self::deserialize_project).transpose()
    }

    async fn put_project(&self, project: &Project) -> Result<()> {
        let search_parameters =
            serde_json::to_value(&project.search_parameters).map_err(StoreError::Json)?;
        let sql = format!(
            "INSERT INTO {} (
                id, user_id, title, description, frequency, delivery_time, timezone,
                day_of_week, day_of_month, status, recipient_email, search_parameters, next_run_at,
                last_run_at, research_started_at, prepared_delivery_log_id, prepared_at,
                delivered_at, last_error, this_run_is_one_shot
             ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20)
             ON CONFLICT (id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                frequency = EXCLUDED.frequency,
                delivery_time = EXCLUDED.delivery_time,
                timezone = EXCLUDED.timezone,
                day_of_week = EXCLUDED.day_of_week,
                day_of_month = EXCLUDED.day_of_month,
                status = EXCLUDED.status,
                recipient_email = EXCLUDED.recipient_email,
                search_parameters = EXCLUDED.search_parameters,
                next_run_at = EXCLUDED.next_run_at,
                last_run_at = EXCLUDED.last_run_at,
                research_started_at = EXCLUDED.research_started_at,
                prepared_delivery_log_id = EXCLUDED.prepared_delivery_log_id,
                prepared_at = EXCLUDED.prepared_at,
                delivered_at = EXCLUDED.delivered_at,
                last_error = EXCLUDED.last_error,
                this_run_is_one_shot = EXCLUDED.this_run_is_one_shot",
            self.projects_table
        );
        self.client
            .execute(
                &sql,
                &[
                    &project.id.0,
                    &project.user_id.0,
                    &project.title,
                    &project.description,
                    &frequency_to_str(project.frequency),
                    &project.delivery_time,
                    &project.timezone,
                    &project.day_of_week.map(|v| v as i16),
                    &project.day_of_month.map(|v| v as i16),
                    &status_to_str(project.status),
                    &project.recipient_email,
                    &search_parameters,
                    &project.next_run_at.map(|v| v.0),
                    &project.last_run_at.map(|v| v.0),
                    &project.research_started_at.map(|v| v.0),
                    &project.prepared_delivery_log_id.map(|v| v.0),
                    &project.prepared_at.map(|v| v.0),
                    &project.delivered_at.map(|v| v.0),
                    &project.last_error,
                    &project.this_run_is_one_shot,
                ],
            )
            .await
            .map_err(StoreError::Postgres)?;
        Ok(())
    }

    async fn get_delivery_log(&self, id: DeliveryLogId) -> Result<Option<DeliveryLog>> {
        let sql = format!(
            "SELECT id, project_id, status, report_title, report_markdown, report_summary,
                    delivered_at, retry_count, stats, error
             FROM {} WHERE id = $1",
            self.delivery_logs_table
        );
        let rows = self
            .client
            .query(&sql, &[&id.0])
            .await
            .map_err(StoreError::Postgres)?;
        rows.first().map(Self::deserialize_delivery_log).transpose()
    }

    async fn put_delivery_log(&self, log: &DeliveryLog) -> Result<()> {
        let stats = serde_json::to_value(&log.stats).map_err(StoreError::Json)?;
        let sql = format!(
            "INSERT INTO {} (
                id, project_id, status, report_title, report_markdown, report_summary,
                delivered_at, retry_count, stats, error
             ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
             ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                report_title = EXCLUDED.report_title,
                report_markdown = EXCLUDED.report_markdown,
                report_summary = EXCLUDED.report_summary,
                delivered_at = EXCLUDED.delivered_at,
                retry_count = EXCLUDED.retry_count,
                stats = EXCLUDED.stats,
                error = EXCLUDED.error",
            self.delivery_logs_table
        );
        self.client
            .execute(
                &sql,
                &[
                    &log.id.0,
                    &log.project_id.0,
                    &delivery_status_to_str(log.status),
                    &log.report_title,
                    &log.report_markdown,
                    &log.report_summary,
                    &log.delivered_at.map(|v| v.0),
                    &(log.retry_count as i32),
                    &stats,
                    &log.error,
                ],
            )
            .await
            .map_err(StoreError::Postgres)?;
        Ok(())
    }

    async fn pre_run_set(&self, now: EpochMillis, window: EpochMillis) -> Result<Vec<Project>> {
        let horizon = now.0.saturating_add(window.0);
        self.select_projects(
            "status IN ('active','error') AND prepared_delivery_log_id IS NULL \
             AND next_run_at > $1 AND next_run_at <= $2",
            &[&now.0, &horizon],
        )
        .await
    }

    async fn retry_set(&self, now: EpochMillis) -> Result<Vec<Project>> {
        self.select_projects(
            "status IN ('active','error') AND prepared_delivery_log_id IS NULL \
             AND next_run_at <= $1",
            &[&now.0],
        )
        .await
    }

    async fn due_delivery_set(&self, now: EpochMillis) -> Result<Vec<Project>> {
        self.select_projects(
            "prepared_delivery_log_id IS NOT NULL AND next_run_at <= $1",
            &[&now.0],
        )
        .await
    }

    async fn needs_research_set(&self) -> Result<Vec<Project>> {
        self.select_projects(
            "status IN ('active','error') AND prepared_delivery_log_id IS NULL",
            &[],
        )
        .await
    }

    async fn stuck_running_set(&self, now: EpochMillis, stuck_threshold_ms: i64) -> Result<Vec<Project>> {
        let cutoff = now.0.saturating_sub(stuck_threshold_ms);
        self.select_projects(
            "status = 'running' AND research_started_at IS NOT NULL AND research_started_at < $1",
            &[&cutoff],
        )
        .await
    }

    async fn needs_delivery_set(&self) -> Result<Vec<Project>> {
        self.select_projects(
            "prepared_delivery_log_id IS NOT NULL AND status <> 'deleted'",
            &[],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_identifier_rejects_sql_injection_attempt() {
        assert!(validate_identifier("projects; DROP TABLE users;--").is_err());
    }

    #[test]
    fn validate_identifier_accepts_underscored_name() {
        assert!(validate_identifier("research_projects_v2").is_ok());
    }

    #[test]
    fn validate_identifier_rejects_empty() {
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn frequency_round_trips_through_str() {
        for f in [Frequency::Daily, Frequency::Weekly, Frequency::Monthly, Frequency::Once] {
            assert_eq!(frequency_from_str(frequency_to_str(f)).unwrap(), f);
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            ProjectStatus::Active,
            ProjectStatus::Paused,
            ProjectStatus::Running,
            ProjectStatus::Error,
            ProjectStatus::Deleted,
        ] {
            assert_eq!(status_from_str(status_to_str(s)).unwrap(), s);
        }
    }

    #[test]
    fn unrecognized_status_value_is_a_configuration_error() {
        assert!(matches!(
            status_from_str("bogus"),
            Err(StoreError::Configuration(_))
        ));
    }
}
