use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::{ensure_transition, ApplicationStore, StoreError};
use crate::workflows::intake::domain::{
    ApplicationFields, ApplicationId, ApplicationRecord, ApplicationStatus, EmploymentPeriod,
    PriorEmployment, RecentApplication, RegistrationChoice, SelfEmployment, StatusAndOwner,
    Submitter, Transport, UserId,
};

/// Embedded schema, executed on every open.
pub(crate) const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS applications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    username TEXT,
    full_name TEXT NOT NULL,
    citizenship TEXT NOT NULL,
    prior_employment TEXT NOT NULL,
    employment_period TEXT,
    phone TEXT NOT NULL,
    city TEXT NOT NULL,
    age INTEGER NOT NULL CHECK(age BETWEEN 14 AND 100),
    self_employed TEXT NOT NULL,
    self_employed_choice TEXT,
    transport TEXT NOT NULL,
    created_at TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'new' CHECK(status IN ('new', 'approved', 'rejected'))
);

CREATE INDEX IF NOT EXISTS idx_applications_status ON applications(status, created_at);
";

const MAX_CONNECTIONS: u32 = 5;

const SELECT_RECORD: &str = "SELECT id, user_id, username, full_name, citizenship, prior_employment, \
     employment_period, phone, city, age, self_employed, self_employed_choice, transport, \
     created_at, status FROM applications WHERE id = ?";

/// SQLite-backed store. Status changes are single conditional `UPDATE`s.
#[derive(Debug, Clone)]
pub struct SqliteApplicationStore {
    pool: SqlitePool,
}

impl SqliteApplicationStore {
    /// Open (creating if needed) the database at `url` and apply the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .min_connections(1)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    /// Private in-memory database on a single pinned connection.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        debug!("applications schema ready");
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub(crate) fn max_connections(&self) -> u32 {
        self.pool.options().get_max_connections()
    }
}

#[async_trait]
impl ApplicationStore for SqliteApplicationStore {
    async fn create(
        &self,
        fields: ApplicationFields,
        submitter: Submitter,
    ) -> Result<ApplicationId, StoreError> {
        fields.ensure_complete()?;
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        let result = sqlx::query(
            "INSERT INTO applications (user_id, username, full_name, citizenship, \
             prior_employment, employment_period, phone, city, age, self_employed, \
             self_employed_choice, transport, created_at, status) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(submitter.user_id.0)
        .bind(submitter.username)
        .bind(fields.full_name)
        .bind(fields.citizenship)
        .bind(fields.prior_employment.label())
        .bind(fields.employment_period.map(EmploymentPeriod::label))
        .bind(fields.phone)
        .bind(fields.city)
        .bind(i64::from(fields.age))
        .bind(fields.self_employment.label())
        .bind(fields.registration.map(RegistrationChoice::label))
        .bind(fields.transport.label())
        .bind(created_at)
        .bind(ApplicationStatus::New.label())
        .execute(&self.pool)
        .await?;

        Ok(ApplicationId(result.last_insert_rowid()))
    }

    async fn status_and_owner(&self, id: ApplicationId) -> Result<StatusAndOwner, StoreError> {
        let row = sqlx::query("SELECT status, user_id, full_name FROM applications WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;

        Ok(StatusAndOwner {
            status: parse_status(row.try_get("status")?)?,
            submitter_id: UserId(row.try_get("user_id")?),
            full_name: row.try_get("full_name")?,
        })
    }

    async fn transition(
        &self,
        id: ApplicationId,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> Result<bool, StoreError> {
        ensure_transition(from, to)?;
        let result = sqlx::query("UPDATE applications SET status = ? WHERE id = ? AND status = ?")
            .bind(to.label())
            .bind(id.0)
            .bind(from.label())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn counts_by_status(&self) -> Result<BTreeMap<ApplicationStatus, u64>, StoreError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS total FROM applications GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let status = parse_status(row.try_get("status")?)?;
                let total: i64 = row.try_get("total")?;
                Ok((status, u64::try_from(total).unwrap_or_default()))
            })
            .collect()
    }

    async fn recent_new(&self, limit: usize) -> Result<Vec<RecentApplication>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, created_at, city FROM applications WHERE status = ? \
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(ApplicationStatus::New.label())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(RecentApplication {
                    id: ApplicationId(row.try_get("id")?),
                    created_at: parse_timestamp(row.try_get("created_at")?)?,
                    city: row.try_get("city")?,
                })
            })
            .collect()
    }

    async fn fetch(&self, id: ApplicationId) -> Result<Option<ApplicationRecord>, StoreError> {
        let row = sqlx::query(SELECT_RECORD)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }
}

fn record_from_row(row: &SqliteRow) -> Result<ApplicationRecord, StoreError> {
    let age: i64 = row.try_get("age")?;
    let fields = ApplicationFields {
        full_name: row.try_get("full_name")?,
        citizenship: row.try_get("citizenship")?,
        prior_employment: parse_label(row.try_get("prior_employment")?, PriorEmployment::from_label)?,
        employment_period: optional_label(
            row.try_get("employment_period")?,
            EmploymentPeriod::from_label,
        )?,
        phone: row.try_get("phone")?,
        city: row.try_get("city")?,
        age: u8::try_from(age).map_err(|_| StoreError::Corrupt(format!("age {age}")))?,
        self_employment: parse_label(row.try_get("self_employed")?, SelfEmployment::from_label)?,
        registration: optional_label(
            row.try_get("self_employed_choice")?,
            RegistrationChoice::from_label,
        )?,
        transport: parse_label(row.try_get("transport")?, Transport::from_label)?,
    };

    Ok(ApplicationRecord {
        id: ApplicationId(row.try_get("id")?),
        submitter: Submitter::new(UserId(row.try_get("user_id")?), row.try_get("username")?),
        fields,
        status: parse_status(row.try_get("status")?)?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
    })
}

fn parse_status(raw: String) -> Result<ApplicationStatus, StoreError> {
    ApplicationStatus::from_label(&raw).ok_or(StoreError::Corrupt(format!("status {raw}")))
}

fn parse_timestamp(raw: String) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt(format!("created_at {raw}")))
}

fn parse_label<T>(raw: String, parse: fn(&str) -> Option<T>) -> Result<T, StoreError> {
    parse(&raw).ok_or(StoreError::Corrupt(format!("label {raw}")))
}

fn optional_label<T>(
    raw: Option<String>,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>, StoreError> {
    raw.map(|value| parse_label(value, parse)).transpose()
}
