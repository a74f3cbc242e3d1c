use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use futures_util::StreamExt;
use moka::future::Cache;
use sqlx::{FromRow, MySqlPool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{AccountStore, NewPresence, PresenceChanges, PresenceStore, StoreError, StoreResult};
use crate::model::account::{AdminAccount, AgentAccount};
use crate::model::presence::{AgentSummary, PresenceRecord, PresenceStatus, PresenceWithAgent};

const PRESENCE_COLUMNS: &str = "p.id, p.agent_id, p.date, p.status, p.arrival_time, \
     p.departure_time, p.reason, p.created_at, p.updated_at";

#[derive(FromRow)]
struct PresenceRow {
    id: u64,
    agent_id: u64,
    date: NaiveDate,
    status: String,
    arrival_time: Option<NaiveTime>,
    departure_time: Option<NaiveTime>,
    reason: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl From<PresenceRow> for PresenceRecord {
    fn from(row: PresenceRow) -> Self {
        let status = PresenceStatus::from_str(&row.status).unwrap_or_else(|_| {
            warn!(presence_id = row.id, status = %row.status, "Unknown presence status");
            PresenceStatus::default()
        });

        PresenceRecord {
            id: row.id,
            agent_id: row.agent_id,
            date: row.date,
            status,
            arrival_time: row.arrival_time,
            departure_time: row.departure_time,
            reason: row.reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct PresenceAgentRow {
    #[sqlx(flatten)]
    presence: PresenceRow,
    a_id: Option<u64>,
    a_immatricule: Option<String>,
    a_nom: Option<String>,
    a_prenom: Option<String>,
    a_email: Option<String>,
}

impl From<PresenceAgentRow> for PresenceWithAgent {
    fn from(row: PresenceAgentRow) -> Self {
        let agent = match (row.a_id, row.a_immatricule, row.a_nom) {
            (Some(id), Some(immatricule), Some(nom)) => Some(AgentSummary {
                id,
                immatricule,
                nom,
                prenom: row.a_prenom,
                email: row.a_email,
            }),
            _ => None,
        };

        PresenceWithAgent {
            presence: row.presence.into(),
            agent,
        }
    }
}

/// Bindable value of a dynamic UPDATE.
#[derive(Debug, PartialEq)]
enum SqlValue {
    String(String),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    U64(u64),
    Null,
}

#[derive(Debug)]
struct SqlUpdate {
    sql: String,
    values: Vec<SqlValue>,
}

/// `UPDATE presences SET ... WHERE id = ?` covering only the supplied fields.
fn build_update_sql(changes: &PresenceChanges, id: u64, at: NaiveDateTime) -> SqlUpdate {
    let mut columns = Vec::new();
    let mut values = Vec::new();

    if let Some(status) = changes.status {
        columns.push("status = ?");
        values.push(SqlValue::String(status.as_ref().to_string()));
    }
    if let Some(arrival) = changes.arrival_time {
        columns.push("arrival_time = ?");
        values.push(arrival.map_or(SqlValue::Null, SqlValue::Time));
    }
    if let Some(departure) = changes.departure_time {
        columns.push("departure_time = ?");
        values.push(departure.map_or(SqlValue::Null, SqlValue::Time));
    }
    if let Some(reason) = &changes.reason {
        columns.push("reason = ?");
        values.push(reason.clone().map_or(SqlValue::Null, SqlValue::String));
    }

    columns.push("updated_at = ?");
    values.push(SqlValue::DateTime(at));
    values.push(SqlValue::U64(id));

    SqlUpdate {
        sql: format!("UPDATE presences SET {} WHERE id = ?", columns.join(", ")),
        values,
    }
}

pub struct MySqlStore {
    pool: MySqlPool,
    /// Agent ids already confirmed to exist in the roster.
    known_agents: Cache<u64, ()>,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            known_agents: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(Duration::from_secs(86400)) // 24h TTL
                .build(),
        }
    }

    /// Preloads the ids of agents who recorded a presence recently.
    pub async fn warmup_agent_cache(&self, days: u32, batch_size: usize) -> Result<()> {
        let mut stream = sqlx::query_as::<_, (u64,)>(
            r#"
            SELECT DISTINCT agent_id
            FROM presences
            WHERE date >= CURDATE() - INTERVAL ? DAY
            "#,
        )
        .bind(days)
        .fetch(&self.pool);

        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = stream.next().await {
            let (agent_id,) = row?;
            batch.push(agent_id);
            total += 1;

            if batch.len() >= batch_size {
                self.mark_known(&batch).await;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.mark_known(&batch).await;
        }

        info!(total, days, "Agent cache warmup complete");
        Ok(())
    }

    async fn mark_known(&self, agent_ids: &[u64]) {
        let inserts: Vec<_> = agent_ids
            .iter()
            .map(|id| self.known_agents.insert(*id, ()))
            .collect();
        futures::future::join_all(inserts).await;
    }
}

#[async_trait]
impl PresenceStore for MySqlStore {
    async fn find_for_day(
        &self,
        agent_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<PresenceRecord>> {
        let sql = format!("SELECT {PRESENCE_COLUMNS} FROM presences p WHERE p.agent_id = ? AND p.date = ?");
        let row = sqlx::query_as::<_, PresenceRow>(&sql)
            .bind(agent_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn get(&self, id: u64) -> StoreResult<Option<PresenceRecord>> {
        let sql = format!("SELECT {PRESENCE_COLUMNS} FROM presences p WHERE p.id = ?");
        let row = sqlx::query_as::<_, PresenceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn insert(&self, presence: NewPresence) -> StoreResult<PresenceRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO presences
                (agent_id, date, status, arrival_time, departure_time, reason, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(presence.agent_id)
        .bind(presence.date)
        .bind(presence.status.as_ref())
        .bind(presence.arrival_time)
        .bind(presence.departure_time)
        .bind(&presence.reason)
        .bind(presence.at)
        .bind(presence.at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from);

        if let Err(StoreError::UnknownAgent) = &result {
            // roster row removed while its id was still cached
            self.known_agents.invalidate(&presence.agent_id).await;
            warn!(agent_id = presence.agent_id, "Insert for agent missing from roster");
        }
        let result = result?;

        let id = result.last_insert_id();
        debug!(presence_id = id, agent_id = presence.agent_id, "Presence inserted");

        Ok(PresenceRecord {
            id,
            agent_id: presence.agent_id,
            date: presence.date,
            status: presence.status,
            arrival_time: presence.arrival_time,
            departure_time: presence.departure_time,
            reason: presence.reason,
            created_at: presence.at,
            updated_at: presence.at,
        })
    }

    async fn close(
        &self,
        id: u64,
        departure: NaiveTime,
        at: NaiveDateTime,
    ) -> StoreResult<Option<PresenceRecord>> {
        let result = sqlx::query(
            r#"
            UPDATE presences
            SET departure_time = ?, updated_at = ?
            WHERE id = ?
            AND departure_time IS NULL
            "#,
        )
        .bind(departure)
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    async fn update(
        &self,
        id: u64,
        changes: &PresenceChanges,
        at: NaiveDateTime,
    ) -> StoreResult<Option<PresenceRecord>> {
        let update = build_update_sql(changes, id, at);
        debug!(sql = %update.sql, values = ?update.values, "Updating presence");

        let mut query = sqlx::query(&update.sql);
        for value in update.values {
            query = match value {
                SqlValue::String(v) => query.bind(v),
                SqlValue::Time(v) => query.bind(v),
                SqlValue::DateTime(v) => query.bind(v),
                SqlValue::U64(v) => query.bind(v),
                SqlValue::Null => query.bind(None::<String>),
            };
        }
        query.execute(&self.pool).await?;

        // rows_affected is 0 for unchanged rows too, so re-read
        self.get(id).await
    }

    async fn delete(&self, id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM presences WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_for_agent(&self, agent_id: u64) -> StoreResult<Vec<PresenceRecord>> {
        let sql = format!(
            "SELECT {PRESENCE_COLUMNS} FROM presences p WHERE p.agent_id = ? ORDER BY p.date DESC, p.id DESC"
        );
        let rows = sqlx::query_as::<_, PresenceRow>(&sql)
            .bind(agent_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_all(&self) -> StoreResult<Vec<PresenceWithAgent>> {
        let sql = format!(
            r#"
            SELECT {PRESENCE_COLUMNS},
                a.id AS a_id,
                a.immatricule AS a_immatricule,
                a.nom AS a_nom,
                a.prenom AS a_prenom,
                a.email AS a_email
            FROM presences p
            LEFT JOIN agents_nouveau a ON a.id = p.agent_id
            ORDER BY p.date DESC, p.id DESC
            "#
        );
        let rows = sqlx::query_as::<_, PresenceAgentRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl AccountStore for MySqlStore {
    async fn agent_exists(&self, agent_id: u64) -> StoreResult<bool> {
        if self.known_agents.get(&agent_id).await.is_some() {
            return Ok(true);
        }

        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM agents_nouveau WHERE id = ? LIMIT 1)",
        )
        .bind(agent_id)
        .fetch_one(&self.pool)
        .await?
            != 0;

        if exists {
            self.known_agents.insert(agent_id, ()).await;
        }
        Ok(exists)
    }

    async fn find_admin_by_email(&self, email: &str) -> StoreResult<Option<AdminAccount>> {
        Ok(sqlx::query_as::<_, AdminAccount>(
            "SELECT id, nom, email, password FROM admins WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_agent_by_email(&self, email: &str) -> StoreResult<Option<AgentAccount>> {
        Ok(sqlx::query_as::<_, AgentAccount>(
            "SELECT id, immatricule, nom, prenom, email, mot_de_passe FROM agents_nouveau WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_admin(&self, id: u64) -> StoreResult<Option<AdminAccount>> {
        Ok(sqlx::query_as::<_, AdminAccount>(
            "SELECT id, nom, email, password FROM admins WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_agent(&self, id: u64) -> StoreResult<Option<AgentAccount>> {
        Ok(sqlx::query_as::<_, AgentAccount>(
            "SELECT id, immatricule, nom, prenom, email, mot_de_passe FROM agents_nouveau WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }
}
