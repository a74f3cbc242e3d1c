//! Persistence seam for presences and the account directory.
//!
//! Handlers only see the traits; `MySqlStore` backs production and
//! `MemoryStore` backs tests and local runs.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use derive_more::Display;

use crate::model::account::{AdminAccount, AgentAccount};
use crate::model::presence::{PresenceRecord, PresenceStatus, PresenceWithAgent};

pub mod memory;
pub mod mysql;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

#[derive(Debug, Display)]
pub enum StoreError {
    /// Unique (agent, date) violated.
    #[display(fmt = "duplicate presence")]
    Duplicate,

    /// The referenced agent is missing from the roster.
    #[display(fmt = "unknown agent")]
    UnknownAgent,

    #[display(fmt = "{}", _0)]
    Database(sqlx::Error),
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // SQLSTATE 23000 also covers foreign keys; only duplicates count
            if db_err.is_unique_violation() {
                return StoreError::Duplicate;
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::UnknownAgent;
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct NewPresence {
    pub agent_id: u64,
    pub date: NaiveDate,
    pub status: PresenceStatus,
    pub arrival_time: Option<NaiveTime>,
    pub departure_time: Option<NaiveTime>,
    pub reason: Option<String>,
    pub at: NaiveDateTime,
}

/// Field-level overwrite; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct PresenceChanges {
    pub status: Option<PresenceStatus>,
    pub arrival_time: Option<Option<NaiveTime>>,
    pub departure_time: Option<Option<NaiveTime>>,
    pub reason: Option<Option<String>>,
}

impl PresenceChanges {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.arrival_time.is_none()
            && self.departure_time.is_none()
            && self.reason.is_none()
    }

    pub fn apply_to(&self, record: &mut PresenceRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(arrival) = self.arrival_time {
            record.arrival_time = arrival;
        }
        if let Some(departure) = self.departure_time {
            record.departure_time = departure;
        }
        if let Some(reason) = &self.reason {
            record.reason = reason.clone();
        }
    }
}

#[async_trait]
pub trait PresenceStore: Send + Sync {
    async fn find_for_day(&self, agent_id: u64, date: NaiveDate)
    -> StoreResult<Option<PresenceRecord>>;

    async fn get(&self, id: u64) -> StoreResult<Option<PresenceRecord>>;

    /// Fails with [`StoreError::Duplicate`] when the agent already has a
    /// record for that date and with [`StoreError::UnknownAgent`] when the
    /// agent is not in the roster.
    async fn insert(&self, presence: NewPresence) -> StoreResult<PresenceRecord>;

    /// Sets the departure only while it is still empty. `None` means the
    /// record is gone or was closed concurrently.
    async fn close(
        &self,
        id: u64,
        departure: NaiveTime,
        at: NaiveDateTime,
    ) -> StoreResult<Option<PresenceRecord>>;

    async fn update(
        &self,
        id: u64,
        changes: &PresenceChanges,
        at: NaiveDateTime,
    ) -> StoreResult<Option<PresenceRecord>>;

    /// Returns false when nothing was deleted.
    async fn delete(&self, id: u64) -> StoreResult<bool>;

    /// Records of one agent, most recent date first.
    async fn list_for_agent(&self, agent_id: u64) -> StoreResult<Vec<PresenceRecord>>;

    /// Every record with its agent, most recent date first.
    async fn list_all(&self) -> StoreResult<Vec<PresenceWithAgent>>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn agent_exists(&self, agent_id: u64) -> StoreResult<bool>;

    async fn find_admin_by_email(&self, email: &str) -> StoreResult<Option<AdminAccount>>;

    async fn find_agent_by_email(&self, email: &str) -> StoreResult<Option<AgentAccount>>;

    async fn find_admin(&self, id: u64) -> StoreResult<Option<AdminAccount>>;

    async fn find_agent(&self, id: u64) -> StoreResult<Option<AgentAccount>>;
}
