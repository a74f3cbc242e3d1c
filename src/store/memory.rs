use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{AccountStore, NewPresence, PresenceChanges, PresenceStore, StoreError, StoreResult};
use crate::model::account::{AdminAccount, AgentAccount};
use crate::model::presence::{AgentSummary, PresenceRecord, PresenceWithAgent};

#[derive(Default)]
struct Tables {
    next_id: u64,
    presences: BTreeMap<u64, PresenceRecord>,
    admins: Vec<AdminAccount>,
    agents: Vec<AgentAccount>,
}

/// In-process store with the same uniqueness and ordering rules as MySQL.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_admin(&self, admin: AdminAccount) {
        self.lock().admins.push(admin);
    }

    pub fn add_agent(&self, agent: AgentAccount) {
        self.lock().agents.push(agent);
    }

    /// Drops an agent from the roster, leaving their presences in place.
    pub fn remove_agent(&self, agent_id: u64) {
        self.lock().agents.retain(|a| a.id != agent_id);
    }

    pub fn presence_count(&self) -> usize {
        self.lock().presences.len()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn newest_first(a: &PresenceRecord, b: &PresenceRecord) -> std::cmp::Ordering {
    b.date.cmp(&a.date).then(b.id.cmp(&a.id))
}

#[async_trait]
impl PresenceStore for MemoryStore {
    async fn find_for_day(
        &self,
        agent_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<PresenceRecord>> {
        Ok(self
            .lock()
            .presences
            .values()
            .find(|p| p.agent_id == agent_id && p.date == date)
            .cloned())
    }

    async fn get(&self, id: u64) -> StoreResult<Option<PresenceRecord>> {
        Ok(self.lock().presences.get(&id).cloned())
    }

    async fn insert(&self, presence: NewPresence) -> StoreResult<PresenceRecord> {
        let mut tables = self.lock();
        if tables
            .presences
            .values()
            .any(|p| p.agent_id == presence.agent_id && p.date == presence.date)
        {
            return Err(StoreError::Duplicate);
        }
        if !tables.agents.iter().any(|a| a.id == presence.agent_id) {
            return Err(StoreError::UnknownAgent);
        }

        tables.next_id += 1;
        let record = PresenceRecord {
            id: tables.next_id,
            agent_id: presence.agent_id,
            date: presence.date,
            status: presence.status,
            arrival_time: presence.arrival_time,
            departure_time: presence.departure_time,
            reason: presence.reason,
            created_at: presence.at,
            updated_at: presence.at,
        };
        tables.presences.insert(record.id, record.clone());
        Ok(record)
    }

    async fn close(
        &self,
        id: u64,
        departure: NaiveTime,
        at: NaiveDateTime,
    ) -> StoreResult<Option<PresenceRecord>> {
        let mut tables = self.lock();
        match tables.presences.get_mut(&id) {
            Some(record) if record.departure_time.is_none() => {
                record.departure_time = Some(departure);
                record.updated_at = at;
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn update(
        &self,
        id: u64,
        changes: &PresenceChanges,
        at: NaiveDateTime,
    ) -> StoreResult<Option<PresenceRecord>> {
        let mut tables = self.lock();
        Ok(tables.presences.get_mut(&id).map(|record| {
            changes.apply_to(record);
            record.updated_at = at;
            record.clone()
        }))
    }

    async fn delete(&self, id: u64) -> StoreResult<bool> {
        Ok(self.lock().presences.remove(&id).is_some())
    }

    async fn list_for_agent(&self, agent_id: u64) -> StoreResult<Vec<PresenceRecord>> {
        let mut records: Vec<_> = self
            .lock()
            .presences
            .values()
            .filter(|p| p.agent_id == agent_id)
            .cloned()
            .collect();
        records.sort_by(newest_first);
        Ok(records)
    }

    async fn list_all(&self) -> StoreResult<Vec<PresenceWithAgent>> {
        let tables = self.lock();
        let mut records: Vec<_> = tables.presences.values().cloned().collect();
        records.sort_by(newest_first);

        Ok(records
            .into_iter()
            .map(|presence| {
                let agent = tables
                    .agents
                    .iter()
                    .find(|a| a.id == presence.agent_id)
                    .map(|a| AgentSummary {
                        id: a.id,
                        immatricule: a.immatricule.clone(),
                        nom: a.nom.clone(),
                        prenom: a.prenom.clone(),
                        email: a.email.clone(),
                    });
                PresenceWithAgent { presence, agent }
            })
            .collect())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn agent_exists(&self, agent_id: u64) -> StoreResult<bool> {
        Ok(self.lock().agents.iter().any(|a| a.id == agent_id))
    }

    async fn find_admin_by_email(&self, email: &str) -> StoreResult<Option<AdminAccount>> {
        Ok(self
            .lock()
            .admins
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_agent_by_email(&self, email: &str) -> StoreResult<Option<AgentAccount>> {
        Ok(self
            .lock()
            .agents
            .iter()
            .find(|a| a.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email)))
            .cloned())
    }

    async fn find_admin(&self, id: u64) -> StoreResult<Option<AdminAccount>> {
        Ok(self.lock().admins.iter().find(|a| a.id == id).cloned())
    }

    async fn find_agent(&self, id: u64) -> StoreResult<Option<AgentAccount>> {
        Ok(self.lock().agents.iter().find(|a| a.id == id).cloned())
    }
}
