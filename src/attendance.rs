//! Daily check-in/check-out.
//!
//! An agent has at most one presence per calendar day. The first call of the
//! day records the arrival, the second records the departure, any further
//! call is refused.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::{ApiError, ApiResult};
use crate::model::presence::{PresenceRecord, PresenceStatus};
use crate::store::{AccountStore, NewPresence, PresenceStore, StoreError};
use crate::utils::time_format::truncate_to_minute;

/// What a check call should do given the state of today's record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckAction {
    Arrive {
        date: NaiveDate,
        arrival: NaiveTime,
        status: PresenceStatus,
    },
    Depart {
        presence_id: u64,
        departure: NaiveTime,
    },
    /// Arrival and departure are both recorded.
    AlreadyCompleted,
}

/// Outcome of a successful check call.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Arrived(PresenceRecord),
    Departed(PresenceRecord),
}

/// Status given to a fresh arrival. Compared at minute precision, so an
/// arrival at 08:00:59 with an 08:00 threshold is still on time.
pub fn arrival_status(arrival: NaiveTime, late_threshold: NaiveTime) -> PresenceStatus {
    if truncate_to_minute(arrival) > truncate_to_minute(late_threshold) {
        PresenceStatus::Late
    } else {
        PresenceStatus::Present
    }
}

/// Decides the check action from today's record, if any.
pub fn resolve(
    today: Option<&PresenceRecord>,
    now: NaiveDateTime,
    late_threshold: NaiveTime,
) -> CheckAction {
    let time = truncate_to_minute(now.time());

    match today {
        None => CheckAction::Arrive {
            date: now.date(),
            arrival: time,
            status: arrival_status(time, late_threshold),
        },
        Some(record) if !record.is_closed() => CheckAction::Depart {
            presence_id: record.id,
            departure: time,
        },
        Some(_) => CheckAction::AlreadyCompleted,
    }
}

/// Records the caller's arrival or departure for today.
pub async fn check_in_or_out(
    presences: &dyn PresenceStore,
    accounts: &dyn AccountStore,
    clock: &dyn Clock,
    late_threshold: NaiveTime,
    agent_id: u64,
) -> ApiResult<CheckOutcome> {
    if !accounts.agent_exists(agent_id).await? {
        return Err(ApiError::NotFound("Agent not found".into()));
    }

    let now = clock.now();
    let today = presences.find_for_day(agent_id, now.date()).await?;

    match resolve(today.as_ref(), now, late_threshold) {
        CheckAction::Arrive {
            date,
            arrival,
            status,
        } => {
            let new_presence = NewPresence {
                agent_id,
                date,
                status,
                arrival_time: Some(arrival),
                departure_time: None,
                reason: None,
                at: now,
            };

            match presences.insert(new_presence).await {
                Ok(record) => {
                    info!(agent_id, presence_id = record.id, status = %record.status, "Arrival recorded");
                    Ok(CheckOutcome::Arrived(record))
                }
                Err(StoreError::Duplicate) => {
                    warn!(agent_id, %date, "Concurrent arrival rejected");
                    Err(ApiError::Conflict("Arrival already recorded for today".into()))
                }
                Err(e) => Err(e.into()),
            }
        }

        CheckAction::Depart {
            presence_id,
            departure,
        } => match presences.close(presence_id, departure, now).await? {
            Some(record) => {
                info!(agent_id, presence_id, "Departure recorded");
                Ok(CheckOutcome::Departed(record))
            }
            None => Err(already_completed()),
        },

        CheckAction::AlreadyCompleted => Err(already_completed()),
    }
}

/// Agent-side departure for today's open record, at a time of the agent's
/// choosing. Counts as the record's second and last self-service write.
pub async fn correct_departure(
    presences: &dyn PresenceStore,
    clock: &dyn Clock,
    agent_id: u64,
    presence_id: u64,
    departure: NaiveTime,
) -> ApiResult<PresenceRecord> {
    let mut record = presences
        .get(presence_id)
        .await?
        .filter(|p| p.agent_id == agent_id)
        .ok_or_else(|| ApiError::NotFound("Presence not found".into()))?;

    let now = clock.now();
    if record.date != now.date() {
        return Err(ApiError::Conflict("Only today's presence can be changed".into()));
    }
    if record.is_closed() {
        return Err(already_completed());
    }
    if record.arrival_time.is_none() {
        return Err(ApiError::Validation(
            "Cannot set a departure before an arrival is recorded".into(),
        ));
    }

    let departure = truncate_to_minute(departure);
    record.departure_time = Some(departure);
    ensure_time_order(&record)?;

    presences
        .close(presence_id, departure, now)
        .await?
        .ok_or_else(already_completed)
}

/// Rejects a record whose departure precedes its arrival.
pub fn ensure_time_order(record: &PresenceRecord) -> ApiResult<()> {
    match (record.arrival_time, record.departure_time) {
        (Some(arrival), Some(departure)) if departure < arrival => Err(ApiError::Validation(
            "departure_time cannot be earlier than arrival_time".into(),
        )),
        _ => Ok(()),
    }
}

fn already_completed() -> ApiError {
    ApiError::Conflict("Attendance already completed for today".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn eight() -> NaiveTime {
        NaiveTime::from_hms_opt(8, 0, 0).unwrap()
    }

    fn record(arrival: Option<NaiveTime>, departure: Option<NaiveTime>) -> PresenceRecord {
        PresenceRecord {
            id: 3,
            agent_id: 1,
            date: at(0, 0, 0).date(),
            status: PresenceStatus::Late,
            arrival_time: arrival,
            departure_time: departure,
            reason: None,
            created_at: at(8, 30, 0),
            updated_at: at(8, 30, 0),
        }
    }

    #[test]
    fn first_call_after_threshold_is_a_late_arrival() {
        assert_eq!(
            resolve(None, at(8, 30, 12), eight()),
            CheckAction::Arrive {
                date: at(0, 0, 0).date(),
                arrival: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
                status: PresenceStatus::Late,
            }
        );
    }

    #[test]
    fn first_call_before_threshold_is_present() {
        let action = resolve(None, at(7, 45, 0), eight());
        assert!(matches!(
            action,
            CheckAction::Arrive { status: PresenceStatus::Present, .. }
        ));
    }

    #[test]
    fn threshold_is_strict_at_minute_precision() {
        assert_eq!(arrival_status(at(8, 0, 0).time(), eight()), PresenceStatus::Present);
        assert_eq!(arrival_status(at(8, 0, 59).time(), eight()), PresenceStatus::Present);
        assert_eq!(arrival_status(at(8, 1, 0).time(), eight()), PresenceStatus::Late);
    }

    #[test]
    fn open_record_gets_a_departure() {
        let open = record(Some(at(8, 30, 0).time()), None);
        assert_eq!(
            resolve(Some(&open), at(17, 0, 40), eight()),
            CheckAction::Depart {
                presence_id: 3,
                departure: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            }
        );
    }

    #[test]
    fn closed_record_is_refused() {
        let closed = record(Some(at(8, 30, 0).time()), Some(at(17, 0, 0).time()));
        assert_eq!(
            resolve(Some(&closed), at(18, 0, 0), eight()),
            CheckAction::AlreadyCompleted
        );
    }

    #[test]
    fn administrative_record_without_arrival_is_closed_by_next_call() {
        let admin_made = record(None, None);
        assert!(matches!(
            resolve(Some(&admin_made), at(9, 0, 0), eight()),
            CheckAction::Depart { .. }
        ));
    }

    // ---------------------------------------------------------------------
    // Writes that lose a race against a concurrent request
    // ---------------------------------------------------------------------

    use crate::clock::FixedClock;
    use crate::model::account::{AdminAccount, AgentAccount};
    use crate::model::presence::PresenceWithAgent;
    use crate::store::{PresenceChanges, StoreResult};
    use async_trait::async_trait;

    /// Reads see `today`; every write finds the row already taken.
    struct LosingStore {
        today: Option<PresenceRecord>,
        roster_gone: bool,
    }

    #[async_trait]
    impl PresenceStore for LosingStore {
        async fn find_for_day(&self, _: u64, _: NaiveDate) -> StoreResult<Option<PresenceRecord>> {
            Ok(self.today.clone())
        }

        async fn get(&self, _: u64) -> StoreResult<Option<PresenceRecord>> {
            Ok(self.today.clone())
        }

        async fn insert(&self, _: NewPresence) -> StoreResult<PresenceRecord> {
            if self.roster_gone {
                Err(StoreError::UnknownAgent)
            } else {
                Err(StoreError::Duplicate)
            }
        }

        async fn close(&self, _: u64, _: NaiveTime, _: NaiveDateTime) -> StoreResult<Option<PresenceRecord>> {
            Ok(None)
        }

        async fn update(&self, _: u64, _: &PresenceChanges, _: NaiveDateTime) -> StoreResult<Option<PresenceRecord>> {
            Ok(None)
        }

        async fn delete(&self, _: u64) -> StoreResult<bool> {
            Ok(false)
        }

        async fn list_for_agent(&self, _: u64) -> StoreResult<Vec<PresenceRecord>> {
            Ok(Vec::new())
        }

        async fn list_all(&self) -> StoreResult<Vec<PresenceWithAgent>> {
            Ok(Vec::new())
        }
    }

    /// Every agent id is reported as known.
    struct KnownAgents;

    #[async_trait]
    impl AccountStore for KnownAgents {
        async fn agent_exists(&self, _: u64) -> StoreResult<bool> {
            Ok(true)
        }

        async fn find_admin_by_email(&self, _: &str) -> StoreResult<Option<AdminAccount>> {
            Ok(None)
        }

        async fn find_agent_by_email(&self, _: &str) -> StoreResult<Option<AgentAccount>> {
            Ok(None)
        }

        async fn find_admin(&self, _: u64) -> StoreResult<Option<AdminAccount>> {
            Ok(None)
        }

        async fn find_agent(&self, _: u64) -> StoreResult<Option<AgentAccount>> {
            Ok(None)
        }
    }

    async fn check(store: &LosingStore, now: NaiveDateTime) -> ApiResult<CheckOutcome> {
        check_in_or_out(store, &KnownAgents, &FixedClock::new(now), eight(), 1).await
    }

    #[actix_web::test]
    async fn concurrent_arrival_is_a_conflict_not_a_departure() {
        let store = LosingStore { today: None, roster_gone: false };

        match check(&store, at(8, 30, 0)).await {
            Err(ApiError::Conflict(message)) => {
                assert_eq!(message, "Arrival already recorded for today")
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[actix_web::test]
    async fn concurrent_departure_is_a_conflict() {
        let store = LosingStore {
            today: Some(record(Some(at(8, 30, 0).time()), None)),
            roster_gone: false,
        };

        match check(&store, at(17, 0, 0)).await {
            Err(ApiError::Conflict(message)) => {
                assert_eq!(message, "Attendance already completed for today")
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[actix_web::test]
    async fn agent_removed_from_roster_after_lookup_is_not_found() {
        let store = LosingStore { today: None, roster_gone: true };

        match check(&store, at(8, 30, 0)).await {
            Err(ApiError::NotFound(message)) => assert_eq!(message, "Agent not found"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[actix_web::test]
    async fn departure_set_concurrently_refuses_the_explicit_one() {
        let store = LosingStore {
            today: Some(record(Some(at(8, 30, 0).time()), None)),
            roster_gone: false,
        };
        let clock = FixedClock::new(at(16, 0, 0));

        let result = correct_departure(&store, &clock, 1, 3, at(16, 45, 0).time()).await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
    }
}
