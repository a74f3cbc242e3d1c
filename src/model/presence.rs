use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::utils::time_format;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PresenceStatus {
    #[default]
    Present,
    Absent,
    Late,
    Permission,
}

/// One attendance entry of an agent for a calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "agent_id": 42,
    "date": "2024-01-15",
    "status": "late",
    "arrival_time": "08:30",
    "departure_time": null,
    "reason": null,
    "created_at": "2024-01-15T08:30:12",
    "updated_at": "2024-01-15T08:30:12"
}))]
pub struct PresenceRecord {
    pub id: u64,
    pub agent_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub status: PresenceStatus,
    #[serde(with = "time_format::optional")]
    #[schema(value_type = Option<String>, example = "08:30")]
    pub arrival_time: Option<NaiveTime>,
    #[serde(with = "time_format::optional")]
    #[schema(value_type = Option<String>, example = "17:00")]
    pub departure_time: Option<NaiveTime>,
    pub reason: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: NaiveDateTime,
}

impl PresenceRecord {
    /// No further self-service write is accepted once the departure is set.
    pub fn is_closed(&self) -> bool {
        self.departure_time.is_some()
    }
}

/// Roster fields shown next to a record in the admin listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AgentSummary {
    pub id: u64,
    #[schema(example = "MAT-0042")]
    pub immatricule: String,
    #[schema(example = "Rakoto")]
    pub nom: String,
    pub prenom: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PresenceWithAgent {
    #[serde(flatten)]
    pub presence: PresenceRecord,
    pub agent: Option<AgentSummary>,
}
