use crate::{
    attendance::{self, CheckOutcome, ensure_time_order},
    auth::auth::AuthUser,
    clock::Clock,
    config::Config,
    error::{ApiError, ApiResult},
    model::presence::{PresenceRecord, PresenceStatus},
    store::{AccountStore, NewPresence, PresenceChanges, PresenceStore},
    utils::time_format,
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AgentDeparture {
    #[serde(with = "time_format::required")]
    #[schema(value_type = String, example = "17:00")]
    pub departure_time: NaiveTime,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreatePresence {
    #[schema(example = 42)]
    pub agent_id: u64,
    #[schema(example = "2024-01-15", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[serde(default)]
    pub status: Option<PresenceStatus>,
    #[serde(default, with = "time_format::optional")]
    #[schema(value_type = Option<String>, example = "08:00")]
    pub arrival_time: Option<NaiveTime>,
    #[serde(default, with = "time_format::optional")]
    #[schema(value_type = Option<String>, example = "16:30")]
    pub departure_time: Option<NaiveTime>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Absent fields are left unchanged; `null` clears a field.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdatePresence {
    #[serde(default)]
    pub status: Option<PresenceStatus>,
    #[serde(default, deserialize_with = "time_format::patch::deserialize")]
    #[schema(value_type = Option<String>, example = "08:15")]
    pub arrival_time: Option<Option<NaiveTime>>,
    #[serde(default, deserialize_with = "time_format::patch::deserialize")]
    #[schema(value_type = Option<String>, example = "17:00")]
    pub departure_time: Option<Option<NaiveTime>>,
    #[serde(default, deserialize_with = "time_format::double_option")]
    #[schema(value_type = Option<String>, example = "Rendez-vous médical")]
    pub reason: Option<Option<String>>,
}

impl From<UpdatePresence> for PresenceChanges {
    fn from(body: UpdatePresence) -> Self {
        Self {
            status: body.status,
            arrival_time: body.arrival_time,
            departure_time: body.departure_time,
            reason: body.reason,
        }
    }
}

/// Upper bound of the `reason` column, in bytes.
pub const MAX_REASON_BYTES: usize = 65_535;

fn ensure_reason_length(reason: Option<&str>) -> ApiResult<()> {
    match reason {
        Some(r) if r.len() > MAX_REASON_BYTES => Err(ApiError::Validation(format!(
            "reason cannot exceed {MAX_REASON_BYTES} bytes"
        ))),
        _ => Ok(()),
    }
}

/// Check-in / check-out of the authenticated agent
#[utoipa::path(
    post,
    path = "/api/agent/presences",
    responses(
        (status = 201, description = "Arrival recorded", body = Object, example = json!({
            "message": "Arrival recorded",
            "presence": { "id": 1, "agent_id": 42, "date": "2024-01-15", "status": "late", "arrival_time": "08:30", "departure_time": null, "reason": null }
        })),
        (status = 200, description = "Departure recorded", body = Object, example = json!({
            "message": "Departure recorded",
            "presence": { "id": 1, "agent_id": 42, "date": "2024-01-15", "status": "late", "arrival_time": "08:30", "departure_time": "17:00", "reason": null }
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not an agent"),
        (status = 404, description = "Agent not found"),
        (status = 409, description = "Attendance already completed for today", body = Object, example = json!({
            "message": "Attendance already completed for today"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Presence"
)]
pub async fn check(
    auth: AuthUser,
    presences: web::Data<dyn PresenceStore>,
    accounts: web::Data<dyn AccountStore>,
    clock: web::Data<dyn Clock>,
    config: web::Data<Config>,
) -> ApiResult<impl Responder> {
    let agent_id = auth.require_agent()?;

    let outcome = attendance::check_in_or_out(
        presences.get_ref(),
        accounts.get_ref(),
        clock.get_ref(),
        config.late_threshold,
        agent_id,
    )
    .await?;

    Ok(match outcome {
        CheckOutcome::Arrived(presence) => HttpResponse::Created().json(json!({
            "message": "Arrival recorded",
            "presence": presence,
        })),
        CheckOutcome::Departed(presence) => HttpResponse::Ok().json(json!({
            "message": "Departure recorded",
            "presence": presence,
        })),
    })
}

/// Presence history of the authenticated agent
#[utoipa::path(
    get,
    path = "/api/agent/presences",
    responses(
        (status = 200, description = "Own presences, most recent first", body = [PresenceRecord]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not an agent")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Presence"
)]
pub async fn list_own(
    auth: AuthUser,
    presences: web::Data<dyn PresenceStore>,
) -> ApiResult<impl Responder> {
    let agent_id = auth.require_agent()?;
    let records = presences.list_for_agent(agent_id).await?;
    Ok(HttpResponse::Ok().json(records))
}

/// Record the departure of today's open presence at a given time
#[utoipa::path(
    put,
    path = "/api/agent/presences/{presence_id}",
    params(
        ("presence_id" = u64, Path, description = "Presence ID")
    ),
    request_body = AgentDeparture,
    responses(
        (status = 200, description = "Departure recorded", body = PresenceRecord),
        (status = 400, description = "Malformed time, no arrival recorded, or departure before arrival"),
        (status = 409, description = "Record already closed or not today's"),
        (status = 404, description = "Presence not found", body = Object, example = json!({
            "message": "Presence not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Presence"
)]
pub async fn update_own_departure(
    auth: AuthUser,
    presences: web::Data<dyn PresenceStore>,
    clock: web::Data<dyn Clock>,
    path: web::Path<u64>,
    body: web::Json<AgentDeparture>,
) -> ApiResult<impl Responder> {
    let agent_id = auth.require_agent()?;
    let presence_id = path.into_inner();

    let record = attendance::correct_departure(
        presences.get_ref(),
        clock.get_ref(),
        agent_id,
        presence_id,
        body.departure_time,
    )
    .await?;

    info!(agent_id, presence_id, "Departure set by agent");
    Ok(HttpResponse::Ok().json(record))
}

/// All presences with their agent
#[utoipa::path(
    get,
    path = "/api/admin/presences",
    responses(
        (status = 200, description = "All presences, most recent first", body = [crate::model::presence::PresenceWithAgent]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Presence"
)]
pub async fn list_all(
    auth: AuthUser,
    presences: web::Data<dyn PresenceStore>,
) -> ApiResult<impl Responder> {
    auth.require_admin()?;
    let records = presences.list_all().await?;
    Ok(HttpResponse::Ok().json(records))
}

/// Create an administrative presence
#[utoipa::path(
    post,
    path = "/api/admin/presences",
    request_body = CreatePresence,
    responses(
        (status = 201, description = "Presence created", body = PresenceRecord),
        (status = 400, description = "Validation failure"),
        (status = 404, description = "Agent not found"),
        (status = 409, description = "Agent already has a presence for that date")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Presence"
)]
pub async fn create(
    auth: AuthUser,
    presences: web::Data<dyn PresenceStore>,
    accounts: web::Data<dyn AccountStore>,
    clock: web::Data<dyn Clock>,
    body: web::Json<CreatePresence>,
) -> ApiResult<impl Responder> {
    auth.require_admin()?;
    let body = body.into_inner();

    if !accounts.agent_exists(body.agent_id).await? {
        return Err(ApiError::NotFound("Agent not found".into()));
    }

    if let (Some(arrival), Some(departure)) = (body.arrival_time, body.departure_time) {
        if departure < arrival {
            return Err(ApiError::Validation(
                "departure_time cannot be earlier than arrival_time".into(),
            ));
        }
    }
    ensure_reason_length(body.reason.as_deref())?;

    let record = presences
        .insert(NewPresence {
            agent_id: body.agent_id,
            date: body.date,
            status: body.status.unwrap_or_default(),
            arrival_time: body.arrival_time,
            departure_time: body.departure_time,
            reason: body.reason,
            at: clock.now(),
        })
        .await?;

    info!(admin_id = auth.account_id, presence_id = record.id, agent_id = record.agent_id, "Presence created by admin");
    Ok(HttpResponse::Created().json(record))
}

/// Override fields of a presence
#[utoipa::path(
    put,
    path = "/api/admin/presences/{presence_id}",
    params(
        ("presence_id" = u64, Path, description = "Presence ID")
    ),
    request_body = UpdatePresence,
    responses(
        (status = 200, description = "Presence updated", body = PresenceRecord),
        (status = 400, description = "Validation failure"),
        (status = 404, description = "Presence not found", body = Object, example = json!({
            "message": "Presence not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Presence"
)]
pub async fn update(
    auth: AuthUser,
    presences: web::Data<dyn PresenceStore>,
    clock: web::Data<dyn Clock>,
    path: web::Path<u64>,
    body: web::Json<UpdatePresence>,
) -> ApiResult<impl Responder> {
    auth.require_admin()?;
    let presence_id = path.into_inner();
    let changes = PresenceChanges::from(body.into_inner());

    if changes.is_empty() {
        return Err(ApiError::Validation("No fields provided for update".into()));
    }
    ensure_reason_length(changes.reason.as_ref().and_then(|r| r.as_deref()))?;

    let mut merged = presences
        .get(presence_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Presence not found".into()))?;
    changes.apply_to(&mut merged);
    ensure_time_order(&merged)?;

    let record = presences
        .update(presence_id, &changes, clock.now())
        .await?
        .ok_or_else(|| ApiError::NotFound("Presence not found".into()))?;

    info!(admin_id = auth.account_id, presence_id, "Presence updated by admin");
    Ok(HttpResponse::Ok().json(record))
}

/// Delete a presence
#[utoipa::path(
    delete,
    path = "/api/admin/presences/{presence_id}",
    params(
        ("presence_id" = u64, Path, description = "Presence ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Presence deleted"
        })),
        (status = 404, description = "Presence not found", body = Object, example = json!({
            "message": "Presence not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Presence"
)]
pub async fn delete(
    auth: AuthUser,
    presences: web::Data<dyn PresenceStore>,
    path: web::Path<u64>,
) -> ApiResult<impl Responder> {
    auth.require_admin()?;
    let presence_id = path.into_inner();

    if !presences.delete(presence_id).await? {
        warn!(presence_id, "Delete of unknown presence");
        return Err(ApiError::NotFound("Presence not found".into()));
    }

    info!(admin_id = auth.account_id, presence_id, "Presence deleted by admin");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Presence deleted"
    })))
}
