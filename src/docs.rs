use crate::api::presence::{AgentDeparture, CreatePresence, UpdatePresence};
use crate::model::presence::{AgentSummary, PresenceRecord, PresenceStatus, PresenceWithAgent};
use crate::models::LoginReqDto;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Presence API",
        version = "1.0.0",
        description = r#"
## Ministry attendance service

Daily check-in / check-out of agents and administration of presence records.

### Key Features
- **Self-service**
  - One call records the arrival, the next one the departure
  - Own history, most recent day first
- **Administration**
  - List every presence with its agent
  - Create, override or delete a presence

### Security
Every endpoint except `/login` requires a **JWT Bearer** token. Agent routes
need an agent token, `/admin` routes an administrator token.

### Errors
Errors are returned as `{ "message": "..." }` with the matching HTTP status.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::profile,

        crate::api::presence::check,
        crate::api::presence::list_own,
        crate::api::presence::update_own_departure,

        crate::api::presence::list_all,
        crate::api::presence::create,
        crate::api::presence::update,
        crate::api::presence::delete
    ),
    components(
        schemas(
            LoginReqDto,
            PresenceStatus,
            PresenceRecord,
            AgentSummary,
            PresenceWithAgent,
            AgentDeparture,
            CreatePresence,
            UpdatePresence
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and caller profile"),
        (name = "Presence", description = "Attendance check-in/out and administration"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
