use crate::{
    auth::{auth::AuthUser, jwt::generate_access_token, password::verify_password},
    config::Config,
    error::{ApiError, ApiResult},
    model::{account::AccountView, role::Role},
    models::{LoginReqDto, LoginResponse},
    store::AccountStore,
};
use actix_web::{HttpResponse, Responder, web};
use serde_json::json;
use tracing::{debug, info, instrument};

/// Unified login: administrators are matched first, then agents.
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Authenticated", body = Object, example = json!({
            "role": "agent",
            "token": "eyJhbGciOiJIUzI1NiJ9...",
            "user": { "id": 42, "nom": "Rakoto", "prenom": "Jean", "email": "agent@mtefop.gov.mg", "immatricule": "MAT-0042" }
        })),
        (status = 400, description = "Missing e-mail or password"),
        (status = 401, description = "Invalid credentials", body = Object, example = json!({
            "message": "Invalid credentials"
        }))
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(accounts, config, user),
    fields(email = %user.email)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    accounts: web::Data<dyn AccountStore>,
    config: web::Data<Config>,
) -> ApiResult<impl Responder> {
    info!("Login request received");

    let email = user.email.trim();
    if email.is_empty() || user.password.is_empty() {
        info!("Validation failed: empty email or password");
        return Err(ApiError::Validation("Email and password are required".into()));
    }

    if let Some(admin) = accounts.find_admin_by_email(email).await? {
        if verify_password(&user.password, &admin.password).is_ok() {
            debug!(admin_id = admin.id, "Admin authenticated");
            return issue(Role::Admin, admin.id, &admin.email, AccountView::from(&admin), &config);
        }
        debug!("Admin password mismatch, trying agents");
    }

    if let Some(agent) = accounts.find_agent_by_email(email).await? {
        let verified = agent
            .mot_de_passe
            .as_deref()
            .is_some_and(|hash| verify_password(&user.password, hash).is_ok());

        if verified {
            debug!(agent_id = agent.id, "Agent authenticated");
            return issue(Role::Agent, agent.id, email, AccountView::from(&agent), &config);
        }
    }

    info!("Invalid credentials");
    Err(ApiError::Unauthorized("Invalid credentials".into()))
}

fn issue(
    role: Role,
    account_id: u64,
    email: &str,
    view: AccountView,
    config: &Config,
) -> ApiResult<HttpResponse> {
    let token = generate_access_token(
        account_id,
        email.to_string(),
        role,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| ApiError::Internal(format!("token encoding failed: {e}")))?;

    info!(%role, account_id, "Login successful");

    Ok(HttpResponse::Ok().json(LoginResponse {
        role,
        token,
        user: view,
    }))
}

/// Identity of the authenticated caller.
#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "Caller profile", body = Object, example = json!({
            "role": "admin",
            "user": { "id": 1, "nom": "Admin", "prenom": null, "email": "admin@mtefop.gov.mg" }
        })),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Account no longer exists")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
pub async fn profile(
    auth: AuthUser,
    accounts: web::Data<dyn AccountStore>,
) -> ApiResult<impl Responder> {
    let view = match auth.role {
        Role::Admin => accounts
            .find_admin(auth.account_id)
            .await?
            .map(|a| AccountView::from(&a)),
        Role::Agent => accounts
            .find_agent(auth.account_id)
            .await?
            .map(|a| AccountView::from(&a)),
    };

    let view = view.ok_or_else(|| ApiError::NotFound("Account not found".into()))?;

    Ok(HttpResponse::Ok().json(json!({
        "role": auth.role,
        "user": view,
    })))
}
