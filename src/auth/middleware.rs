use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;
use tracing::debug;

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let jwt_secret = req
        .app_data::<Data<Config>>()
        .map(|config| config.jwt_secret.clone())
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let token = match bearer_token(&req) {
        Ok(t) => t,
        Err(message) => return Ok(unauthorized(req, message)),
    };

    let claims = match verify_token(&token, &jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "Token rejected");
            return Ok(unauthorized(req, "Invalid or expired token"));
        }
    };

    req.extensions_mut().insert(AuthUser::from(claims));

    next.call(req).await
}

fn bearer_token(req: &ServiceRequest) -> Result<String, &'static str> {
    let header_value = req
        .headers()
        .get("Authorization")
        .ok_or("Missing Authorization header")?
        .to_str()
        .map_err(|_| "Invalid Authorization header encoding")?;

    header_value
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or("Authorization header must start with Bearer")
}

fn unauthorized(req: ServiceRequest, message: &str) -> ServiceResponse<BoxBody> {
    let resp = HttpResponse::Unauthorized().json(json!({ "message": message }));
    req.into_response(resp.map_into_boxed_body())
}
