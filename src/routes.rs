use crate::{
    api::presence,
    auth::{handlers, middleware::auth_middleware},
    clock::Clock,
    config::Config,
    error::ApiError,
    store::{AccountStore, PresenceStore},
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

/// Shared services handed to every worker.
#[derive(Clone)]
pub struct AppState {
    pub presences: Arc<dyn PresenceStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub clock: Arc<dyn Clock>,
    pub config: Config,
}

/// Room for a full `reason` column plus the other fields.
const JSON_LIMIT: usize = 128 * 1024;

fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    let config = &state.config;

    cfg.app_data(web::Data::from(state.presences.clone()))
        .app_data(web::Data::from(state.accounts.clone()))
        .app_data(web::Data::from(state.clock.clone()))
        .app_data(web::Data::new(config.clone()))
        .app_data(web::JsonConfig::default().limit(JSON_LIMIT).error_handler(|err, _req| {
            ApiError::Validation(err.to_string()).into()
        }))
        .app_data(web::PathConfig::default().error_handler(|err, _req| {
            ApiError::Validation(err.to_string()).into()
        }));

    cfg.service(
        web::scope(&config.api_prefix)
            // Public
            .service(
                web::resource("/login")
                    .wrap(build_limiter(config.rate_login_per_min))
                    .route(web::post().to(handlers::login)),
            )
            // Protected
            .service(
                web::scope("")
                    .wrap(from_fn(auth_middleware))
                    .wrap(build_limiter(config.rate_protected_per_min))
                    .service(web::resource("/profile").route(web::get().to(handlers::profile)))
                    .service(
                        web::scope("/agent/presences")
                            // /agent/presences
                            .service(
                                web::resource("")
                                    .route(web::get().to(presence::list_own))
                                    .route(web::post().to(presence::check)),
                            )
                            // /agent/presences/{id}
                            .service(
                                web::resource("/{id}")
                                    .route(web::put().to(presence::update_own_departure)),
                            ),
                    )
                    .service(
                        web::scope("/admin/presences")
                            // /admin/presences
                            .service(
                                web::resource("")
                                    .route(web::get().to(presence::list_all))
                                    .route(web::post().to(presence::create)),
                            )
                            // /admin/presences/{id}
                            .service(
                                web::resource("/{id}")
                                    .route(web::put().to(presence::update))
                                    .route(web::delete().to(presence::delete)),
                            ),
                    ),
            ),
    );
}

// LOGIN
//  └─ token (ACCESS_TOKEN_TTL, default 15 min)

// API REQUEST
//  └─ Authorization: Bearer token
