#![allow(dead_code)]

use std::sync::Arc;

use actix_web::test::TestRequest;
use chrono::{NaiveDate, NaiveDateTime};
use presence::auth::jwt::generate_access_token;
use presence::auth::password::hash_password;
use presence::clock::FixedClock;
use presence::config::{Config, default_late_threshold};
use presence::model::account::{AdminAccount, AgentAccount};
use presence::model::role::Role;
use presence::routes::AppState;
use presence::store::MemoryStore;

pub const SECRET: &str = "test-secret";
pub const ADMIN_ID: u64 = 1;
pub const AGENT_A: u64 = 10;
pub const AGENT_B: u64 = 11;
pub const PASSWORD: &str = "motdepasse";

pub struct TestEnv {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub clock: FixedClock,
}

pub fn config() -> Config {
    Config {
        database_url: "mysql://unused".into(),
        jwt_secret: SECRET.into(),
        server_addr: "127.0.0.1:0".into(),
        access_token_ttl: 900,
        rate_login_per_min: 600,
        rate_protected_per_min: 6000,
        api_prefix: "/api".into(),
        late_threshold: default_late_threshold(),
        log_dir: "logs".into(),
        run_migrations: false,
        agent_cache_warmup_days: 30,
    }
}

pub fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn agent(id: u64, immatricule: &str, nom: &str, email: &str, hash: &str) -> AgentAccount {
    AgentAccount {
        id,
        immatricule: immatricule.into(),
        nom: nom.into(),
        prenom: Some("Test".into()),
        email: Some(email.into()),
        mot_de_passe: Some(hash.into()),
    }
}

pub fn env_at(now: NaiveDateTime) -> TestEnv {
    let hash = hash_password(PASSWORD).unwrap();
    let store = Arc::new(MemoryStore::new());
    store.add_admin(AdminAccount {
        id: ADMIN_ID,
        nom: "Admin".into(),
        email: "admin@mtefop.gov.mg".into(),
        password: hash.clone(),
    });
    store.add_agent(agent(AGENT_A, "MAT-0010", "Rakoto", "rakoto@mtefop.gov.mg", &hash));
    store.add_agent(agent(AGENT_B, "MAT-0011", "Rabe", "rabe@mtefop.gov.mg", &hash));

    let clock = FixedClock::new(now);
    let state = AppState {
        presences: store.clone(),
        accounts: store.clone(),
        clock: Arc::new(clock.clone()),
        config: config(),
    };

    TestEnv {
        state,
        store,
        clock,
    }
}

pub fn token(role: Role, id: u64) -> String {
    generate_access_token(id, format!("{id}@mtefop.gov.mg"), role, SECRET, 900).unwrap()
}

pub fn agent_token(id: u64) -> String {
    token(Role::Agent, id)
}

pub fn admin_token() -> String {
    token(Role::Admin, ADMIN_ID)
}

/// Test request with a peer address, which the rate limiter keys on.
pub fn request(req: TestRequest, bearer: Option<&str>) -> TestRequest {
    let req = req.peer_addr("127.0.0.1:40000".parse().unwrap());
    match bearer {
        Some(t) => req.insert_header(("Authorization", format!("Bearer {t}"))),
        None => req,
    }
}

/// Builds the full application against an environment.
macro_rules! app {
    ($env:expr) => {{
        let state = $env.state.clone();
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(actix_web::middleware::NormalizePath::trim())
                .configure(move |cfg| presence::routes::configure(cfg, &state)),
        )
        .await
    }};
}
