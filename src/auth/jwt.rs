use std::time::{SystemTime, UNIX_EPOCH};

use crate::{model::role::Role, models::Claims};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or(0)
}

pub fn generate_access_token(
    account_id: u64,
    email: String,
    role: Role,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    let claims = Claims {
        sub: email,
        role,
        account_id,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_with_same_secret() {
        let token = generate_access_token(7, "a@b.mg".into(), Role::Agent, "s3cret", 60).unwrap();
        let claims = verify_token(&token, "s3cret").unwrap();

        assert_eq!(claims.account_id, 7);
        assert_eq!(claims.role, Role::Agent);
        assert_eq!(claims.sub, "a@b.mg");
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = generate_access_token(1, "x@y.mg".into(), Role::Admin, "one", 60).unwrap();
        assert!(verify_token(&token, "two").is_err());
    }
}
