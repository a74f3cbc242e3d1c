use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use derive_more::Display;

#[derive(Debug, Display)]
pub enum PasswordError {
    #[display(fmt = "argon2: {}", _0)]
    Argon2(argon2::password_hash::Error),

    #[display(fmt = "bcrypt: {}", _0)]
    Bcrypt(bcrypt::BcryptError),

    #[display(fmt = "password mismatch")]
    Mismatch,
}

impl std::error::Error for PasswordError {}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    Ok(argon2.hash_password(password.as_bytes(), &salt)?.to_string())
}

/// Accepts Argon2 PHC strings and the bcrypt (`$2a$`/`$2b$`/`$2y$`) hashes
/// already stored for roster accounts.
pub fn verify_password(password: &str, hashed: &str) -> Result<(), PasswordError> {
    if hashed.starts_with("$2") {
        return match bcrypt::verify(password, hashed) {
            Ok(true) => Ok(()),
            Ok(false) => Err(PasswordError::Mismatch),
            Err(e) => Err(PasswordError::Bcrypt(e)),
        };
    }

    let argon2 = Argon2::default();
    let parsed = PasswordHash::new(hashed).map_err(PasswordError::Argon2)?;

    argon2
        .verify_password(password.as_bytes(), &parsed)
        .map_err(PasswordError::Argon2)
}
