use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{distributions::Alphanumeric, Rng, RngCore};

use crate::{
    error::{Error, ErrorKind},
    TOKEN_BYTES,
};

/// Stored in place of a hash for accounts created without a password;
/// never parses as a PHC string, so nothing verifies against it.
const UNUSABLE_PASSWORD_PREFIX: &str = "!";

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    Ok(argon2
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

pub fn verify_password(
    password: &str,
    password_hash: &str,
) -> Result<bool, argon2::password_hash::Error> {
    let argon2 = Argon2::default();
    let parsed_hash = PasswordHash::new(password_hash)?;

    Ok(argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// [`hash_password`] on the blocking pool, so a hash doesn't stall the
/// executor thread serving other requests
pub async fn hash_password_blocking(password: &str) -> Result<String, Error> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            log::error!("Password hashing task failed: {e}");
            ErrorKind::Internal.new("Password hashing failed")
        })?
        .map_err(|e| {
            log::error!("Password hashing failed: {e}");
            ErrorKind::Internal.new("Password hashing failed")
        })
}

/// [`verify_password`] on the blocking pool. A hash that doesn't parse,
/// such as an unusable password, never verifies.
pub async fn verify_password_blocking(password: &str, password_hash: &str) -> Result<bool, Error> {
    let (password, password_hash) = (password.to_owned(), password_hash.to_owned());
    tokio::task::spawn_blocking(move || {
        verify_password(&password, &password_hash).unwrap_or(false)
    })
    .await
    .map_err(|e| {
        log::error!("Password verification task failed: {e}");
        ErrorKind::Internal.new("Password verification failed")
    })
}

pub fn unusable_password() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(40)
        .map(char::from)
        .collect();

    format!("{UNUSABLE_PASSWORD_PREFIX}{suffix}")
}

pub fn is_usable_password(password_hash: &str) -> bool {
    !password_hash.starts_with(UNUSABLE_PASSWORD_PREFIX)
}

/// Opaque session key, hex encoded
pub fn generate_access_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);

    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
