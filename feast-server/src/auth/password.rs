//! Argon2 password hashing

use std::sync::OnceLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Hash password using argon2 (PHC string)
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(password_hash.to_string())
}

/// Verify password against a stored PHC string
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Hash verified against when the login email is unknown, so both branches
/// pay for one argon2 verification
pub fn dummy_hash() -> Result<&'static str, argon2::password_hash::Error> {
    static DUMMY: OnceLock<String> = OnceLock::new();
    if let Some(hash) = DUMMY.get() {
        return Ok(hash);
    }
    let hash = hash_password("feast-dummy-password")?;
    Ok(DUMMY.get_or_init(|| hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }

    #[test]
    fn dummy_hash_is_stable_and_rejects() {
        let first = dummy_hash().unwrap();
        assert_eq!(first, dummy_hash().unwrap());
        assert!(first.starts_with("$argon2"));
        assert!(!verify_password("hunter2hunter2", first).unwrap());
    }
}
