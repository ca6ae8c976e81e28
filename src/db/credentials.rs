use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::{CryptoRng, Rng, RngCore};

use crate::models::tenant::TenantIdentity;

/// Characters a generated password is drawn from. Contains no quote or
/// backslash characters.
pub const PASSWORD_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()_+~`|}{[]:;?><,./-=";

const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SUFFIX_LEN: usize = 11;

/// Draw `length` characters uniformly from [`PASSWORD_CHARSET`].
///
/// `gen_range` samples by rejection, so every character is equally likely.
/// The `CryptoRng` bound keeps statistical generators such as `SmallRng` out.
pub fn generate_password<R: RngCore + CryptoRng>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())] as char)
        .collect()
}

/// `db_<unix millis>_<11 chars of [a-z0-9]>`: always a valid lower-case identifier.
pub fn generate_db_name<R: RngCore + CryptoRng>(rng: &mut R, now: DateTime<Utc>) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
        .collect();
    format!("db_{}_{}", now.timestamp_millis(), suffix)
}

pub fn username_for(db_name: &str) -> String {
    format!("user_{db_name}")
}

pub fn generate_identity<R: RngCore + CryptoRng>(
    rng: &mut R,
    password_length: usize,
    now: DateTime<Utc>,
) -> TenantIdentity {
    let db_name = generate_db_name(rng, now);
    TenantIdentity {
        username: username_for(&db_name),
        password: generate_password(rng, password_length),
        db_name,
        created_at: now,
    }
}

/// Fresh identity from the operating system's CSPRNG.
pub fn new_identity(password_length: usize) -> TenantIdentity {
    generate_identity(&mut OsRng, password_length, Utc::now())
}
