//! Public join codes.
//!
//! Codes are short upper-case alphanumeric strings players read out to each
//! other. Uniqueness among active matches is enforced by the store; this
//! module only samples and validates.

use rand::Rng;

use crate::error::GameError;

/// Characters a public code is drawn from.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Default code length.
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Samples a code of `length` characters.
pub fn generate<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .collect()
}

/// Upper-cases user input and checks length and alphabet.
///
/// # Errors
///
/// Returns [`GameError::InvalidPublicId`] for anything that could never
/// have been generated.
pub fn normalize(input: &str, length: usize) -> Result<String, GameError> {
    let code = input.trim().to_ascii_uppercase();
    let valid = code.len() == length && code.bytes().all(|b| CODE_ALPHABET.contains(&b));
    if valid {
        Ok(code)
    } else {
        Err(GameError::InvalidPublicId(input.to_string()))
    }
}
