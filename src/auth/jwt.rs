use crate::models::Claims;
use jsonwebtoken::{DecodingKey, Validation, decode};

/// Verifies a bearer token minted by the identity collaborator. Token issuing
/// and refresh live there; this service only checks signatures and expiry.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}
