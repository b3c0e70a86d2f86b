//! Storage key derivation.
//!
//! Key format: `{site_id}/{yyyy}/{mm}/{user_id}/{unix_millis}-{token}.{ext}`. Keys are
//! derived from the wall clock and a fresh random token, never from content, so
//! uploading identical bytes twice produces two distinct keys.

use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::traits::StorageError;

/// Length of the random disambiguator (base-36, about 51 bits).
pub const TOKEN_LEN: usize = 10;

const TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Validated object key under which a photo's bytes are stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// Derive a key for a new upload using the current time and thread-local randomness.
    pub fn generate(site_id: Uuid, user_id: Uuid, extension: &str) -> Self {
        Self::derive(site_id, user_id, extension, Utc::now(), &mut rand::rng())
    }

    /// Derive a key from an explicit instant and random source.
    pub fn derive<R: Rng + ?Sized>(
        site_id: Uuid,
        user_id: Uuid,
        extension: &str,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Self {
        let token: String = (0..TOKEN_LEN)
            .map(|_| TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())] as char)
            .collect();

        StorageKey(format!(
            "{}/{:04}/{:02}/{}/{}-{}.{}",
            site_id,
            now.year(),
            now.month(),
            user_id,
            now.timestamp_millis(),
            token,
            extension
        ))
    }

    /// Wrap an existing key (e.g. a stored `storage_path`) after validating it.
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        validate_key(raw)?;
        Ok(StorageKey(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reject keys that are empty, absolute, or could traverse out of the bucket.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.contains("..") || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ids() -> (Uuid, Uuid) {
        (
            Uuid::parse_str("11111111-1111-4111-8111-111111111111").unwrap(),
            Uuid::parse_str("22222222-2222-4222-8222-222222222222").unwrap(),
        )
    }

    #[test]
    fn key_layout_is_site_year_month_user_file() {
        let (site, user) = ids();
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let key = StorageKey::derive(site, user, "png", now, &mut StdRng::seed_from_u64(1));

        let parts: Vec<&str> = key.as_str().split('/').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], site.to_string());
        assert_eq!(parts[1], "2024");
        assert_eq!(parts[2], "03");
        assert_eq!(parts[3], user.to_string());

        let (stamp, rest) = parts[4].split_once('-').unwrap();
        assert_eq!(stamp, now.timestamp_millis().to_string());
        let (token, ext) = rest.split_once('.').unwrap();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_eq!(ext, "png");
    }

    #[test]
    fn same_instant_different_tokens_yield_distinct_keys() {
        let (site, user) = ids();
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(42);
        let a = StorageKey::derive(site, user, "jpg", now, &mut rng);
        let b = StorageKey::derive(site, user, "jpg", now, &mut rng);
        assert_ne!(a, b);
    }

    #[test]
    fn generated_keys_pass_validation() {
        let (site, user) = ids();
        let key = StorageKey::generate(site, user, "jpg");
        assert!(StorageKey::parse(key.as_str()).is_ok());
    }

    #[test]
    fn traversal_and_absolute_keys_rejected() {
        for bad in ["", "../etc/passwd", "/abs/key.jpg", "a/../../b", "a\\b"] {
            assert!(
                matches!(StorageKey::parse(bad), Err(StorageError::InvalidKey(_))),
                "accepted {bad:?}"
            );
        }
    }
}
