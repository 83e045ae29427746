//! Unit tests for the Redis verification cache

use std::time::Duration;

use crate::cache::RedisVerificationCache;

#[test]
fn test_pending_key_hides_code() {
    let key = RedisVerificationCache::pending_key("123456");

    assert!(key.starts_with("otp:pending:"));
    assert!(!key.contains("123456"));
    assert_eq!(key, RedisVerificationCache::pending_key("123456"));
    assert_ne!(key, RedisVerificationCache::pending_key("654321"));
}

#[test]
fn test_hash_key() {
    let hash = RedisVerificationCache::hash_key("123456");

    // Hex-encoded SHA-256 is 64 chars
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(
        hash,
        "8d969eef6ecad3c29a3a629280e686cf0c3f5d5a86aff3ca12020c923adc6c92"
    );
}

#[test]
fn test_ttl_seconds_rounds_up() {
    assert_eq!(RedisVerificationCache::ttl_seconds(Duration::from_secs(300)), 300);
    assert_eq!(RedisVerificationCache::ttl_seconds(Duration::from_millis(1500)), 2);
    assert_eq!(RedisVerificationCache::ttl_seconds(Duration::ZERO), 1);
}
