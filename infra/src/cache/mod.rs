//! Cache module for the verification cache
//!
//! Pending OTP records live here until they are redeemed or expire. Redis
//! backs production deployments; the in-memory cache serves tests and local
//! development.

pub mod memory_cache;
pub mod redis_client;
pub mod verification_cache;

#[cfg(test)]
mod tests;

pub use memory_cache::MemoryVerificationCache;
pub use redis_client::RedisClient;
pub use verification_cache::RedisVerificationCache;

// Re-export commonly used types
pub use vouch_shared::config::cache::CacheConfig;
