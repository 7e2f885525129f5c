//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (SHA-256, Base64, secure random)
//! - Password hashing (Argon2id, NIST SP 800-63B compliant)
//! - Signed identity tokens (JWT, HS256)
//! - Cookie management
//! - Rate limiting infrastructure (sliding window)
//! - Request screening (bot detection, shield rules)

pub mod client;
pub mod cookie;
pub mod crypto;
pub mod password;
pub mod rate_limit;
pub mod shield;
pub mod token;
