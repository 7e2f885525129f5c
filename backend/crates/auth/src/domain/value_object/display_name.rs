//! Display Name Value Object
//!
//! 表示名はユーザーが自由に決める**表示用の名前**。
//! 識別子ではないため一意性は不要。
//!
//! ## 不変条件
//! - NFKC正規化 → 前後の空白除去 の順で処理
//! - 長さ: 1〜50文字（正規化後、コードポイント数）
//! - 制御文字禁止

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Maximum length for display name (in characters)
pub const DISPLAY_NAME_MAX_LENGTH: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisplayNameError {
    #[error("Name cannot be empty")]
    Empty,

    #[error("Name must be at most {max} characters")]
    TooLong { max: usize },

    #[error("Name contains invalid characters")]
    InvalidCharacter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayName(String);

impl DisplayName {
    pub fn new(input: &str) -> Result<Self, DisplayNameError> {
        let normalized: String = input.nfkc().collect();
        let trimmed = normalized.trim();

        if trimmed.is_empty() {
            return Err(DisplayNameError::Empty);
        }

        if trimmed.chars().count() > DISPLAY_NAME_MAX_LENGTH {
            return Err(DisplayNameError::TooLong {
                max: DISPLAY_NAME_MAX_LENGTH,
            });
        }

        if trimmed.chars().any(char::is_control) {
            return Err(DisplayNameError::InvalidCharacter);
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Create from database value (assumed already validated)
    pub fn from_db(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_db(self) -> String {
        self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
