//! Token behaviour configuration.
//!
//! # Responsibility
//! - Hold the fixed texts and policies used by store, renderer and insertion.
//! - Load overrides from JSON supplied by the host.
//!
//! # Invariants
//! - `default_text`, `error_label` and `token_class` are never empty after
//!   `validate()`.
//! - Every field has a serde default, so partial JSON is accepted.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_TEMPLATE_TEXT: &str = "template";
pub const DEFAULT_ERROR_LABEL: &str = "ERROR";
pub const DEFAULT_TOKEN_CLASS: &str = "special-component";

/// Binding given to a freshly inserted token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertPolicy {
    /// New tokens carry an empty binding and render as dangling.
    #[default]
    Unbound,
    /// New tokens bind to the first template in store order, if any.
    BindFirst,
}

/// Configuration shared by all token components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Text used by `add()` and by whitespace-only `update()` calls.
    #[serde(default = "default_text")]
    pub default_text: String,
    /// Label rendered for dangling tokens.
    #[serde(default = "default_error_label")]
    pub error_label: String,
    /// Template texts the store starts with, in order.
    #[serde(default = "default_seed_templates")]
    pub seed_templates: Vec<String>,
    #[serde(default)]
    pub insert_policy: InsertPolicy,
    /// Class written into token markup next to the non-editable marker.
    #[serde(default = "default_token_class")]
    pub token_class: String,
}

fn default_text() -> String {
    DEFAULT_TEMPLATE_TEXT.to_string()
}

fn default_error_label() -> String {
    DEFAULT_ERROR_LABEL.to_string()
}

fn default_seed_templates() -> Vec<String> {
    (1..=3).map(|n| format!("template {n}")).collect()
}

fn default_token_class() -> String {
    DEFAULT_TOKEN_CLASS.to_string()
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            default_text: default_text(),
            error_label: default_error_label(),
            seed_templates: default_seed_templates(),
            insert_policy: InsertPolicy::default(),
            token_class: default_token_class(),
        }
    }
}

/// Config load/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    EmptyField(&'static str),
    InvalidTokenClass(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "failed to parse token config: {err}"),
            Self::EmptyField(field) => write!(f, "config field `{field}` cannot be empty"),
            Self::InvalidTokenClass(value) => write!(
                f,
                "token class `{value}` must be a single class name without quotes"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::EmptyField(_) | Self::InvalidTokenClass(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl TokenConfig {
    /// Parses and validates a JSON config document.
    ///
    /// # Errors
    /// - Returns `ConfigError::Parse` for malformed JSON.
    /// - Returns validation errors from `validate()`.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_text.trim().is_empty() {
            return Err(ConfigError::EmptyField("default_text"));
        }
        if self.error_label.trim().is_empty() {
            return Err(ConfigError::EmptyField("error_label"));
        }
        let class = self.token_class.trim();
        if class.is_empty() {
            return Err(ConfigError::EmptyField("token_class"));
        }
        if class
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>' | '&'))
        {
            return Err(ConfigError::InvalidTokenClass(self.token_class.clone()));
        }
        Ok(())
    }
}
