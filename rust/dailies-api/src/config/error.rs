//! Configuration errors.
//!
//! Every message names the offending setting and the `DAILIES__*` variable
//! (or config key) that fixes it, so a failed startup reads as a to-do list.

use thiserror::Error;

/// A rejected configuration, with the fix spelled out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A single setting holds an unusable value.
    #[error("Invalid configuration: {message}\n\nHow to fix: {fix_hint}")]
    Invalid { message: String, fix_hint: String },

    /// Two settings that are fine alone but contradict each other, such as a
    /// keepalive ping that would arrive after the read deadline.
    #[error("Incompatible settings: {first} cannot be used with {second}\n\nReason: {reason}")]
    Incompatible {
        first: String,
        second: String,
        reason: String,
    },

    /// The selected backend needs a setting that resolved to nothing.
    #[error("Missing required configuration: {setting}\n\nRequired for: {required_for}\nSet via: {env_var}")]
    MissingRequired {
        setting: String,
        required_for: String,
        env_var: String,
    },

    /// The configuration asks for something this binary was built without.
    #[error("Feature not available: {feature}\n\nReason: {reason}\nAlternative: {alternative}")]
    FeatureUnavailable {
        feature: String,
        reason: String,
        alternative: String,
    },

    /// Every problem found in one validation pass.
    #[error("Multiple configuration errors:\n{}", numbered(.0))]
    Multiple(Vec<ConfigurationError>),
}

fn numbered(errors: &[ConfigurationError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, err)| format!("\n{}. {err}\n", i + 1))
        .collect()
}

impl ConfigurationError {
    #[must_use]
    pub fn invalid(message: impl Into<String>, fix_hint: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
            fix_hint: fix_hint.into(),
        }
    }

    #[must_use]
    pub fn incompatible(
        first: impl Into<String>,
        second: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Incompatible {
            first: first.into(),
            second: second.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn missing_required(
        setting: impl Into<String>,
        required_for: impl Into<String>,
        env_var: impl Into<String>,
    ) -> Self {
        Self::MissingRequired {
            setting: setting.into(),
            required_for: required_for.into(),
            env_var: env_var.into(),
        }
    }

    #[must_use]
    pub fn feature_unavailable(
        feature: impl Into<String>,
        reason: impl Into<String>,
        alternative: impl Into<String>,
    ) -> Self {
        Self::FeatureUnavailable {
            feature: feature.into(),
            reason: reason.into(),
            alternative: alternative.into(),
        }
    }

    /// Collapse a validation pass: one error stays as-is, more are wrapped.
    #[must_use]
    pub fn multiple(mut errors: Vec<ConfigurationError>) -> Self {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            Self::Multiple(errors)
        }
    }

    #[must_use]
    pub fn is_multiple(&self) -> bool {
        matches!(self, Self::Multiple(_))
    }

    /// Number of problems reported.
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Self::Multiple(errors) => errors.len(),
            _ => 1,
        }
    }
}

/// Result type for configuration validation.
pub type ConfigResult<T> = Result<T, ConfigurationError>;
