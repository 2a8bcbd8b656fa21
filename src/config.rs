use std::str::FromStr;

use thiserror::Error;

use crate::db::models::User;
use crate::extract::{ClaudeProvider, DateExtractor, OpenAiProvider, Summarizer};

const PROVIDER_ENV: &str = "SCHOOLSYNC_PROVIDER";
const MODEL_ENV: &str = "SCHOOLSYNC_MODEL";
const OPENAI_API_KEY_ENV: &str = "SCHOOLSYNC_OPENAI_API_KEY";
const OPENAI_API_URL_ENV: &str = "SCHOOLSYNC_OPENAI_API_URL";
const ANTHROPIC_API_KEY_ENV: &str = "SCHOOLSYNC_ANTHROPIC_API_KEY";
const ANTHROPIC_API_URL_ENV: &str = "SCHOOLSYNC_ANTHROPIC_API_URL";

pub const DEFAULT_LOOKBACK_DAYS: u32 = 14;
pub const DEFAULT_MAX_MESSAGES: usize = 100;
pub const DEFAULT_MESSAGE_DELAY_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing {0}")]
    Missing(String),

    #[error("invalid provider '{0}', expected 'openai' or 'claude'")]
    InvalidProvider(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Claude,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "claude" | "anthropic" => Ok(Self::Claude),
            other => Err(ConfigError::InvalidProvider(other.to_string())),
        }
    }
}

/// Resolved extraction-backend settings. Environment wins over the user row's
/// stored config; the backend is picked by value, never by downcast.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub api_key: String,
    pub model: Option<String>,
    pub api_url: Option<String>,
}

impl ProviderSettings {
    pub fn resolve(user: &User) -> Result<Self, ConfigError> {
        let kind = env_or_config(user, PROVIDER_ENV, "provider")
            .map(|raw| raw.parse::<ProviderKind>())
            .transpose()?
            .unwrap_or(ProviderKind::OpenAi);

        let (key_env, key_config, url_env) = match kind {
            ProviderKind::OpenAi => (OPENAI_API_KEY_ENV, "openai_api_key", OPENAI_API_URL_ENV),
            ProviderKind::Claude => (
                ANTHROPIC_API_KEY_ENV,
                "anthropic_api_key",
                ANTHROPIC_API_URL_ENV,
            ),
        };

        let api_key = env_or_config(user, key_env, key_config)
            .ok_or_else(|| ConfigError::Missing(format!("api key ({key_env}/user config)")))?;

        Ok(Self {
            kind,
            api_key,
            model: env_or_config(user, MODEL_ENV, "model"),
            api_url: std::env::var(url_env)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
        })
    }
}

pub fn build_date_extractor(settings: ProviderSettings) -> Box<dyn DateExtractor> {
    match settings.kind {
        ProviderKind::OpenAi => Box::new(OpenAiProvider::new(
            settings.api_key,
            settings.model,
            settings.api_url,
        )),
        ProviderKind::Claude => Box::new(ClaudeProvider::new(
            settings.api_key,
            settings.model,
            settings.api_url,
        )),
    }
}

pub fn build_summarizer(settings: ProviderSettings) -> Box<dyn Summarizer> {
    match settings.kind {
        ProviderKind::OpenAi => Box::new(OpenAiProvider::new(
            settings.api_key,
            settings.model,
            settings.api_url,
        )),
        ProviderKind::Claude => Box::new(ClaudeProvider::new(
            settings.api_key,
            settings.model,
            settings.api_url,
        )),
    }
}

/// Knobs for one sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub lookback_days: u32,
    pub max_messages: usize,
    pub force: bool,
    /// Courtesy pause after each extraction call; not a correctness knob.
    pub message_delay_ms: u64,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            max_messages: DEFAULT_MAX_MESSAGES,
            force: false,
            message_delay_ms: DEFAULT_MESSAGE_DELAY_MS,
        }
    }
}

/// Environment variable first, then the user's stored JSON config.
pub(crate) fn env_or_config(user: &User, env_name: &str, config_key: &str) -> Option<String> {
    std::env::var(env_name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| {
            user.config
                .as_ref()
                .and_then(|config| config.get(config_key))
                .and_then(|value| value.as_str())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ProviderKind, ProviderSettings, SyncOptions};
    use crate::db::models::User;

    fn user_with_config(config: serde_json::Value) -> User {
        User {
            user_id: "user-1".to_string(),
            email_address: "parent@example.com".to_string(),
            display_name: None,
            enabled: true,
            last_sync: None,
            config: Some(config),
        }
    }

    #[test]
    fn provider_kind_parses_aliases() {
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("Claude".parse::<ProviderKind>().unwrap(), ProviderKind::Claude);
        assert_eq!(
            "anthropic".parse::<ProviderKind>().unwrap(),
            ProviderKind::Claude
        );
        assert!("mistral".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn settings_resolve_from_user_config() {
        let user = user_with_config(json!({
            "provider": "claude",
            "anthropic_api_key": "sk-test",
            "model": "claude-3-5-haiku-latest"
        }));

        let settings = ProviderSettings::resolve(&user).expect("resolve settings");
        assert_eq!(settings.kind, ProviderKind::Claude);
        assert_eq!(settings.api_key, "sk-test");
        assert_eq!(settings.model.as_deref(), Some("claude-3-5-haiku-latest"));
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let user = user_with_config(json!({"provider": "openai"}));
        assert!(ProviderSettings::resolve(&user).is_err());
    }

    #[test]
    fn sync_options_defaults_are_sane() {
        let options = SyncOptions::default();
        assert_eq!(options.lookback_days, 14);
        assert_eq!(options.max_messages, 100);
        assert!(!options.force);
    }
}
