use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
///
/// Everything here is fixed for the lifetime of a session; the speech
/// provider and transport are constructed from these values on `connect`.
#[derive(Clone, Debug)]
pub struct Config {
    pub speech_region: String,
    pub speech_api_key: String,
    /// Token endpoint for the realtime-relay credential; defaulted from the
    /// region when not set explicitly.
    pub relay_token_url: String,
    pub tts_voice: String,
    pub stt_locales: Vec<String>,
    /// When false, the microphone auto-stops after each recognized phrase.
    pub continuous_conversation: bool,
    pub avatar_character: String,
    pub avatar_style: String,
    pub backend_base_url: String,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let speech_region = std::env::var("SPEECH_REGION")
            .map_err(|_| ConfigError::MissingVar("SPEECH_REGION".to_string()))?;
        let speech_api_key = std::env::var("SPEECH_API_KEY")
            .map_err(|_| ConfigError::MissingVar("SPEECH_API_KEY".to_string()))?;

        let relay_token_url = std::env::var("RELAY_TOKEN_URL").unwrap_or_else(|_| {
            format!(
                "https://{}.tts.speech.microsoft.com/cognitiveservices/avatar/relay/token/v1",
                speech_region
            )
        });

        let tts_voice = std::env::var("TTS_VOICE")
            .unwrap_or_else(|_| "en-US-AvaMultilingualNeural".to_string());

        let stt_locales_str = std::env::var("STT_LOCALES")
            .unwrap_or_else(|_| "en-US,de-DE,es-ES,fr-FR,it-IT,ja-JP,ko-KR,zh-CN".to_string());
        let stt_locales: Vec<String> = stt_locales_str
            .split(',')
            .map(|locale| locale.trim().to_string())
            .filter(|locale| !locale.is_empty())
            .collect();
        if stt_locales.is_empty() {
            return Err(ConfigError::InvalidValue(
                "STT_LOCALES".to_string(),
                "at least one locale is required".to_string(),
            ));
        }

        let continuous_str =
            std::env::var("CONTINUOUS_CONVERSATION").unwrap_or_else(|_| "true".to_string());
        let continuous_conversation = continuous_str.parse::<bool>().map_err(|_| {
            ConfigError::InvalidValue(
                "CONTINUOUS_CONVERSATION".to_string(),
                format!("'{}' is not a boolean", continuous_str),
            )
        })?;

        let avatar_character =
            std::env::var("AVATAR_CHARACTER").unwrap_or_else(|_| "lisa".to_string());
        let avatar_style =
            std::env::var("AVATAR_STYLE").unwrap_or_else(|_| "casual-sitting".to_string());

        let backend_base_url =
            std::env::var("BACKEND_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            speech_region,
            speech_api_key,
            relay_token_url,
            tts_voice,
            stt_locales,
            continuous_conversation,
            avatar_character,
            avatar_style,
            backend_base_url,
            log_level,
        })
    }
}
