//! Configuration loading and validation.

use crate::error::{ConfigError, Result};
use anyhow::Context as _;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";
pub const DEFAULT_MODEL: &str = "grok-3-beta";
pub const DEFAULT_IMAGE_MODEL: &str = "grok-2-image";
pub const DEFAULT_ACTIVITY: &str = "Change Me";

/// Top-level Relaybot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Instance root directory (~/.relaybot or RELAYBOT_DIR).
    pub instance_dir: PathBuf,
    pub discord: DiscordConfig,
    pub llm: LlmConfig,
    pub limits: LimitsConfig,
    pub features: FeaturesConfig,
}

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub token: String,
    /// Custom activity status set once the gateway is ready.
    pub activity: String,
}

/// Language-model endpoint settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Token budget for regular answers.
    pub max_response_tokens: u32,
    /// Token budget for answers to simple questions.
    pub short_response_tokens: u32,
    pub image_model: String,
    pub timeout_secs: u64,
}

/// Size limits applied to history, replies and attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitsConfig {
    pub max_history_chars: usize,
    /// Generated text is cut to this many characters before sending.
    pub max_reply_chars: usize,
    /// Hard platform limit; anything longer is refused before transmission.
    pub platform_ceiling: usize,
    pub pdf_max_pages: usize,
    pub pdf_max_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_history_chars: 100_000,
            max_reply_chars: 1800,
            platform_ceiling: 2000,
            pdf_max_pages: 5,
            pdf_max_chars: 3000,
        }
    }
}

/// Whether image generation requests reach the image endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageGenerationMode {
    #[default]
    Disabled,
    Enabled,
}

/// How uploaded images are answered. Neither mode analyses the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageUploadMode {
    #[default]
    Unsupported,
    Acknowledge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeaturesConfig {
    pub image_generation: ImageGenerationMode,
    pub image_uploads: ImageUploadMode,
}

impl std::str::FromStr for ImageGenerationMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "disabled" | "off" => Ok(Self::Disabled),
            "enabled" | "on" => Ok(Self::Enabled),
            _ => Err(ConfigError::UnknownMode {
                field: "features.image_generation",
                value: value.to_string(),
            }),
        }
    }
}

impl std::str::FromStr for ImageUploadMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "unsupported" => Ok(Self::Unsupported),
            "acknowledge" => Ok(Self::Acknowledge),
            _ => Err(ConfigError::UnknownMode {
                field: "features.image_uploads",
                value: value.to_string(),
            }),
        }
    }
}

// -- TOML schema --

#[derive(Deserialize, Default)]
struct TomlConfig {
    #[serde(default)]
    discord: TomlDiscordConfig,
    #[serde(default)]
    llm: TomlLlmConfig,
    #[serde(default)]
    limits: TomlLimitsConfig,
    #[serde(default)]
    features: TomlFeaturesConfig,
}

#[derive(Deserialize, Default)]
struct TomlDiscordConfig {
    token: Option<String>,
    activity: Option<String>,
}

#[derive(Deserialize, Default)]
struct TomlLlmConfig {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_response_tokens: Option<u32>,
    short_response_tokens: Option<u32>,
    image_model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Deserialize, Default)]
struct TomlLimitsConfig {
    max_history_chars: Option<usize>,
    max_reply_chars: Option<usize>,
    platform_ceiling: Option<usize>,
    pdf_max_pages: Option<usize>,
    pdf_max_chars: Option<usize>,
}

#[derive(Deserialize, Default)]
struct TomlFeaturesConfig {
    image_generation: Option<String>,
    image_uploads: Option<String>,
}

/// Resolve a value that might be an "env:VAR_NAME" reference.
fn resolve_env_value(value: &str, env: &dyn Fn(&str) -> Option<String>) -> Option<String> {
    if let Some(var_name) = value.strip_prefix("env:") {
        env(var_name)
    } else {
        Some(value.to_string())
    }
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

impl Config {
    /// Resolve the instance directory from env or default (~/.relaybot).
    pub fn default_instance_dir() -> PathBuf {
        std::env::var("RELAYBOT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|d| d.join(".relaybot"))
                    .unwrap_or_else(|| PathBuf::from("./.relaybot"))
            })
    }

    /// Load configuration from the default config file, falling back to env vars.
    pub fn load() -> Result<Self> {
        let instance_dir = Self::default_instance_dir();

        let config_path = instance_dir.join("config.toml");
        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::load_from_env(&instance_dir)
        }
    }

    /// Load from a specific TOML config file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let instance_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        Self::from_toml(toml_config, instance_dir, &process_env)
    }

    /// Load from environment variables only (no config file).
    pub fn load_from_env(instance_dir: &Path) -> Result<Self> {
        Self::from_toml(
            TomlConfig::default(),
            instance_dir.to_path_buf(),
            &process_env,
        )
    }

    fn from_toml(
        toml: TomlConfig,
        instance_dir: PathBuf,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let discord_token = toml
            .discord
            .token
            .as_deref()
            .and_then(|value| resolve_env_value(value, env))
            .filter(|value| !value.trim().is_empty())
            .or_else(|| env("DISCORD_TOKEN"))
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingSecret("DISCORD_TOKEN"))?;

        let api_key = toml
            .llm
            .api_key
            .as_deref()
            .and_then(|value| resolve_env_value(value, env))
            .filter(|value| !value.trim().is_empty())
            .or_else(|| env("GROK_API_KEY"))
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingSecret("GROK_API_KEY"))?;

        let defaults = LimitsConfig::default();
        let limits = LimitsConfig {
            max_history_chars: toml
                .limits
                .max_history_chars
                .unwrap_or(defaults.max_history_chars),
            max_reply_chars: toml
                .limits
                .max_reply_chars
                .unwrap_or(defaults.max_reply_chars),
            platform_ceiling: toml
                .limits
                .platform_ceiling
                .unwrap_or(defaults.platform_ceiling),
            pdf_max_pages: toml.limits.pdf_max_pages.unwrap_or(defaults.pdf_max_pages),
            pdf_max_chars: toml.limits.pdf_max_chars.unwrap_or(defaults.pdf_max_chars),
        };

        let features = FeaturesConfig {
            image_generation: toml
                .features
                .image_generation
                .or_else(|| env("RELAYBOT_IMAGE_GENERATION"))
                .map(|value| value.parse::<ImageGenerationMode>())
                .transpose()?
                .unwrap_or_default(),
            image_uploads: toml
                .features
                .image_uploads
                .or_else(|| env("RELAYBOT_IMAGE_UPLOADS"))
                .map(|value| value.parse::<ImageUploadMode>())
                .transpose()?
                .unwrap_or_default(),
        };

        let config = Self {
            instance_dir,
            discord: DiscordConfig {
                token: discord_token,
                activity: toml
                    .discord
                    .activity
                    .unwrap_or_else(|| DEFAULT_ACTIVITY.into()),
            },
            llm: LlmConfig {
                api_key,
                base_url: toml
                    .llm
                    .base_url
                    .or_else(|| env("GROK_BASE_URL"))
                    .unwrap_or_else(|| DEFAULT_BASE_URL.into()),
                model: toml
                    .llm
                    .model
                    .or_else(|| env("GROK_MODEL"))
                    .unwrap_or_else(|| DEFAULT_MODEL.into()),
                temperature: toml.llm.temperature.unwrap_or(0.7),
                max_response_tokens: toml.llm.max_response_tokens.unwrap_or(400),
                short_response_tokens: toml.llm.short_response_tokens.unwrap_or(70),
                image_model: toml
                    .llm
                    .image_model
                    .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.into()),
                timeout_secs: toml.llm.timeout_secs.unwrap_or(120),
            },
            limits,
            features,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        let limits = &self.limits;
        let positive = [
            ("limits.max_history_chars", limits.max_history_chars),
            ("limits.max_reply_chars", limits.max_reply_chars),
            ("limits.platform_ceiling", limits.platform_ceiling),
            ("limits.pdf_max_pages", limits.pdf_max_pages),
            ("limits.pdf_max_chars", limits.pdf_max_chars),
        ];
        if let Some(&(field, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid {
                field,
                reason: "must be greater than zero".into(),
            });
        }

        if limits.max_reply_chars > limits.platform_ceiling {
            return Err(ConfigError::Invalid {
                field: "limits.max_reply_chars",
                reason: format!(
                    "{} exceeds the platform ceiling of {}",
                    limits.max_reply_chars, limits.platform_ceiling
                ),
            });
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid {
                field: "llm.temperature",
                reason: format!("{} is outside 0.0..=2.0", self.llm.temperature),
            });
        }

        Ok(())
    }
}
