//! Model identifiers and per-model sampling configuration

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::prompt::SystemPromptKind;

/// Models with a tuned configuration.
///
/// Any other OpenRouter model id is still accepted; it is sent as-is and
/// uses [`ModelConfig::default_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownModel {
    KimiK2,
    Grok4,
    ClaudeSonnet4,
    Gemini25Pro,
    DeepSeekR1,
    DeepSeekChatV3,
}

impl KnownModel {
    pub const ALL: [KnownModel; 6] = [
        KnownModel::KimiK2,
        KnownModel::Grok4,
        KnownModel::ClaudeSonnet4,
        KnownModel::Gemini25Pro,
        KnownModel::DeepSeekR1,
        KnownModel::DeepSeekChatV3,
    ];

    /// OpenRouter model id.
    pub fn id(&self) -> &'static str {
        match self {
            KnownModel::KimiK2 => "moonshotai/kimi-k2",
            KnownModel::Grok4 => "x-ai/grok-4",
            KnownModel::ClaudeSonnet4 => "anthropic/claude-sonnet-4",
            KnownModel::Gemini25Pro => "google/gemini-2.5-pro",
            KnownModel::DeepSeekR1 => "deepseek/deepseek-r1-0528",
            KnownModel::DeepSeekChatV3 => "deepseek/deepseek-chat-v3-0324",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            KnownModel::KimiK2 => "Kimi K2",
            KnownModel::Grok4 => "Grok-4",
            KnownModel::ClaudeSonnet4 => "Claude Sonnet 4",
            KnownModel::Gemini25Pro => "Gemini 2.5 Pro",
            KnownModel::DeepSeekR1 => "DeepSeek R1",
            KnownModel::DeepSeekChatV3 => "DeepSeek Chat V3",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            KnownModel::KimiK2 => "Moonshot AI model, tuned for Chinese text",
            KnownModel::Grok4 => "xAI flagship model",
            KnownModel::ClaudeSonnet4 => "Anthropic Sonnet model",
            KnownModel::Gemini25Pro => "Google Gemini Pro model",
            KnownModel::DeepSeekR1 => "DeepSeek reasoning model",
            KnownModel::DeepSeekChatV3 => "DeepSeek chat model",
        }
    }

    /// Look up a model by its OpenRouter id.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.id() == id)
    }
}

impl fmt::Display for KnownModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Rough latency class of a model, used to scale request timeouts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Fast,
    #[default]
    Standard,
    /// Reasoning-heavy models that think before answering.
    Reasoning,
}

impl ModelTier {
    pub(crate) fn timeout_factor(&self) -> f64 {
        match self {
            ModelTier::Fast => 1.0,
            ModelTier::Standard => 1.5,
            ModelTier::Reasoning => 2.0,
        }
    }
}

/// Sampling parameters and prompt variant for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_id: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    pub system_prompt: SystemPromptKind,
    pub tier: ModelTier,
}

impl ModelConfig {
    pub const DEFAULT_TEMPERATURE: f32 = 0.3;
    pub const DEFAULT_TOP_P: f32 = 0.9;
    pub const DEFAULT_MAX_TOKENS: u32 = 4000;

    /// Resolve the configuration for a model id.
    ///
    /// Unknown ids get [`default_for`](Self::default_for).
    pub fn for_model(model_id: &str) -> Self {
        match KnownModel::from_id(model_id) {
            Some(known) => Self::known(known),
            None => Self::default_for(model_id),
        }
    }

    /// The fallback record for models without a tuned configuration.
    pub fn default_for(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            temperature: Self::DEFAULT_TEMPERATURE,
            top_p: Self::DEFAULT_TOP_P,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            frequency_penalty: None,
            presence_penalty: None,
            system_prompt: SystemPromptKind::Professional,
            tier: ModelTier::Standard,
        }
    }

    /// The tuned record for a known model.
    pub fn known(model: KnownModel) -> Self {
        let base = Self::default_for(model.id());
        match model {
            KnownModel::ClaudeSonnet4 => Self {
                temperature: 0.2,
                frequency_penalty: Some(0.1),
                presence_penalty: Some(0.1),
                ..base
            },
            KnownModel::Gemini25Pro => Self {
                temperature: 0.25,
                top_p: 0.85,
                system_prompt: SystemPromptKind::Creative,
                tier: ModelTier::Reasoning,
                ..base
            },
            KnownModel::Grok4 => Self {
                system_prompt: SystemPromptKind::Balanced,
                tier: ModelTier::Reasoning,
                ..base
            },
            KnownModel::KimiK2 => Self {
                temperature: 0.2,
                system_prompt: SystemPromptKind::Chinese,
                ..base
            },
            KnownModel::DeepSeekR1 => Self {
                // reasoning models drift at higher temperatures
                temperature: 0.15,
                top_p: 0.95,
                system_prompt: SystemPromptKind::Analytical,
                tier: ModelTier::Reasoning,
                ..base
            },
            KnownModel::DeepSeekChatV3 => Self {
                temperature: 0.25,
                system_prompt: SystemPromptKind::Conversational,
                tier: ModelTier::Fast,
                ..base
            },
        }
    }

    /// Whether this record came from the tuned table.
    pub fn is_tuned(&self) -> bool {
        KnownModel::from_id(&self.model_id).is_some()
    }

    /// Scale a base timeout by this model's tier and the output format.
    ///
    /// Saturates at [`Duration::MAX`] instead of overflowing.
    pub fn timeout(&self, base: Duration, format: super::OutputFormat) -> Duration {
        let factor = self.tier.timeout_factor() * format.timeout_factor();
        Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OutputFormat;

    #[test]
    fn known_ids_round_trip() {
        for model in KnownModel::ALL {
            assert_eq!(KnownModel::from_id(model.id()), Some(model));
        }
        assert_eq!(KnownModel::from_id("openai/gpt-4o"), None);
    }

    #[test]
    fn unknown_model_uses_default_record() {
        let config = ModelConfig::for_model("openai/gpt-4o");
        assert_eq!(config.model_id, "openai/gpt-4o");
        assert_eq!(config.temperature, 0.3);
        assert_eq!(config.top_p, 0.9);
        assert_eq!(config.max_tokens, 4000);
        assert_eq!(config.system_prompt, SystemPromptKind::Professional);
        assert!(config.frequency_penalty.is_none());
        assert!(!config.is_tuned());
    }

    #[test]
    fn claude_carries_penalties() {
        let config = ModelConfig::for_model("anthropic/claude-sonnet-4");
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.frequency_penalty, Some(0.1));
        assert_eq!(config.presence_penalty, Some(0.1));
        assert!(config.is_tuned());
    }

    #[test]
    fn deepseek_r1_is_analytical() {
        let config = ModelConfig::known(KnownModel::DeepSeekR1);
        assert_eq!(config.temperature, 0.15);
        assert_eq!(config.top_p, 0.95);
        assert_eq!(config.system_prompt, SystemPromptKind::Analytical);
    }

    #[test]
    fn timeout_grows_with_tier_and_format() {
        let base = Duration::from_secs(30);
        let fast = ModelConfig::known(KnownModel::DeepSeekChatV3);
        let reasoning = ModelConfig::known(KnownModel::DeepSeekR1);

        assert_eq!(fast.timeout(base, OutputFormat::Svg), Duration::from_secs(30));
        assert_eq!(fast.timeout(base, OutputFormat::Html), Duration::from_secs(45));
        assert_eq!(
            reasoning.timeout(base, OutputFormat::Svg),
            Duration::from_secs(60)
        );
        assert_eq!(
            reasoning.timeout(base, OutputFormat::Html),
            Duration::from_secs(90)
        );
    }

    #[test]
    fn huge_base_timeout_saturates() {
        let config = ModelConfig::known(KnownModel::Grok4);
        let base = Duration::from_secs(u64::MAX / 2);
        assert_eq!(config.timeout(base, OutputFormat::Html), Duration::MAX);
        assert_eq!(
            config.timeout(Duration::MAX, OutputFormat::Svg),
            Duration::MAX
        );
    }
}
