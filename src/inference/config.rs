use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Weight precision requested from the inference server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantization {
    #[default]
    #[serde(rename = "4bit")]
    FourBit,
    #[serde(rename = "8bit")]
    EightBit,
    #[serde(rename = "none")]
    None,
}

impl Quantization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FourBit => "4bit",
            Self::EightBit => "8bit",
            Self::None => "none",
        }
    }

    /// Ollama tag suffix for this precision.
    pub fn tag_suffix(&self) -> &'static str {
        match self {
            Self::FourBit => "q4_k_m",
            Self::EightBit => "q8_0",
            Self::None => "fp16",
        }
    }
}

impl fmt::Display for Quantization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quantization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "4bit" => Ok(Self::FourBit),
            "8bit" => Ok(Self::EightBit),
            "none" => Ok(Self::None),
            other => Err(format!("expected one of 4bit, 8bit, none; got '{other}'")),
        }
    }
}

/// Sampling parameters, serialized as Ollama `options`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Maximum new tokens.
    pub num_predict: i32,
    pub temperature: f32,
    pub top_p: f32,
    pub repeat_penalty: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            num_predict: 512,
            temperature: 0.7,
            top_p: 0.9,
            repeat_penalty: 1.1,
            num_ctx: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_name: String,
    pub quantization: Quantization,
    pub generation: GenerationOptions,
    pub context_length: u32,
    pub request_timeout: Duration,
}

impl ModelConfig {
    pub fn new(model_name: &str, quantization: Quantization) -> Self {
        Self {
            model_name: model_name.trim().to_string(),
            quantization,
            generation: GenerationOptions::default(),
            context_length: 2048,
            request_timeout: Duration::from_secs(60),
        }
    }

    /// Name sent to Ollama. An explicit tag in the configured name wins;
    /// otherwise the quantization picks the tag.
    pub fn ollama_tag(&self) -> String {
        if self.model_name.contains(':') {
            self.model_name.clone()
        } else {
            format!("{}:{}", self.model_name, self.quantization.tag_suffix())
        }
    }

    /// Options for a normal request, with the context window pinned.
    pub fn options(&self) -> GenerationOptions {
        GenerationOptions {
            num_ctx: Some(self.context_length),
            ..self.generation.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantization_parses_case_insensitively() {
        assert_eq!("4BIT".parse::<Quantization>().unwrap(), Quantization::FourBit);
        assert_eq!(" 8bit ".parse::<Quantization>().unwrap(), Quantization::EightBit);
        assert_eq!("none".parse::<Quantization>().unwrap(), Quantization::None);
        assert!("2bit".parse::<Quantization>().is_err());
    }

    #[test]
    fn explicit_tag_is_kept() {
        let config = ModelConfig::new("medgemma:7b-q4_k_m", Quantization::EightBit);
        assert_eq!(config.ollama_tag(), "medgemma:7b-q4_k_m");
    }

    #[test]
    fn untagged_model_gets_quantization_suffix() {
        assert_eq!(
            ModelConfig::new("medgemma", Quantization::FourBit).ollama_tag(),
            "medgemma:q4_k_m"
        );
        assert_eq!(
            ModelConfig::new("medgemma", Quantization::EightBit).ollama_tag(),
            "medgemma:q8_0"
        );
        assert_eq!(
            ModelConfig::new("medgemma", Quantization::None).ollama_tag(),
            "medgemma:fp16"
        );
    }

    #[test]
    fn options_serialize_with_ollama_names() {
        let config = ModelConfig::new("medgemma", Quantization::FourBit);
        let json = serde_json::to_value(config.options()).unwrap();
        assert_eq!(json["num_predict"], 512);
        assert_eq!(json["num_ctx"], 2048);
        assert!(json.get("repeat_penalty").is_some());
    }

    #[test]
    fn quantization_serializes_as_label() {
        assert_eq!(serde_json::to_value(Quantization::EightBit).unwrap(), "8bit");
    }
}
