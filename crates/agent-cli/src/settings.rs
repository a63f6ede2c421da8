//! Agent settings taken from the environment

use agent_core::{AgentConfig, GenerationOptions};

pub const MODEL_ENV: &str = "AGENT_MODEL";
pub const TEMPERATURE_ENV: &str = "AGENT_TEMPERATURE";
pub const MAX_ITERATIONS_ENV: &str = "AGENT_MAX_ITERATIONS";

#[derive(Clone, Debug, PartialEq)]
pub struct AgentSettings {
    pub model: String,
    pub temperature: f32,
    pub max_iterations: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        let config = AgentConfig::default();
        let generation = GenerationOptions::default();
        Self {
            model: generation.model,
            temperature: generation.temperature,
            max_iterations: config.max_iterations,
        }
    }
}

impl AgentSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset or unparsable values fall back to the defaults
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let model = lookup(MODEL_ENV)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(defaults.model);
        let temperature = parse_or(&lookup, TEMPERATURE_ENV, defaults.temperature);
        let max_iterations = parse_or(&lookup, MAX_ITERATIONS_ENV, defaults.max_iterations);

        Self {
            model,
            temperature,
            max_iterations,
        }
    }

    /// Command-line flags win over the environment
    #[must_use]
    pub fn with_overrides(mut self, model: Option<String>, max_iterations: Option<usize>) -> Self {
        if let Some(model) = model {
            self.model = model;
        }
        if let Some(max) = max_iterations {
            self.max_iterations = max;
        }
        self
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = AgentSettings::from_lookup(lookup(&[]));
        assert_eq!(settings.model, "qwen3:1.7b");
        assert!((settings.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(settings.max_iterations, 10);
    }

    #[test]
    fn test_env_values() {
        let settings = AgentSettings::from_lookup(lookup(&[
            (MODEL_ENV, "llama3.2"),
            (TEMPERATURE_ENV, "0.7"),
            (MAX_ITERATIONS_ENV, "4"),
        ]));
        assert_eq!(settings.model, "llama3.2");
        assert!((settings.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(settings.max_iterations, 4);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let settings = AgentSettings::from_lookup(lookup(&[
            (MODEL_ENV, "  "),
            (MAX_ITERATIONS_ENV, "many"),
        ]));
        assert_eq!(settings, AgentSettings::default());
    }

    #[test]
    fn test_flags_override_env() {
        let settings = AgentSettings::from_lookup(lookup(&[(MODEL_ENV, "llama3.2")]))
            .with_overrides(Some("mistral".into()), Some(2));
        assert_eq!(settings.model, "mistral");
        assert_eq!(settings.max_iterations, 2);
    }
}
