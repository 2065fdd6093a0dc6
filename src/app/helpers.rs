//! Helper functions for CLI operations.
//!
//! Reading input, resolving effective settings from flags and configuration,
//! and building the LLM provider.

use std::{
    fs::read_to_string,
    io::{self, Read},
    path::Path
};

use crate::{
    cli::{Format, GlobalArgs, Provider},
    config::{Config, GuardConfig},
    error::{AppResult, config_error, file_read_error},
    llm::{LlmProvider, OPENAI_BASE_URL},
    output::{OutputFormat, OutputOptions}
};

/// Default Ollama URL used by the `--ollama-url` flag
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Reads text from a file, or from stdin when the path is `-`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or stdin fails.
pub fn read_input(path: &Path) -> AppResult<String> {
    if path.to_str() == Some("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| file_read_error("stdin", e))?;
        Ok(buffer)
    } else {
        read_to_string(path).map_err(|e| file_read_error(&path.display().to_string(), e))
    }
}

/// Converts a CLI format to the output format.
pub fn convert_format(format: Format) -> OutputFormat {
    match format {
        Format::Text => OutputFormat::Text,
        Format::Json => OutputFormat::Json,
        Format::Yaml => OutputFormat::Yaml,
        Format::Csv => OutputFormat::Csv
    }
}

/// Creates output options from the global flags.
pub fn create_output_options(global: &GlobalArgs) -> OutputOptions {
    OutputOptions {
        format:  convert_format(global.output_format),
        colored: !global.no_color,
        verbose: global.verbose
    }
}

/// Applies `--database` and `--timeout-ms` on top of the loaded configuration.
pub fn apply_global_args(config: &mut Config, global: &GlobalArgs) {
    if let Some(path) = &global.database {
        config.database.path = path.clone();
    }
    if let Some(timeout_ms) = global.timeout_ms {
        config.database.timeout_ms = timeout_ms;
    }
}

/// Guard settings with per-command overrides.
pub fn effective_guard(config: &GuardConfig, limit: Option<u64>, strict: bool) -> GuardConfig {
    GuardConfig {
        default_limit: limit.unwrap_or(config.default_limit),
        strict:        strict || config.strict
    }
}

/// Provider from the flag, then configuration, then Ollama.
///
/// # Errors
///
/// Returns an error if the configured provider name is unknown.
pub fn get_effective_provider(
    provider: Option<Provider>,
    config_provider: Option<&str>
) -> AppResult<Provider> {
    if let Some(provider) = provider {
        return Ok(provider);
    }
    match config_provider {
        Some(name) => Provider::from_name(name).ok_or_else(|| {
            config_error(format!(
                "Unknown LLM provider '{}' (expected openai, anthropic or ollama)",
                name
            ))
        }),
        None => Ok(Provider::Ollama)
    }
}

/// Gets the effective model name.
pub fn get_effective_model(
    model: Option<String>,
    config_model: Option<String>,
    provider: &Provider
) -> String {
    model
        .or(config_model)
        .unwrap_or_else(|| provider.default_model().to_string())
}

/// Gets the effective Ollama URL; the flag wins unless left at its default.
pub fn get_effective_ollama_url(url: String, config_url: Option<String>) -> String {
    if url == DEFAULT_OLLAMA_URL {
        config_url.unwrap_or(url)
    } else {
        url
    }
}

/// Builds an LLM provider configuration.
///
/// OpenAI requires an API key unless a custom base URL points at a local
/// OpenAI-compatible server. Anthropic always requires one.
///
/// # Errors
///
/// Returns an error if a cloud provider is selected without an API key.
pub fn build_llm_provider(
    provider: Provider,
    api_key: Option<String>,
    model: String,
    ollama_url: String,
    base_url: Option<String>
) -> AppResult<LlmProvider> {
    match provider {
        Provider::OpenAI => {
            let api_key = match (api_key, &base_url) {
                (Some(key), _) => key,
                (None, Some(_)) => String::from("not-needed"),
                (None, None) => {
                    return Err(config_error(
                        "API key required for OpenAI (use --api-key or LLM_API_KEY)"
                    ));
                }
            };
            Ok(LlmProvider::OpenAI {
                api_key,
                model,
                base_url: base_url.unwrap_or_else(|| OPENAI_BASE_URL.to_string())
            })
        }
        Provider::Anthropic => {
            let key = api_key.ok_or_else(|| {
                config_error("API key required for Anthropic (use --api-key or LLM_API_KEY)")
            })?;
            Ok(LlmProvider::Anthropic {
                api_key: key,
                model
            })
        }
        Provider::Ollama => Ok(LlmProvider::Ollama {
            base_url: ollama_url,
            model
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn global() -> GlobalArgs {
        GlobalArgs {
            database:      None,
            timeout_ms:    None,
            output_format: Format::Text,
            no_color:      false,
            verbose:       false
        }
    }

    #[test]
    fn test_apply_global_args() {
        let mut config = Config::default();
        let args = GlobalArgs {
            database: Some(PathBuf::from("league.db")),
            timeout_ms: Some(250),
            ..global()
        };
        apply_global_args(&mut config, &args);
        assert_eq!(config.database.path, PathBuf::from("league.db"));
        assert_eq!(config.database.timeout_ms, 250);
    }

    #[test]
    fn test_apply_global_args_keeps_config() {
        let mut config = Config::default();
        apply_global_args(&mut config, &global());
        assert_eq!(config.database.path, PathBuf::from("test.db"));
        assert_eq!(config.database.timeout_ms, 5000);
    }

    #[test]
    fn test_effective_guard() {
        let base = GuardConfig::default();
        let guard = effective_guard(&base, Some(5), false);
        assert_eq!(guard.default_limit, 5);
        assert!(!guard.strict);
        assert!(effective_guard(&base, None, true).strict);
        assert_eq!(effective_guard(&base, None, false).default_limit, 50);
    }

    #[test]
    fn test_effective_provider() {
        assert!(matches!(
            get_effective_provider(None, None).unwrap(),
            Provider::Ollama
        ));
        assert!(matches!(
            get_effective_provider(None, Some("OpenAI")).unwrap(),
            Provider::OpenAI
        ));
        assert!(matches!(
            get_effective_provider(Some(Provider::Anthropic), Some("openai")).unwrap(),
            Provider::Anthropic
        ));
        assert!(get_effective_provider(None, Some("bard")).is_err());
    }

    #[test]
    fn test_get_effective_model_default() {
        let model = get_effective_model(None, None, &Provider::OpenAI);
        assert_eq!(model, "gpt-4o-mini");
    }

    #[test]
    fn test_get_effective_model_from_config() {
        let model = get_effective_model(None, Some("claude-3".to_string()), &Provider::Anthropic);
        assert_eq!(model, "claude-3");
    }

    #[test]
    fn test_get_effective_ollama_url() {
        let url = get_effective_ollama_url(
            DEFAULT_OLLAMA_URL.to_string(),
            Some("http://config:11434".to_string())
        );
        assert_eq!(url, "http://config:11434");
        let url = get_effective_ollama_url("http://custom:11434".to_string(), None);
        assert_eq!(url, "http://custom:11434");
    }

    #[test]
    fn test_build_openai_requires_key() {
        let result = build_llm_provider(
            Provider::OpenAI,
            None,
            "gpt-4o-mini".to_string(),
            DEFAULT_OLLAMA_URL.to_string(),
            None
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_build_openai_compatible_without_key() {
        let provider = build_llm_provider(
            Provider::OpenAI,
            None,
            "local-model".to_string(),
            DEFAULT_OLLAMA_URL.to_string(),
            Some("http://localhost:1234/v1".to_string())
        )
        .unwrap();
        match provider {
            LlmProvider::OpenAI {
                base_url, ..
            } => assert_eq!(base_url, "http://localhost:1234/v1"),
            other => panic!("unexpected provider {:?}", other)
        }
    }

    #[test]
    fn test_build_openai_default_base_url() {
        let provider = build_llm_provider(
            Provider::OpenAI,
            Some("sk-test".to_string()),
            "gpt-4o-mini".to_string(),
            DEFAULT_OLLAMA_URL.to_string(),
            None
        )
        .unwrap();
        assert!(matches!(
            provider,
            LlmProvider::OpenAI { base_url, .. } if base_url == OPENAI_BASE_URL
        ));
    }

    #[test]
    fn test_build_anthropic_requires_key() {
        let result = build_llm_provider(
            Provider::Anthropic,
            None,
            "claude-3".to_string(),
            DEFAULT_OLLAMA_URL.to_string(),
            None
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_build_ollama() {
        let provider = build_llm_provider(
            Provider::Ollama,
            None,
            "llama3.2".to_string(),
            DEFAULT_OLLAMA_URL.to_string(),
            None
        )
        .unwrap();
        assert!(matches!(provider, LlmProvider::Ollama { .. }));
    }
}
