use std::fmt::Write as _;

use haggle_core::config::{AppConfig, LlmProvider, LogFormat};

pub fn run(config: &AppConfig) -> String {
    let provider = match config.llm.provider {
        LlmProvider::OpenAi => "openai",
        LlmProvider::Ollama => "ollama",
    };
    let format = match config.logging.format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    };

    let mut output = String::from("Effective configuration:\n");
    let _ = writeln!(output, "  llm.provider          = {provider}");
    let _ = writeln!(
        output,
        "  llm.api_key           = {}",
        if config.llm.api_key.is_some() { "(set, redacted)" } else { "(not set)" }
    );
    let _ = writeln!(
        output,
        "  llm.base_url          = {}",
        config.llm.base_url.as_deref().unwrap_or("(not set)")
    );
    let _ = writeln!(output, "  llm.model             = {}", config.llm.model);
    let _ = writeln!(output, "  llm.timeout_secs      = {}", config.llm.timeout_secs);
    let _ = writeln!(output, "  llm.max_retries       = {}", config.llm.max_retries);
    let _ = writeln!(output, "  negotiation.floor_pct = {}", config.negotiation.floor_pct);
    let _ = writeln!(output, "  negotiation.currency  = {}", config.negotiation.currency);
    let _ = writeln!(output, "  logging.level         = {}", config.logging.level);
    let _ = write!(output, "  logging.format        = {format}");
    output
}
