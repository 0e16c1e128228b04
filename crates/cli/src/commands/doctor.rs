use std::fmt::Write as _;

use haggle_core::config::{AppConfig, LlmProvider};
use haggle_core::FloorRule;
use serde::Serialize;

use crate::catalog;

#[derive(Debug, Serialize)]
struct Check {
    name: &'static str,
    ok: bool,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    ok: bool,
    checks: Vec<Check>,
}

pub fn run(config: &AppConfig, json: bool) -> String {
    let report = build_report(config);
    if json {
        return serde_json::to_string_pretty(&report)
            .unwrap_or_else(|error| format!("{{\"error\":\"{error}\"}}"));
    }

    let mut output = String::new();
    for check in &report.checks {
        let status = if check.ok { "ok " } else { "FAIL" };
        let _ = writeln!(output, "[{status}] {:<24} {}", check.name, check.detail);
    }
    let _ = write!(
        output,
        "{}",
        if report.ok { "All checks passed." } else { "One or more checks failed." }
    );
    output
}

fn build_report(config: &AppConfig) -> DoctorReport {
    let mut checks = Vec::new();

    let credential_ok = match config.llm.provider {
        LlmProvider::OpenAi => config.llm.api_key.is_some(),
        LlmProvider::Ollama => config.llm.base_url.is_some(),
    };
    checks.push(Check {
        name: "gateway.credentials",
        ok: credential_ok,
        detail: match config.llm.provider {
            LlmProvider::OpenAi => "api key configured for openai".to_owned(),
            LlmProvider::Ollama => {
                format!("base url {}", config.llm.base_url.as_deref().unwrap_or("(missing)"))
            }
        },
    });

    checks.push(Check {
        name: "gateway.model",
        ok: !config.llm.model.trim().is_empty(),
        detail: config.llm.model.clone(),
    });

    let cart = catalog::demo_cart();
    let rule = FloorRule { floor_pct: config.negotiation.floor_pct };
    let floor = rule.compute_floor(cart.total());
    checks.push(Check {
        name: "negotiation.floor",
        ok: floor <= cart.total(),
        detail: format!(
            "demo cart total {total}, floor {floor} ({pct}%)",
            total = cart.total(),
            pct = config.negotiation.floor_pct
        ),
    });

    let ok = checks.iter().all(|check| check.ok);
    DoctorReport { ok, checks }
}
