use std::time::Duration;

use serde_json::Value;
use tracer_client::ClientConfig;
use tracer_common::JobConfig;

use crate::args::Args;

pub fn build_client_config(args: &Args) -> ClientConfig {
    let mut config = ClientConfig::new(args.api_url.trim_end_matches('/'));
    config.poll_interval = Duration::from_secs(args.poll_interval_secs.max(1));
    config
}

pub fn build_job_config(
    products: Vec<String>,
    scenario: Option<String>,
    assumptions: Option<String>,
    stochastic: bool,
    attribution: bool,
    policy_sets: Vec<String>,
) -> JobConfig {
    let mut builder = JobConfig::builder()
        .products(products.into_iter().map(|p| p.trim().to_string()))
        .stochastic(stochastic)
        .attribution(attribution)
        .policy_sets(policy_sets);
    if let Some(s) = scenario.filter(|s| !s.trim().is_empty()) {
        builder = builder.scenario(s);
    }
    if let Some(a) = assumptions {
        builder = builder.assumptions(a);
    }
    builder.build()
}

/// `--value 120` edits a number, `--value '"120"'` or `--value abc` a string.
pub fn parse_cell_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_job_config() {
        let cfg = build_job_config(
            vec![" TERM10".into(), "UL".into(), "TERM10".into()],
            Some("  ".into()),
            Some(String::new()),
            true,
            false,
            vec!["7".into()],
        );
        assert_eq!(cfg.product_codes, vec!["TERM10", "UL"]);
        assert!(cfg.scenario_id.is_none());
        assert!(cfg.assumptions_text.is_none());
        assert!(cfg.calculate_stochastic);
        assert_eq!(cfg.policy_set_ids, vec!["7"]);
    }

    #[test]
    fn test_parse_cell_value() {
        assert_eq!(parse_cell_value("120"), Value::from(120));
        assert_eq!(parse_cell_value("abc"), Value::from("abc"));
        assert_eq!(parse_cell_value("\"120\""), Value::from("120"));
    }
}
