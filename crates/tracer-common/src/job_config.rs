use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Calculation request assembled from the user's selections.
///
/// Serialized as the body of `POST /api/calculate`. A config is never
/// changed after it has been submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub product_codes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<String>,

    /// Free-text assumption overrides, e.g. "double the base lapse rate if
    /// treasury > 5%".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assumptions_text: Option<String>,

    #[serde(default)]
    pub calculate_stochastic: bool,

    #[serde(default)]
    pub perform_attribution: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_set_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobConfigError {
    #[error("select at least one product code")]
    NoProducts,
    #[error("product codes must not be blank")]
    BlankProductCode,
    #[error("product code '{0}' selected more than once")]
    DuplicateProductCode(String),
    #[error("select a scenario")]
    MissingScenario,
}

impl JobConfig {
    pub fn builder() -> JobConfigBuilder {
        JobConfigBuilder::default()
    }

    pub fn validate(&self, require_scenario: bool) -> Result<(), JobConfigError> {
        if self.product_codes.is_empty() {
            return Err(JobConfigError::NoProducts);
        }
        let mut seen = HashSet::new();
        for code in &self.product_codes {
            if code.trim().is_empty() {
                return Err(JobConfigError::BlankProductCode);
            }
            if !seen.insert(code.as_str()) {
                return Err(JobConfigError::DuplicateProductCode(code.clone()));
            }
        }
        let has_scenario = self
            .scenario_id
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty());
        if require_scenario && !has_scenario {
            return Err(JobConfigError::MissingScenario);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobConfigBuilder {
    config: JobConfig,
}

impl JobConfigBuilder {
    /// Adds a product code, keeping selection order and ignoring repeats
    /// (the form is a set of checkboxes).
    pub fn product(mut self, code: impl Into<String>) -> Self {
        let code = code.into();
        if !self.config.product_codes.contains(&code) {
            self.config.product_codes.push(code);
        }
        self
    }

    pub fn products<I, S>(self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        codes.into_iter().fold(self, |b, code| b.product(code))
    }

    pub fn scenario(mut self, id: impl Into<String>) -> Self {
        self.config.scenario_id = Some(id.into());
        self
    }

    pub fn assumptions(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.config.assumptions_text = if text.trim().is_empty() { None } else { Some(text) };
        self
    }

    pub fn stochastic(mut self, on: bool) -> Self {
        self.config.calculate_stochastic = on;
        self
    }

    pub fn attribution(mut self, on: bool) -> Self {
        self.config.perform_attribution = on;
        self
    }

    pub fn policy_sets<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.policy_set_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> JobConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_products() {
        let cfg = JobConfig::builder().scenario("scen_01").build();
        assert_eq!(cfg.validate(true), Err(JobConfigError::NoProducts));
    }

    #[test]
    fn test_validate_scenario_depends_on_mode() {
        let cfg = JobConfig::builder().product("SPDA_G3").build();
        assert_eq!(cfg.validate(true), Err(JobConfigError::MissingScenario));
        assert_eq!(cfg.validate(false), Ok(()));

        let blank = JobConfig::builder().product("SPDA_G3").scenario("  ").build();
        assert_eq!(blank.validate(true), Err(JobConfigError::MissingScenario));
    }

    #[test]
    fn test_validate_rejects_blank_and_duplicate_codes() {
        let mut cfg = JobConfig::builder().product("SPDA_G3").scenario("s").build();
        cfg.product_codes.push(" ".into());
        assert_eq!(cfg.validate(true), Err(JobConfigError::BlankProductCode));

        cfg.product_codes = vec!["A".into(), "A".into()];
        assert_eq!(
            cfg.validate(true),
            Err(JobConfigError::DuplicateProductCode("A".into()))
        );
    }

    #[test]
    fn test_builder_keeps_order_and_dedups() {
        let cfg = JobConfig::builder()
            .products(["VA_GLWB5", "SPDA_G3", "VA_GLWB5"])
            .assumptions("   ")
            .build();
        assert_eq!(cfg.product_codes, vec!["VA_GLWB5", "SPDA_G3"]);
        assert_eq!(cfg.assumptions_text, None);
    }

    #[test]
    fn test_wire_shape() {
        let cfg = JobConfig::builder()
            .product("SPDA_G3")
            .scenario("scen_02")
            .stochastic(true)
            .build();
        let v = serde_json::to_value(&cfg).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "product_codes": ["SPDA_G3"],
                "scenario_id": "scen_02",
                "calculate_stochastic": true,
                "perform_attribution": false,
            })
        );
    }
}
