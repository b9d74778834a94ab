use tracer_common::{CatalogEntry, PolicySetSummary};

use crate::error::ClientError;
use crate::request::{ApiClient, RequestOptions};

/// Reference lists for the calculation form.
#[derive(Debug, Clone)]
pub struct Catalog {
    api: ApiClient,
}

impl Catalog {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn policy_sets(&self) -> Result<Vec<CatalogEntry>, ClientError> {
        self.api.get_json("/api/my-policy-sets", RequestOptions::new()).await
    }

    /// Every policy set with its record count and upload date.
    pub async fn policy_set_summaries(&self) -> Result<Vec<PolicySetSummary>, ClientError> {
        self.api.get_json("/api/policy-sets", RequestOptions::new()).await
    }

    pub async fn scenarios(&self) -> Result<Vec<CatalogEntry>, ClientError> {
        self.api.get_json("/api/my-scenarios", RequestOptions::new()).await
    }

    /// Product codes present in the given policy sets.
    pub async fn product_codes(&self, set_ids: &[String]) -> Result<Vec<String>, ClientError> {
        if set_ids.is_empty() {
            return Ok(Vec::new());
        }
        let opts = RequestOptions::new().query("setIds", set_ids.join(","));
        self.api.get_json("/api/product-codes", opts).await
    }
}
