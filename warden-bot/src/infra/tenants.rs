use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use tracing::debug;
use warden_core::lifecycle::ports::{TenantDirectory, TenantRecord};

/// Tenant records read from a JSON array of `{tenant_id, attributes}`.
///
/// Without a path configured no tenant is ever found.
#[derive(Debug, Clone, Default)]
pub struct JsonTenantDirectory {
    path: Option<PathBuf>,
}

impl JsonTenantDirectory {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl TenantDirectory for JsonTenantDirectory {
    async fn find_tenant(&self, tenant_id: &str) -> anyhow::Result<Option<TenantRecord>> {
        let Some(path) = self.path.clone() else {
            debug!(tenant_id, "no tenant directory configured");
            return Ok(None);
        };

        let records: Vec<TenantRecord> = tokio::task::spawn_blocking(move || {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read tenant directory {}", path.display()))?;
            serde_json::from_str::<Vec<TenantRecord>>(&contents)
                .with_context(|| format!("failed to parse tenant directory {}", path.display()))
        })
        .await??;

        Ok(records
            .into_iter()
            .find(|record| record.tenant_id == tenant_id.trim()))
    }
}
