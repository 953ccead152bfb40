//! Tracking and deletion of resources a scenario created.

use serde::Serialize;
use tracing::{info, warn};

use crate::client::ApiClient;
use crate::response::ResourceId;

/// IDs created during a scenario, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatedResources {
    pub sales: Vec<ResourceId>,
    pub plants: Vec<ResourceId>,
}

impl CreatedResources {
    pub fn track_sale(&mut self, id: impl Into<ResourceId>) {
        let id = id.into();
        if !self.sales.contains(&id) {
            self.sales.push(id);
        }
    }

    pub fn track_plant(&mut self, id: impl Into<ResourceId>) {
        let id = id.into();
        if !self.plants.contains(&id) {
            self.plants.push(id);
        }
    }

    /// Stop tracking a sale the scenario already deleted itself
    pub fn forget_sale(&mut self, id: &ResourceId) {
        self.sales.retain(|tracked| tracked != id);
    }

    pub fn forget_plant(&mut self, id: &ResourceId) {
        self.plants.retain(|tracked| tracked != id);
    }

    pub fn is_empty(&self) -> bool {
        self.sales.is_empty() && self.plants.is_empty()
    }

    /// Take everything tracked so far, leaving the tracker empty
    pub fn drain(&mut self) -> CreatedResources {
        std::mem::take(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Sale,
    Plant,
}

impl ResourceKind {
    fn path(&self, id: &ResourceId) -> String {
        match self {
            ResourceKind::Sale => format!("/api/sales/{}", id),
            ResourceKind::Plant => format!("/api/plants/{}", id),
        }
    }
}

/// A deletion that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDeletion {
    pub kind: ResourceKind,
    pub id: ResourceId,
    pub status: u16,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted: Vec<(ResourceKind, ResourceId)>,
    pub failed: Vec<FailedDeletion>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl ApiClient {
    /// Delete the given sales, then the given plants.
    ///
    /// Sales go first because they reference plants. Every deletion is
    /// attempted; failures are logged and collected, never raised.
    pub async fn cleanup(&self, sale_ids: &[ResourceId], plant_ids: &[ResourceId]) -> CleanupReport {
        let mut report = CleanupReport::default();
        let targets = sale_ids
            .iter()
            .map(|id| (ResourceKind::Sale, id))
            .chain(plant_ids.iter().map(|id| (ResourceKind::Plant, id)));

        for (kind, id) in targets {
            let result = self.delete(&kind.path(id)).await;
            if result.is_success() {
                report.deleted.push((kind, id.clone()));
            } else {
                let reason = result
                    .message()
                    .map(str::to_string)
                    .unwrap_or_else(|| result.data.to_string());
                warn!(?kind, %id, status = result.status, %reason, "Cleanup deletion failed");
                report.failed.push(FailedDeletion {
                    kind,
                    id: id.clone(),
                    status: result.status,
                    reason,
                });
            }
        }

        if !report.deleted.is_empty() || !report.failed.is_empty() {
            info!(
                deleted = report.deleted.len(),
                failed = report.failed.len(),
                "Cleanup finished"
            );
        }
        report
    }

    /// Delete everything in `resources`, sales first
    pub async fn cleanup_tracked(&self, resources: &CreatedResources) -> CleanupReport {
        self.cleanup(&resources.sales, &resources.plants).await
    }
}
