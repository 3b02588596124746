pub mod client;

use async_trait::async_trait;

use crate::error::AdoError;
use crate::model::state_catalog::WorkItemTypeInfo;
use crate::model::work_item::{PatchOperation, RawWorkItem};

pub use client::AdoClient;

/// Raw Work Item Tracking operations of one Azure DevOps organization.
#[async_trait]
pub trait WorkItemTracking: Send + Sync {
    /// Run a WIQL query and return the matching ids in query order.
    async fn query_by_wiql(&self, project: &str, query: &str, top: usize)
        -> Result<Vec<i64>, AdoError>;

    async fn get_work_items(
        &self,
        project: &str,
        ids: &[i64],
        fields: &[&str],
    ) -> Result<Vec<RawWorkItem>, AdoError>;

    async fn create_work_item(
        &self,
        project: &str,
        work_item_type: &str,
        document: &[PatchOperation],
    ) -> Result<RawWorkItem, AdoError>;

    async fn update_work_item(
        &self,
        project: &str,
        id: i64,
        document: &[PatchOperation],
    ) -> Result<RawWorkItem, AdoError>;

    async fn get_work_item_types(&self, project: &str) -> Result<Vec<WorkItemTypeInfo>, AdoError>;

    async fn get_work_item_type(
        &self,
        project: &str,
        work_item_type: &str,
    ) -> Result<WorkItemTypeInfo, AdoError>;
}

#[cfg(test)]
pub mod mock;
