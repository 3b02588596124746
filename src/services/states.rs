use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{error, info};

use super::Connect;
use crate::ado::WorkItemTracking;
use crate::error::AdoError;
use crate::model::state_catalog::{StateCatalog, StateReasons};

/// Valid states and transition reasons per work item type.
pub struct StateCatalogService {
    project: String,
    backend: Arc<dyn WorkItemTracking>,
}

impl Connect for StateCatalogService {
    const NAME: &'static str = "WorkItemStatesService";

    fn with_backend(project: String, backend: Arc<dyn WorkItemTracking>) -> Self {
        Self { project, backend }
    }
}

impl StateCatalogService {
    pub async fn list_types(&self) -> Result<Vec<String>, AdoError> {
        info!(project = %self.project, "Getting work item types");
        let types = self
            .backend
            .get_work_item_types(&self.project)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to get work item types");
                AdoError::backend("Failed to get work item types", e)
            })?;
        Ok(types.into_iter().map(|t| t.name).collect())
    }

    pub async fn valid_states(&self, work_item_type: &str) -> Result<StateReasons, AdoError> {
        info!(project = %self.project, work_item_type, "Getting valid states");
        let info = self
            .backend
            .get_work_item_type(&self.project, work_item_type)
            .await
            .map_err(|e| {
                error!(work_item_type, error = %e, "Failed to get valid states");
                AdoError::backend(format!("Failed to get valid states for {work_item_type}"), e)
            })?;
        Ok(info.state_reasons())
    }

    /// States for every type in the project. Any failure fails the whole catalog.
    pub async fn all_states(&self) -> Result<StateCatalog, AdoError> {
        info!(project = %self.project, "Getting all work item types and states");
        let build = async {
            let types = self.list_types().await?;
            let per_type = try_join_all(types.iter().map(|t| self.valid_states(t))).await?;
            Ok::<_, AdoError>(types.into_iter().zip(per_type).collect::<StateCatalog>())
        };
        build.await.map_err(|e| {
            error!(error = %e, "Failed to get all work item states");
            AdoError::backend("Failed to get all work item states", e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ado::mock::{type_info, MockFailure, MockTracking};
    use crate::error::{ErrorCategory, ErrorResult};
    use crate::handlers::StatesHandler;

    fn catalog_mock() -> Arc<MockTracking> {
        Arc::new(MockTracking::new().with_types(vec![
            type_info("Task", &[("New", &[]), ("Active", &["Started work"]), ("Done", &["Completed"])]),
            type_info("Bug", &[("New", &["New"]), ("Resolved", &["Fixed", "Duplicate"])]),
        ]))
    }

    fn service(mock: &Arc<MockTracking>) -> StateCatalogService {
        StateCatalogService::with_backend("proj".into(), mock.clone())
    }

    #[tokio::test]
    async fn lists_type_names() {
        let mock = catalog_mock();
        let types = service(&mock).list_types().await.unwrap();
        assert_eq!(types, vec!["Task", "Bug"]);
    }

    #[tokio::test]
    async fn missing_reasons_get_default() {
        let mock = catalog_mock();
        let states = service(&mock).valid_states("Task").await.unwrap();
        assert_eq!(states["New"], vec!["Changed to New"]);
        assert_eq!(states["Active"], vec!["Started work"]);
        let order: Vec<&str> = states.keys().map(String::as_str).collect();
        assert_eq!(order, ["New", "Active", "Done"]);
    }

    #[tokio::test]
    async fn all_states_covers_every_type() {
        let mock = catalog_mock();
        let catalog = service(&mock).all_states().await.unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog["Bug"]["Resolved"], vec!["Fixed", "Duplicate"]);
        assert_eq!(catalog["Task"]["Done"], vec!["Completed"]);
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn unknown_type_is_wrapped_backend_error() {
        let mock = catalog_mock();
        let err = service(&mock).valid_states("Epic").await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to get valid states for Epic: "));
        assert_eq!(ErrorResult::classify(&err).error, ErrorCategory::AzureDevOps);
    }

    #[tokio::test]
    async fn all_states_fails_without_partial_results() {
        let mock = catalog_mock();
        mock.fail_with(Some(MockFailure::Other("socket closed".into())));
        let err = service(&mock).all_states().await.unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Failed to get all work item states: Failed to get work item types"));
        assert_eq!(ErrorResult::classify(&err), ErrorResult::server());
    }

    #[tokio::test]
    async fn one_failing_type_fails_whole_catalog() {
        let mock = Arc::new(
            MockTracking::new()
                .with_types(vec![
                    type_info("Task", &[("New", &[])]),
                    type_info("Bug", &[("Active", &["Approved"])]),
                ])
                .with_failing_type("Bug"),
        );
        let err = service(&mock).all_states().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to get all work item states: Failed to get valid states for Bug: boom"
        );
        assert_eq!(ErrorResult::classify(&err).error, ErrorCategory::AzureDevOps);
        assert!(mock.calls().contains(&"get_work_item_type:Task".to_string()));
    }

    #[tokio::test]
    async fn failed_type_leaves_cache_unset() {
        let mock = Arc::new(
            MockTracking::new()
                .with_types(vec![type_info("Task", &[("New", &[])]), type_info("Bug", &[])])
                .with_failing_type("Bug"),
        );
        let mut handler = StatesHandler::default();
        handler
            .handler
            .install(StateCatalogService::with_backend("proj".into(), mock.clone()));
        handler.preload_cache().await;
        assert!(handler.cached().is_none());
    }

    #[tokio::test]
    async fn connection_failure_stays_connection() {
        let mock = catalog_mock();
        mock.fail_with(Some(MockFailure::Connection));
        let err = service(&mock).all_states().await.unwrap_err();
        assert_eq!(ErrorResult::classify(&err).error, ErrorCategory::Connection);
    }
}
