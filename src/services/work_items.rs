use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use super::Connect;
use crate::ado::WorkItemTracking;
use crate::error::AdoError;
use crate::model::work_item::{
    build_patch_document, UpdateOutcome, WorkItem, WorkItemUpdate, DETAIL_FIELDS,
    FIELD_DESCRIPTION, FIELD_REASON, FIELD_STATE, FIELD_TITLE,
};
use crate::util::html::{escape_wiql, format_description};

/// Largest id list the batch details endpoint accepts in one call.
pub const SEARCH_BATCH_LIMIT: usize = 200;

pub const NO_FIELDS_MESSAGE: &str = "no fields to update";

/// Search, create and update work items in one project.
pub struct WorkItemService {
    project: String,
    backend: Arc<dyn WorkItemTracking>,
}

impl Connect for WorkItemService {
    const NAME: &'static str = "WorkItemService";

    fn with_backend(project: String, backend: Arc<dyn WorkItemTracking>) -> Self {
        Self { project, backend }
    }
}

pub fn build_search_query(project: &str, keyword: &str) -> String {
    let mut query = format!(
        "SELECT [System.Id], [System.Title], [System.State], [System.WorkItemType] \
         FROM WorkItems \
         WHERE [System.TeamProject] = '{}' AND [System.WorkItemType] <> ''",
        escape_wiql(project)
    );
    if !keyword.is_empty() {
        query.push_str(&format!(" AND [System.Title] CONTAINS '{}'", escape_wiql(keyword)));
    }
    query.push_str(" ORDER BY [System.ChangedDate] DESC");
    query
}

impl WorkItemService {
    #[cfg(test)]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Items whose title contains `keyword`, most recently changed first.
    /// An empty keyword matches every item in the project.
    pub async fn search(&self, keyword: &str) -> Result<Vec<WorkItem>, AdoError> {
        let keyword = keyword.trim();
        info!(project = %self.project, keyword, "Searching work items");

        let query = build_search_query(&self.project, keyword);
        let ids = self
            .backend
            .query_by_wiql(&self.project, &query, SEARCH_BATCH_LIMIT)
            .await?;
        if ids.is_empty() {
            info!("No work items found matching the query");
            return Ok(Vec::new());
        }

        info!(count = ids.len(), "Found work item references, fetching details");
        let raw = self
            .backend
            .get_work_items(&self.project, &ids, DETAIL_FIELDS)
            .await?;

        // keep the query's change-date ordering regardless of how details come back
        let rank: HashMap<i64, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut items: Vec<WorkItem> = raw.into_iter().map(WorkItem::from).collect();
        items.sort_by_key(|item| rank.get(&item.id).copied().unwrap_or(usize::MAX));

        info!(count = items.len(), "Returning work item details");
        Ok(items)
    }

    pub async fn create(
        &self,
        work_item_type: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<WorkItem, AdoError> {
        info!(project = %self.project, work_item_type, title, "Creating work item");
        let document = build_patch_document(&[
            (FIELD_TITLE, Some(title.to_string())),
            (FIELD_DESCRIPTION, Some(format_description(description))),
        ]);

        let created = self
            .backend
            .create_work_item(&self.project, work_item_type, &document)
            .await?;
        info!(work_item_id = created.id, "Created work item");
        Ok(created.into())
    }

    pub async fn update(&self, id: i64, update: WorkItemUpdate) -> Result<UpdateOutcome, AdoError> {
        info!(project = %self.project, work_item_id = id, "Editing work item");

        if update.state.is_some() && update.reason.is_none() {
            warn!(work_item_id = id, "State change requested without a reason");
            return Err(AdoError::validation(
                "A 'reason' must be provided when updating the 'state'.",
            ));
        }

        let document = build_patch_document(&[
            (FIELD_TITLE, update.title),
            (
                FIELD_DESCRIPTION,
                update.description.as_deref().map(|d| format_description(Some(d))),
            ),
            (FIELD_STATE, update.state),
            (FIELD_REASON, update.reason),
        ]);

        if document.is_empty() {
            warn!(work_item_id = id, "No fields provided to update");
            return Ok(UpdateOutcome::Unchanged {
                id,
                message: NO_FIELDS_MESSAGE.to_string(),
            });
        }

        let updated = self
            .backend
            .update_work_item(&self.project, id, &document)
            .await?;
        info!(work_item_id = id, "Updated work item");
        Ok(UpdateOutcome::Updated(updated.into()))
    }
}
