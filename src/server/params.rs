use schemars::JsonSchema;
use serde::Deserialize;

use crate::model::work_item::WorkItemUpdate;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchWorkItemsParams {
    /// Text to match against work item titles. Empty matches every item.
    pub keyword: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateWorkItemParams {
    /// Work item type, e.g. "Task", "Bug" or "User Story".
    pub work_item_type: String,
    pub title: String,
    /// Plain text. Line breaks are preserved.
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EditWorkItemParams {
    pub work_item_id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    /// New state. Requires `reason`.
    pub state: Option<String>,
    /// Reason for the state change; see `get_valid_work_item_states`.
    pub reason: Option<String>,
}

impl EditWorkItemParams {
    pub fn update(&self) -> WorkItemUpdate {
        WorkItemUpdate {
            title: self.title.clone(),
            description: self.description.clone(),
            state: self.state.clone(),
            reason: self.reason.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct GetValidWorkItemStatesParams {
    /// Limit the answer to one type. Omit to get every type.
    pub work_item_type: Option<String>,
}

impl GetValidWorkItemStatesParams {
    /// The requested type, with a blank value meaning all types.
    pub fn work_item_type(&self) -> Option<&str> {
        self.work_item_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}
