use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const FIELD_TITLE: &str = "System.Title";
pub const FIELD_STATE: &str = "System.State";
pub const FIELD_TYPE: &str = "System.WorkItemType";
pub const FIELD_REASON: &str = "System.Reason";
pub const FIELD_DESCRIPTION: &str = "System.Description";

/// Fields requested when fetching work item details.
pub const DETAIL_FIELDS: &[&str] = &[
    "System.Id",
    FIELD_TITLE,
    FIELD_STATE,
    FIELD_TYPE,
    FIELD_REASON,
    FIELD_DESCRIPTION,
];

/// Work item as returned by the Azure DevOps REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct RawWorkItem {
    pub id: i64,
    #[serde(default)]
    pub fields: HashMap<String, Value>,
    pub url: Option<String>,
}

impl RawWorkItem {
    fn text(&self, field: &str) -> Option<String> {
        self.fields
            .get(field)
            .and_then(Value::as_str)
            .map(String::from)
    }
}

/// Caller-facing projection of a work item. Absent fields are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub work_item_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<RawWorkItem> for WorkItem {
    fn from(raw: RawWorkItem) -> Self {
        WorkItem {
            id: raw.id,
            title: raw.text(FIELD_TITLE),
            state: raw.text(FIELD_STATE),
            work_item_type: raw.text(FIELD_TYPE),
            reason: raw.text(FIELD_REASON),
            description: raw.text(FIELD_DESCRIPTION),
            url: raw.url,
        }
    }
}

/// Result of an edit: either the updated item or a no-op notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UpdateOutcome {
    Updated(WorkItem),
    Unchanged { id: i64, message: String },
}

/// Optional fields of an edit. `None` leaves the backend value unchanged.
#[derive(Debug, Clone, Default)]
pub struct WorkItemUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub state: Option<String>,
    pub reason: Option<String>,
}

/// One entry of a JSON Patch document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchOperation {
    pub op: &'static str,
    pub path: String,
    pub value: Value,
}

impl PatchOperation {
    pub fn add(field: &str, value: impl Into<Value>) -> Self {
        Self {
            op: "add",
            path: format!("/fields/{field}"),
            value: value.into(),
        }
    }
}

/// Build a patch document from `(field, value)` pairs, skipping unset values.
pub fn build_patch_document(fields: &[(&str, Option<String>)]) -> Vec<PatchOperation> {
    fields
        .iter()
        .filter_map(|(field, value)| {
            value
                .as_ref()
                .map(|v| PatchOperation::add(field, v.as_str()))
        })
        .collect()
}
