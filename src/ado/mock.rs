use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use super::WorkItemTracking;
use crate::error::{AdoError, ServiceError};
use crate::model::state_catalog::WorkItemTypeInfo;
use crate::model::work_item::{PatchOperation, RawWorkItem};

#[derive(Debug, Clone)]
pub enum MockFailure {
    Connection,
    Service(String),
    Other(String),
}

impl MockFailure {
    fn to_error(&self) -> AdoError {
        match self {
            MockFailure::Connection => AdoError::Connection("connection refused".into()),
            MockFailure::Service(message) => ServiceError {
                status: 400,
                type_key: Some("RuleValidationException".into()),
                message: message.clone(),
            }
            .into(),
            MockFailure::Other(message) => AdoError::Other(anyhow::anyhow!(message.clone())),
        }
    }
}

/// In-memory backend that records every call it receives.
#[derive(Default)]
pub struct MockTracking {
    pub calls: Mutex<Vec<String>>,
    pub queries: Mutex<Vec<String>>,
    pub patches: Mutex<Vec<Vec<PatchOperation>>>,
    pub items: Vec<RawWorkItem>,
    pub types: Vec<WorkItemTypeInfo>,
    pub created_id: i64,
    pub failure: Mutex<Option<MockFailure>>,
    /// Type whose lookup is rejected while listing still succeeds.
    pub failing_type: Option<String>,
}

impl MockTracking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(mut self, items: Vec<RawWorkItem>) -> Self {
        self.items = items;
        self
    }

    pub fn with_types(mut self, types: Vec<WorkItemTypeInfo>) -> Self {
        self.types = types;
        self
    }

    pub fn with_created_id(mut self, id: i64) -> Self {
        self.created_id = id;
        self
    }

    pub fn with_failing_type(mut self, work_item_type: &str) -> Self {
        self.failing_type = Some(work_item_type.to_string());
        self
    }

    pub fn with_failure(self, failure: MockFailure) -> Self {
        self.fail_with(Some(failure));
        self
    }

    pub fn fail_with(&self, failure: Option<MockFailure>) {
        *self.failure.lock().unwrap() = failure;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<(), AdoError> {
        self.calls.lock().unwrap().push(call);
        match self.failure.lock().unwrap().as_ref() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    fn apply(&self, id: i64, work_item_type: Option<&str>, document: &[PatchOperation]) -> RawWorkItem {
        let mut item = self
            .items
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .unwrap_or(RawWorkItem {
                id,
                fields: Default::default(),
                url: None,
            });
        if let Some(t) = work_item_type {
            item.fields.insert("System.WorkItemType".into(), json!(t));
            item.fields.insert("System.State".into(), json!("New"));
        }
        for op in document {
            let field = op.path.trim_start_matches("/fields/").to_string();
            // an empty description comes back absent from the service
            if op.value != json!("") {
                item.fields.insert(field, op.value.clone());
            }
        }
        item
    }
}

pub fn raw_item(id: i64, title: &str, state: &str, work_item_type: &str) -> RawWorkItem {
    serde_json::from_value(json!({
        "id": id,
        "fields": {
            "System.Title": title,
            "System.State": state,
            "System.WorkItemType": work_item_type
        }
    }))
    .unwrap()
}

pub fn type_info(name: &str, states: &[(&str, &[&str])]) -> WorkItemTypeInfo {
    let states: Vec<_> = states
        .iter()
        .map(|(state, reasons)| {
            json!({
                "name": state,
                "reasons": reasons.iter().map(|r| json!({"name": r})).collect::<Vec<_>>()
            })
        })
        .collect();
    serde_json::from_value(json!({"name": name, "states": states})).unwrap()
}

#[async_trait]
impl WorkItemTracking for MockTracking {
    async fn query_by_wiql(
        &self,
        _project: &str,
        query: &str,
        _top: usize,
    ) -> Result<Vec<i64>, AdoError> {
        self.record("query_by_wiql".into())?;
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.items.iter().map(|i| i.id).collect())
    }

    async fn get_work_items(
        &self,
        _project: &str,
        ids: &[i64],
        _fields: &[&str],
    ) -> Result<Vec<RawWorkItem>, AdoError> {
        self.record("get_work_items".into())?;
        // the service returns items in its own order; callers must not rely on it
        let mut found: Vec<RawWorkItem> = self
            .items
            .iter()
            .filter(|i| ids.contains(&i.id))
            .cloned()
            .collect();
        found.reverse();
        Ok(found)
    }

    async fn create_work_item(
        &self,
        _project: &str,
        work_item_type: &str,
        document: &[PatchOperation],
    ) -> Result<RawWorkItem, AdoError> {
        self.record(format!("create_work_item:{work_item_type}"))?;
        self.patches.lock().unwrap().push(document.to_vec());
        Ok(self.apply(self.created_id, Some(work_item_type), document))
    }

    async fn update_work_item(
        &self,
        _project: &str,
        id: i64,
        document: &[PatchOperation],
    ) -> Result<RawWorkItem, AdoError> {
        self.record(format!("update_work_item:{id}"))?;
        self.patches.lock().unwrap().push(document.to_vec());
        Ok(self.apply(id, None, document))
    }

    async fn get_work_item_types(&self, _project: &str) -> Result<Vec<WorkItemTypeInfo>, AdoError> {
        self.record("get_work_item_types".into())?;
        Ok(self.types.clone())
    }

    async fn get_work_item_type(
        &self,
        _project: &str,
        work_item_type: &str,
    ) -> Result<WorkItemTypeInfo, AdoError> {
        self.record(format!("get_work_item_type:{work_item_type}"))?;
        if self.failing_type.as_deref() == Some(work_item_type) {
            return Err(ServiceError {
                status: 500,
                type_key: None,
                message: "boom".into(),
            }
            .into());
        }
        self.types
            .iter()
            .find(|t| t.name == work_item_type)
            .cloned()
            .ok_or_else(|| {
                ServiceError {
                    status: 404,
                    type_key: Some("WorkItemTypeNotFoundException".into()),
                    message: format!("VS402323: Work item type {work_item_type} does not exist."),
                }
                .into()
            })
    }
}
