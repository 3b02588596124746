use indexmap::IndexMap;
use serde::Deserialize;

/// State name to its valid reasons, in the order the backend reports states.
pub type StateReasons = IndexMap<String, Vec<String>>;

/// Work item type name to its [`StateReasons`].
pub type StateCatalog = IndexMap<String, StateReasons>;

#[derive(Debug, Clone, Deserialize)]
pub struct WorkItemTypeInfo {
    pub name: String,
    #[serde(default)]
    pub states: Vec<WorkItemStateInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkItemStateInfo {
    pub name: String,
    #[serde(default)]
    pub reasons: Option<Vec<ReasonInfo>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReasonInfo {
    pub name: String,
}

/// Placeholder used when the backend reports no reasons for a state.
pub fn default_reason(state: &str) -> String {
    format!("Changed to {state}")
}

impl WorkItemTypeInfo {
    /// Valid reasons per state; states without reported reasons get [`default_reason`].
    pub fn state_reasons(&self) -> StateReasons {
        self.states
            .iter()
            .map(|state| {
                let reasons: Vec<String> = state
                    .reasons
                    .iter()
                    .flatten()
                    .map(|r| r.name.clone())
                    .collect();
                let reasons = if reasons.is_empty() {
                    tracing::debug!(state = %state.name, "No reasons found for state, using default");
                    vec![default_reason(&state.name)]
                } else {
                    reasons
                };
                (state.name.clone(), reasons)
            })
            .collect()
    }
}
