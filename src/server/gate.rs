use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::error;

use crate::handlers::Handlers;
use crate::services::{StateCatalogService, WorkItemService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    WorkItems,
    States,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::WorkItems => f.write_str("work item"),
            Capability::States => f.write_str("work item states"),
        }
    }
}

/// Static declaration of an exposed tool and the handlers it runs on.
#[derive(Debug)]
pub struct ToolSpec {
    pub name: &'static str,
    pub requires: &'static [Capability],
}

pub const SEARCH_WORK_ITEMS: ToolSpec = ToolSpec {
    name: "search_work_items",
    requires: &[Capability::WorkItems],
};

pub const CREATE_WORK_ITEM: ToolSpec = ToolSpec {
    name: "create_work_item",
    requires: &[Capability::WorkItems],
};

pub const EDIT_WORK_ITEM: ToolSpec = ToolSpec {
    name: "edit_work_item",
    requires: &[Capability::WorkItems],
};

pub const GET_VALID_WORK_ITEM_STATES: ToolSpec = ToolSpec {
    name: "get_valid_work_item_states",
    requires: &[Capability::States],
};

pub const TOOL_SPECS: &[&ToolSpec] = &[
    &SEARCH_WORK_ITEMS,
    &CREATE_WORK_ITEM,
    &EDIT_WORK_ITEM,
    &GET_VALID_WORK_ITEM_STATES,
];

/// A startup or programming defect. Never reported as a structured tool result.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("Service not initialized: {tool} requires the {capability} service")]
    NotInitialized {
        tool: &'static str,
        capability: Capability,
    },
    #[error("{tool} used the {capability} service without declaring it")]
    Undeclared {
        tool: &'static str,
        capability: Capability,
    },
}

/// Services resolved for one tool call, limited to what the tool declared.
pub struct Gated {
    tool: &'static str,
    work_items: Option<Arc<WorkItemService>>,
    states: Option<Arc<StateCatalogService>>,
}

impl Gated {
    pub fn work_items(&self) -> Result<Arc<WorkItemService>, GuardError> {
        self.work_items.clone().ok_or(GuardError::Undeclared {
            tool: self.tool,
            capability: Capability::WorkItems,
        })
    }

    pub fn states(&self) -> Result<Arc<StateCatalogService>, GuardError> {
        self.states.clone().ok_or(GuardError::Undeclared {
            tool: self.tool,
            capability: Capability::States,
        })
    }
}

pub fn gate(handlers: &Handlers, spec: &ToolSpec) -> Result<Gated, GuardError> {
    let mut gated = Gated {
        tool: spec.name,
        work_items: None,
        states: None,
    };
    let missing = |capability| GuardError::NotInitialized {
        tool: spec.name,
        capability,
    };

    for capability in spec.requires {
        match capability {
            Capability::WorkItems => {
                gated.work_items = Some(
                    handlers
                        .work_items
                        .service()
                        .ok_or_else(|| missing(Capability::WorkItems))?,
                );
            }
            Capability::States => {
                gated.states = Some(
                    handlers
                        .states
                        .handler
                        .service()
                        .ok_or_else(|| missing(Capability::States))?,
                );
            }
        }
    }
    Ok(gated)
}

/// Log a guard failure at the point it becomes fatal for the call.
pub fn report(err: GuardError) -> GuardError {
    error!(error = %err, "Service not initialized before tool execution");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ado::mock::MockTracking;
    use crate::services::Connect;

    #[test]
    fn uninitialized_handler_fails_gate() {
        let handlers = Handlers::default();
        let err = gate(&handlers, &SEARCH_WORK_ITEMS).err().unwrap();
        assert_eq!(
            err,
            GuardError::NotInitialized {
                tool: "search_work_items",
                capability: Capability::WorkItems
            }
        );
    }

    #[test]
    fn gate_checks_only_declared_handlers() {
        let mut handlers = Handlers::default();
        handlers.states.handler.install(StateCatalogService::with_backend(
            "proj".into(),
            Arc::new(MockTracking::new()),
        ));
        let gated = gate(&handlers, &GET_VALID_WORK_ITEM_STATES).unwrap();
        assert!(gated.states().is_ok());
        assert!(gate(&handlers, &CREATE_WORK_ITEM).is_err());
    }

    #[test]
    fn undeclared_capability_is_refused() {
        let mut handlers = Handlers::default();
        let backend = Arc::new(MockTracking::new());
        handlers
            .work_items
            .install(WorkItemService::with_backend("proj".into(), backend.clone()));
        handlers
            .states
            .handler
            .install(StateCatalogService::with_backend("proj".into(), backend));

        let gated = gate(&handlers, &EDIT_WORK_ITEM).unwrap();
        assert!(gated.work_items().is_ok());
        assert_eq!(
            gated.states().err(),
            Some(GuardError::Undeclared {
                tool: "edit_work_item",
                capability: Capability::States
            })
        );
    }

    #[test]
    fn every_tool_declares_a_capability() {
        for spec in TOOL_SPECS {
            assert!(!spec.requires.is_empty(), "{} declares nothing", spec.name);
        }
    }
}
