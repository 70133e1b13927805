//! UI slice: which tab is showing. Not persisted.

use crate::action::Tab;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    pub active_tab: Tab,
}

impl UiState {
    pub fn new(active_tab: Tab) -> Self {
        Self { active_tab }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    SetActiveTab(Tab),
}

impl UiAction {
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::SetActiveTab(_) => "ui/setActiveTab",
        }
    }
}

pub fn reduce_ui(state: &mut UiState, action: &UiAction) {
    match action {
        UiAction::SetActiveTab(tab) => state.active_tab = *tab,
    }
}
