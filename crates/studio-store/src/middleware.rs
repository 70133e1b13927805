//! Context injection: stamps context-sensitive actions with the tab and
//! canvas active at dispatch time.

use crate::action::{Action, ActionContext};
use crate::store::RootState;

/// Stamp `action` with the current context if it needs one and doesn't
/// already carry one. Must run before any reducer sees the action.
pub fn inject_context(state: &RootState, action: &mut Action) {
    if action.context.is_some() || !action.requires_context() {
        return;
    }
    let context = ActionContext::new(state.ui.active_tab, state.canvas.active_canvas_id);
    log::trace!("{} dispatched from {:?}", action.action_type(), context);
    action.context = Some(context);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Tab;
    use crate::canvas_settings::{SettingsAction, SharedToggle};
    use crate::config::StoreConfig;
    use crate::params::ParamsAction;
    use crate::ui::UiAction;
    use studio_core::CanvasId;

    fn state(tab: Tab) -> RootState {
        let mut state = RootState::initial(&StoreConfig::default());
        state.ui.active_tab = tab;
        state
    }

    #[test]
    fn canvas_tab_stamps_active_canvas() {
        let state = state(Tab::Canvas);
        let mut action: Action = ParamsAction::SetSteps(12).into();
        inject_context(&state, &mut action);
        assert_eq!(action.context, Some(ActionContext::canvas(state.canvas.active_canvas_id)));
    }

    #[test]
    fn other_tabs_carry_no_canvas() {
        let state = state(Tab::Upscaling);
        let mut action: Action = ParamsAction::SetSteps(12).into();
        inject_context(&state, &mut action);
        assert_eq!(action.context, Some(ActionContext::tab(Tab::Upscaling)));
    }

    #[test]
    fn targeted_and_context_free_actions_pass_through() {
        let state = state(Tab::Generate);
        let target = ActionContext::canvas(CanvasId::intern("elsewhere"));
        let mut targeted = Action::targeted(ParamsAction::SetSteps(3), target);
        inject_context(&state, &mut targeted);
        assert_eq!(targeted.context, Some(target));

        let mut shared: Action = SettingsAction::Toggled(SharedToggle::DynamicGrid).into();
        inject_context(&state, &mut shared);
        assert_eq!(shared.context, None);

        let mut tab: Action = UiAction::SetActiveTab(Tab::Canvas).into();
        inject_context(&state, &mut tab);
        assert_eq!(tab.context, None);
    }
}
