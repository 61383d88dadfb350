use crate::action::{ActionIndex, ActionSpace};
use crate::error::ActionSpaceError;
use crate::state::GameStateView;

/// Interface for anything that can take a seat at the table.
///
/// `legal_actions` is never empty; implementations must return one of its entries.
pub trait Bot {
    fn select_action(&mut self, state: &GameStateView, legal_actions: &[ActionIndex])
    -> ActionIndex;

    fn name(&self) -> &str {
        "bot"
    }

    /// Mapping the bot interprets action indices with, if it relies on one.
    fn action_space(&self) -> Option<&ActionSpace> {
        None
    }

    /// Fails when the bot would read `space`'s indices as different actions.
    fn check_action_space(&self, space: &ActionSpace) -> Result<(), ActionSpaceError> {
        match self.action_space() {
            Some(own) => own.ensure_compatible(space.fingerprint()),
            None => Ok(()),
        }
    }
}
