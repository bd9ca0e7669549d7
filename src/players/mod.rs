pub mod base_controller;
pub mod player_controller;
pub mod simulated;

pub use base_controller::BasePlayerController;
pub use player_controller::{PlayerCommand, PlayerController, PlayerEventListener};
pub use simulated::SimulatedPlayer;
