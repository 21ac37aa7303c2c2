pub mod chat;
pub mod state;

pub use state::{AppState, RelayState};
