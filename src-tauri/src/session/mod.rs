pub mod controller;
pub mod progress;
pub mod types;

pub use controller::SessionController;
pub use progress::{apply_event, ProgressPolicy};
pub use types::*;
