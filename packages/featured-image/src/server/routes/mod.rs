// HTTP routes
pub mod events;
pub mod generation;
pub mod health;
pub mod log;
pub mod regenerate;
pub mod settings;

pub use events::*;
pub use generation::*;
pub use health::*;
pub use log::*;
pub use regenerate::*;
pub use settings::*;
