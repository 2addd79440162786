pub mod activities;
pub mod events;
pub mod models;
pub mod trigger;

// Re-export events
pub use events::{PostStatusTransition, PostSnapshot};

// Re-export models (domain models)
pub use models::{ClaimOutcome, GenerationMeta, GenerationStatus, Post};

pub use trigger::{on_status_transition, schedule_generation, TriggerDecision};
