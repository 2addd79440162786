pub mod generation;
pub mod post;

pub use generation::*;
pub use post::*;
