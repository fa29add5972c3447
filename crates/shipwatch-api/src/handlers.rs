//! Request handlers.

pub mod detect;
pub mod export;
pub mod health;

pub use detect::*;
pub use export::*;
pub use health::*;
