//! Request handlers.

pub mod classify;
pub mod form;
pub mod health;

pub use classify::*;
pub use form::*;
pub use health::*;
