//! Data models

pub mod activity;
pub mod attempt;
pub mod evaluation;
pub mod session;
pub mod weights;

pub use activity::*;
pub use attempt::*;
pub use evaluation::*;
pub use session::*;
pub use weights::*;
