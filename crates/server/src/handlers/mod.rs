//! HTTP request handlers.

pub mod health;
pub mod lyrics;
pub mod management;

pub use health::*;
pub use lyrics::*;
pub use management::*;
