//! Common test utilities and fixtures.

pub mod generator;
pub mod server;

#[allow(unused_imports)]
pub use generator::*;
#[allow(unused_imports)]
pub use server::*;
