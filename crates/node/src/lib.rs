// node/src/lib.rs
pub mod config;
pub mod logging;
pub mod runtime;
pub mod wallet;

pub use config::NodeConfig;
pub use runtime::NodeRuntime;
