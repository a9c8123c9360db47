pub mod commands;
pub mod context;
pub mod display;
pub mod server;

pub use commands::{CliArgs, Commands, GlobalArgs};
pub use context::{load_conf, AppContext};
