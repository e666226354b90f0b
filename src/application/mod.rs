pub mod cli_controller;
pub mod session;

pub use cli_controller::ejecutar_cli;
pub use session::{CobaltSession, ResolveEvents, SilentEvents};
