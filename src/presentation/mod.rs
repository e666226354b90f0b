pub mod cli;
pub mod output;
pub mod progress;

pub use cli::{Cli, Commands, MediaArgs};
pub use output::ConsoleOutput;
pub use progress::ConsoleProgress;
