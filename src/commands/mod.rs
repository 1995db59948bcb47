// ABOUTME: Command module aggregator for the nestkeeper CLI.
// ABOUTME: One handler per subcommand plus shared connection helpers.

mod connection;
mod cp;
mod down;
mod exec;
mod logs;
mod probe;
mod status;
mod supervise;
mod up;

pub use cp::cp;
pub use down::down;
pub use exec::exec_command;
pub use logs::logs;
pub use probe::probe;
pub use status::status;
pub use supervise::supervise;
pub use up::up;
