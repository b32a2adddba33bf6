//! Process lifecycle: shutdown signal handling and worker thread teardown

mod join;
mod shutdown;

pub use join::join_thread;
pub use shutdown::ShutdownSignal;
