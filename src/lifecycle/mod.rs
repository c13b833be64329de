//! Process lifecycle: initial load sequencing and graceful shutdown

mod loader;
mod readiness;
mod shutdown;

pub use loader::InitialLoader;
pub use readiness::{ReadySignal, ReadyWatcher};
pub use shutdown::ShutdownSignal;
