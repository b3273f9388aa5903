pub mod orchestrator;
pub mod send_loop;
pub mod shutdown;

pub use orchestrator::Orchestrator;
pub use send_loop::{ModuleSendCycle, SendLoop, StatusCycle};
