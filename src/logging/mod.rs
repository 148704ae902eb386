pub mod runtime_logger;
pub mod session_log;

pub use runtime_logger::RuntimeLogger;
pub use session_log::SessionLog;
