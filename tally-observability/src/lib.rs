pub mod access_log;
pub mod logger;
pub mod observer;
pub mod sink;
pub mod template;

pub use access_log::{AccessRecord, AccessRecorder, DEFAULT_FORMAT};
pub use observer::{CommitState, ResponseObserver, STATUS_UNSET};
pub use sink::{LogLine, LogSink, MemorySink, TracingSink};
pub use template::{Template, TemplateError};
