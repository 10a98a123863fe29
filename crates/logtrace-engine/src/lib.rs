pub mod cli;
pub mod clock;
pub mod config;
pub mod controller;
pub mod orchestrator;
pub mod recorder;
pub mod storage;
pub mod upstream;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{Panel, PointerKind, SessionController};
pub use orchestrator::{DebugContext, DebugError, DebugOrchestrator};
pub use recorder::{EventRecorder, ExportBlob};
pub use storage::{FileStorage, MemoryStorage, StorageAdapter, StorageError};
pub use upstream::{AiEndpoint, EndpointError, HttpAiEndpoint};

pub use logtrace_common::event;
pub use logtrace_common::protocol;
