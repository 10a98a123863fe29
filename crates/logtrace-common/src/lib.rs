pub mod event;
pub mod protocol;
pub mod sanitize;
pub mod snapshot;

pub use event::{EventType, LogEvent, NewEvent};
pub use protocol::{
    AiAnalysis, AiResponseEnvelope, AnalyzeRequest, BridgeMessage, CodeSnippets, ElementReport,
    ExtensionRequest, ExtensionResponse,
};
pub use sanitize::{ValidationError, sanitize, validate_prompt};
pub use snapshot::{
    Attribute, DetectedListener, ElementSnapshot, ElementSummary, ListenerSource, Position, Rect,
    Size, StyleProperty,
};
