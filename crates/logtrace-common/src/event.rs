use crate::snapshot::{ElementSummary, Position};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Move,
    Click,
    Tap,
    Debug,
    Inspect,
    LlmResponse,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Move => "move",
            EventType::Click => "click",
            EventType::Tap => "tap",
            EventType::Debug => "debug",
            EventType::Inspect => "inspect",
            EventType::LlmResponse => "llm_response",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded interaction. `id` and `timestamp` are assigned by the
/// recorder; callers describe events with [`NewEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<ElementSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub event_type: EventType,
    pub position: Option<Position>,
    pub element: Option<ElementSummary>,
    pub prompt: Option<String>,
    pub response: Option<String>,
}

impl NewEvent {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            position: None,
            element: None,
            prompt: None,
            response: None,
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_element(mut self, element: ElementSummary) -> Self {
        self.element = Some(element);
        self
    }

    pub fn llm_response(
        prompt: String,
        response: String,
        element: Option<ElementSummary>,
        position: Position,
    ) -> Self {
        Self {
            event_type: EventType::LlmResponse,
            position: Some(position),
            element,
            prompt: Some(prompt),
            response: Some(response),
        }
    }

    pub fn into_event(self, id: String, timestamp: String) -> LogEvent {
        LogEvent {
            id,
            event_type: self.event_type,
            timestamp,
            position: self.position,
            element: self.element,
            prompt: self.prompt,
            response: self.response,
        }
    }
}
