use crate::snapshot::{ElementSnapshot, ElementSummary, Position};
use serde::{Deserialize, Serialize};

// ============================================================
// Iframe bridge messages
// ============================================================

/// Messages exchanged between the parent page and the agent injected into a
/// same-origin frame. Serialized with a `type` discriminator, for example
/// `{"type":"logtrace:elementHover","elementInfo":{..},"mousePosition":{..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeMessage {
    #[serde(rename = "logtrace:ready")]
    Ready,
    #[serde(rename = "logtrace:activate")]
    Activate,
    #[serde(rename = "logtrace:deactivate")]
    Deactivate,
    #[serde(rename = "logtrace:elementHover")]
    ElementHover(ElementReport),
    #[serde(rename = "logtrace:elementClick")]
    ElementClick(ElementReport),
    #[serde(rename = "logtrace:debugElement")]
    DebugElement(ElementReport),
}

impl BridgeMessage {
    pub fn type_name(&self) -> &'static str {
        match self {
            BridgeMessage::Ready => "logtrace:ready",
            BridgeMessage::Activate => "logtrace:activate",
            BridgeMessage::Deactivate => "logtrace:deactivate",
            BridgeMessage::ElementHover(_) => "logtrace:elementHover",
            BridgeMessage::ElementClick(_) => "logtrace:elementClick",
            BridgeMessage::DebugElement(_) => "logtrace:debugElement",
        }
    }

    /// Decodes a message, returning `None` for anything that is not a
    /// LogTrace bridge message. Pages post all kinds of traffic through
    /// `postMessage`; foreign messages are ignored rather than treated as
    /// errors.
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementReport {
    pub element_info: ElementSnapshot,
    pub mouse_position: Position,
}

// ============================================================
// Extension background <-> content script envelope
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ExtensionRequest {
    Activate,
    Deactivate,
    CheckStatus,
    GetSettings,
}

/// Reply passed to `sendResponse`: either `{success: true, ...}` or
/// `{error: "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtensionResponse {
    Ok {
        success: bool,
        #[serde(flatten)]
        data: serde_json::Map<String, serde_json::Value>,
    },
    Error {
        error: String,
    },
}

impl ExtensionResponse {
    pub fn ok() -> Self {
        Self::Ok {
            success: true,
            data: serde_json::Map::new(),
        }
    }

    pub fn ok_with(data: serde_json::Map<String, serde_json::Value>) -> Self {
        Self::Ok {
            success: true,
            data,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }
}

// ============================================================
// AI inference endpoint
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub prompt: String,
    pub element: Option<ElementSummary>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiResponseEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AiAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_snippets: Option<CodeSnippets>,
    #[serde(default, rename = "debugging_steps")]
    pub debugging_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CodeSnippets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub javascript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl AiAnalysis {
    /// Flattens the structured analysis into the text shown in the debug
    /// modal and stored in the event log.
    pub fn render(&self) -> String {
        let mut sections = Vec::new();
        if let Some(summary) = self.summary.as_deref().filter(|s| !s.trim().is_empty()) {
            sections.push(summary.trim().to_string());
        }
        if !self.analysis.trim().is_empty() {
            sections.push(self.analysis.trim().to_string());
        }
        push_list(&mut sections, "Issues", &self.issues);
        push_list(&mut sections, "Recommendations", &self.recommendations);
        if let Some(snippets) = &self.code_snippets {
            for (label, code) in [
                ("CSS", &snippets.css),
                ("JavaScript", &snippets.javascript),
                ("HTML", &snippets.html),
            ] {
                if let Some(code) = code.as_deref().filter(|c| !c.trim().is_empty()) {
                    sections.push(format!("{} snippet:\n{}", label, code.trim()));
                }
            }
        }
        if !self.debugging_steps.is_empty() {
            let steps = self
                .debugging_steps
                .iter()
                .enumerate()
                .map(|(i, step)| format!("{}. {}", i + 1, step))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!("Debugging steps:\n{}", steps));
        }
        sections.join("\n\n")
    }
}

fn push_list(sections: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let body = items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n");
    sections.push(format!("{}:\n{}", title, body));
}
