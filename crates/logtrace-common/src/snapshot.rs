use serde::{Deserialize, Serialize};

/// Tag used for snapshots synthesized over a cross-origin frame, where the
/// element under the pointer cannot be resolved.
pub const CROSS_ORIGIN_TAG: &str = "iframe-element";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn contains(&self, point: Position) -> bool {
        point.x >= self.left && point.x < self.right() && point.y >= self.top && point.y < self.bottom()
    }

    /// Converts a point in the containing document's client space into
    /// coordinates relative to this rect's top-left corner.
    pub fn to_local(&self, point: Position) -> Position {
        Position::new(point.x - self.left, point.y - self.top)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn from_rect(rect: &Rect) -> Self {
        Self {
            width: round_dimension(rect.width),
            height: round_dimension(rect.height),
        }
    }
}

fn round_dimension(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round() as u32
    } else {
        0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleProperty {
    pub name: String,
    pub value: String,
}

impl StyleProperty {
    /// `initial` and `normal` carry no debugging signal and are hidden from
    /// display, though they stay in the snapshot.
    pub fn is_interesting(&self) -> bool {
        !(self.value.is_empty() || self.value == "initial" || self.value == "normal")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListenerSource {
    Inline,
    DataAttribute,
}

/// A listener found by the heuristic scan.
///
/// Only inline handler properties and `data-*` hints are visible. Handlers
/// attached with `addEventListener` never show up here, so an empty list
/// does not mean the element is inert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedListener {
    pub event_type: String,
    pub source: ListenerSource,
}

/// Structural capture of one element at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    pub tag: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub parent_path: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub size: Size,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default)]
    pub listeners: Vec<DetectedListener>,
    #[serde(default)]
    pub styles: Vec<StyleProperty>,
}

impl ElementSnapshot {
    /// Placeholder for an element inside a cross-origin frame. `local` is the
    /// pointer position already translated into frame coordinates.
    pub fn cross_origin_placeholder(local: Position) -> Self {
        Self {
            tag: CROSS_ORIGIN_TAG.to_string(),
            text: format!(
                "Cross-origin element at ({}, {})",
                format_coordinate(local.x),
                format_coordinate(local.y)
            ),
            ..Self::default()
        }
    }

    pub fn is_cross_origin_placeholder(&self) -> bool {
        self.tag == CROSS_ORIGIN_TAG
    }

    /// Attributes shown in the inspector; `style` is covered by the computed
    /// style section instead.
    pub fn display_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| a.name != "style")
    }

    pub fn interesting_styles(&self) -> impl Iterator<Item = &StyleProperty> {
        self.styles.iter().filter(|s| s.is_interesting())
    }

    pub fn summary(&self) -> ElementSummary {
        ElementSummary {
            tag: self.tag.clone(),
            id: self.id.clone(),
            classes: self.classes.clone(),
            text: self.text.clone(),
        }
    }

    /// `tag#id.class1.class2`, the same shape used in `parent_path`.
    pub fn descriptor(&self) -> String {
        describe(&self.tag, &self.id, &self.classes)
    }
}

fn format_coordinate(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.1}", value)
    }
}

/// Builds a `tag#id.class` descriptor.
pub fn describe(tag: &str, id: &str, classes: &[String]) -> String {
    let mut out = String::from(tag);
    if !id.is_empty() {
        out.push('#');
        out.push_str(id);
    }
    for class in classes {
        out.push('.');
        out.push_str(class);
    }
    out
}

/// The reduced element form carried by log events and AI requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSummary {
    pub tag: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub text: String,
}
