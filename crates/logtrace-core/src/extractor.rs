//! Element context extraction.
//!
//! Turns a live element into an [`ElementSnapshot`]. Extraction never
//! fails and is deterministic: two calls on an unmodified node produce equal
//! snapshots.

use crate::dom::DomElement;
use logtrace_common::sanitize::{sanitize, sanitize_bounded};
pub use logtrace_common::sanitize::INLINE_HANDLER_PROPERTIES;
use logtrace_common::snapshot::{
    Attribute, DetectedListener, ElementSnapshot, ListenerSource, Size, StyleProperty, describe,
};

pub const MAX_TEXT_CHARS: usize = 100;
pub const ANCESTOR_DEPTH: usize = 2;
pub const PATH_SEPARATOR: &str = " > ";

/// Computed style properties captured for every element, in display order.
pub const STYLE_PROPERTIES: &[&str] = &[
    "display",
    "position",
    "top",
    "right",
    "bottom",
    "left",
    "width",
    "height",
    "margin",
    "padding",
    "border",
    "box-sizing",
    "color",
    "background-color",
    "font-family",
    "font-size",
    "font-weight",
    "line-height",
    "text-align",
    "z-index",
    "opacity",
    "visibility",
    "overflow",
    "flex-direction",
    "justify-content",
    "align-items",
    "gap",
    "transform",
    "transition",
    "cursor",
    "pointer-events",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub max_attributes: usize,
    pub include_styles: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_attributes: 50,
            include_styles: true,
        }
    }
}

pub fn extract<E: DomElement>(node: &E) -> ElementSnapshot {
    extract_with(node, ExtractOptions::default())
}

pub fn extract_with<E: DomElement>(node: &E, options: ExtractOptions) -> ElementSnapshot {
    let rect = node.bounding_rect();
    let raw_attributes = node.attributes();

    ElementSnapshot {
        tag: node.tag_name().to_lowercase(),
        id: sanitized_id(node),
        classes: sanitized_classes(node),
        text: node
            .text_content()
            .map(|t| sanitize_bounded(&t, MAX_TEXT_CHARS))
            .unwrap_or_default(),
        parent_path: parent_path(node),
        attributes: raw_attributes
            .iter()
            .take(options.max_attributes)
            .map(|(name, value)| Attribute {
                name: name.clone(),
                value: value.clone(),
            })
            .collect(),
        size: Size::from_rect(&rect),
        rect,
        listeners: detect_listeners(node, &raw_attributes),
        styles: if options.include_styles {
            computed_styles(node)
        } else {
            Vec::new()
        },
    }
}

fn sanitized_id<E: DomElement>(node: &E) -> String {
    node.id().map(|id| sanitize(&id)).unwrap_or_default()
}

fn sanitized_classes<E: DomElement>(node: &E) -> Vec<String> {
    node.class_list()
        .unwrap_or_default()
        .iter()
        .map(|c| sanitize(c))
        .filter(|c| !c.is_empty())
        .collect()
}

/// Up to [`ANCESTOR_DEPTH`] ancestors, outermost first, stopping at `<body>`.
pub fn parent_path<E: DomElement>(node: &E) -> String {
    let mut segments = Vec::with_capacity(ANCESTOR_DEPTH);
    let mut current = node.parent_element();
    while let Some(parent) = current {
        if segments.len() == ANCESTOR_DEPTH {
            break;
        }
        let tag = parent.tag_name().to_lowercase();
        if tag == "body" {
            break;
        }
        segments.push(describe(
            &tag,
            &sanitized_id(&parent),
            &sanitized_classes(&parent),
        ));
        current = parent.parent_element();
    }
    segments.reverse();
    segments.join(PATH_SEPARATOR)
}

/// Best-effort listener scan. See [`DetectedListener`] for what it cannot
/// see.
pub fn detect_listeners<E: DomElement>(
    node: &E,
    attributes: &[(String, String)],
) -> Vec<DetectedListener> {
    let inline = INLINE_HANDLER_PROPERTIES
        .iter()
        .filter(|prop| node.has_inline_handler(prop))
        .map(|prop| DetectedListener {
            event_type: prop.trim_start_matches("on").to_string(),
            source: ListenerSource::Inline,
        });

    let data = attributes
        .iter()
        .filter(|(name, _)| {
            let lowered = name.to_lowercase();
            lowered.starts_with("data-") && (lowered.contains("click") || lowered.contains("event"))
        })
        .map(|(name, _)| DetectedListener {
            event_type: name.to_lowercase(),
            source: ListenerSource::DataAttribute,
        });

    inline.chain(data).collect()
}

pub fn computed_styles<E: DomElement>(node: &E) -> Vec<StyleProperty> {
    STYLE_PROPERTIES
        .iter()
        .filter_map(|name| {
            node.computed_style(name).map(|value| StyleProperty {
                name: name.to_string(),
                value: value.trim().to_string(),
            })
        })
        .collect()
}
