//! W3C Web Annotation / IIIF shapes.
//!
//! Field order follows the key order the viewer emits so that serialised
//! documents stay byte-compatible with existing annotation pages.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ANNOTATION_TYPE: &str = "Annotation";
pub const ANNOTATION_PAGE_TYPE: &str = "AnnotationPage";
pub const TEXTUAL_BODY_TYPE: &str = "TextualBody";
pub const FRAGMENT_SELECTOR_TYPE: &str = "FragmentSelector";
pub const SVG_SELECTOR_TYPE: &str = "SvgSelector";
pub const PURPOSE_TAGGING: &str = "tagging";
pub const MOTIVATION_COMMENTING: &str = "commenting";

fn annotation_type() -> String {
    ANNOTATION_TYPE.to_string()
}

fn annotation_page_type() -> String {
    ANNOTATION_PAGE_TYPE.to_string()
}

fn textual_body_type() -> String {
    TEXTUAL_BODY_TYPE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// `None` only when the stored document had no `body` key at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivation: Option<String>,
    pub target: Target,
    #[serde(rename = "type", default = "annotation_type")]
    pub kind: String,
    /// Members this crate does not model (`@context`, `creator`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Annotation {
    pub fn new(id: impl Into<String>, body: Body, target: Target) -> Self {
        Self {
            body: Some(body),
            id: id.into(),
            motivation: Some(MOTIVATION_COMMENTING.to_string()),
            target,
            kind: annotation_type(),
            extra: Map::new(),
        }
    }

    pub fn bodies(&self) -> &[TextualBody] {
        self.body.as_ref().map(Body::as_slice).unwrap_or(&[])
    }

    /// First body that is not a tag.
    pub fn text(&self) -> Option<&str> {
        self.bodies()
            .iter()
            .find(|b| b.purpose.as_deref() != Some(PURPOSE_TAGGING))
            .map(|b| b.value.as_str())
    }

    pub fn tags(&self) -> Vec<&str> {
        self.bodies()
            .iter()
            .filter(|b| b.purpose.as_deref() == Some(PURPOSE_TAGGING))
            .map(|b| b.value.as_str())
            .collect()
    }

    pub fn canvas_id(&self) -> &str {
        self.target.canvas_id()
    }

    /// The `x,y,w,h` rectangle of the fragment selector, without the `xywh=` prefix.
    pub fn fragment(&self) -> Option<&str> {
        self.selector_value(FRAGMENT_SELECTOR_TYPE)
            .map(|value| value.strip_prefix("xywh=").unwrap_or(value))
    }

    pub fn svg(&self) -> Option<&str> {
        self.selector_value(SVG_SELECTOR_TYPE)
    }

    fn selector_value(&self, kind: &str) -> Option<&str> {
        self.target
            .selectors()
            .into_iter()
            .find(|s| s.kind == kind)
            .and_then(|s| s.value.as_deref())
    }
}

/// A single body is emitted as an object, several as an array. Anything that
/// is not made of textual bodies is carried as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Body {
    Single(TextualBody),
    Multiple(Vec<TextualBody>),
    Other(Value),
}

impl Default for Body {
    fn default() -> Self {
        Body::Multiple(Vec::new())
    }
}

impl Body {
    pub fn from_vec(mut bodies: Vec<TextualBody>) -> Self {
        if bodies.len() == 1 {
            Body::Single(bodies.remove(0))
        } else {
            Body::Multiple(bodies)
        }
    }

    pub fn as_slice(&self) -> &[TextualBody] {
        match self {
            Body::Single(body) => std::slice::from_ref(body),
            Body::Multiple(bodies) => bodies,
            Body::Other(_) => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Body::Other(_) => false,
            _ => self.as_slice().is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextualBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(rename = "type", default = "textual_body_type")]
    pub kind: String,
    pub value: String,
    /// `format`, `language`, `creator`, ...
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TextualBody {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            purpose: None,
            kind: textual_body_type(),
            value: value.into(),
            extra: Map::new(),
        }
    }

    pub fn tag(value: impl Into<String>) -> Self {
        Self {
            purpose: Some(PURPOSE_TAGGING.to_string()),
            ..Self::text(value)
        }
    }
}

/// Either the bare canvas IRI or a specific region of it. Targets of any
/// other shape are kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Canvas(String),
    Specific(SpecificResource),
    Other(Value),
}

impl Target {
    pub fn canvas_id(&self) -> &str {
        match self {
            Target::Canvas(id) => id,
            Target::Specific(resource) => resource.source.id(),
            Target::Other(raw) => {
                let source = raw.get("source").unwrap_or(raw);
                source
                    .as_str()
                    .or_else(|| source.get("id").and_then(Value::as_str))
                    .unwrap_or_default()
            }
        }
    }

    pub fn selectors(&self) -> Vec<&Selector> {
        match self {
            Target::Canvas(_) | Target::Other(_) => Vec::new(),
            Target::Specific(resource) => match &resource.selector {
                None => Vec::new(),
                Some(SelectorSet::One(selector)) => vec![selector],
                Some(SelectorSet::Many(selectors)) => selectors.iter().collect(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<SelectorSet>,
    pub source: Source,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SpecificResource {
    pub fn new(selector: Option<SelectorSet>, source: Source) -> Self {
        Self {
            selector,
            source,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Source {
    Canvas(String),
    Resource(CanvasResource),
}

impl Source {
    pub fn id(&self) -> &str {
        match self {
            Source::Canvas(id) => id,
            Source::Resource(resource) => &resource.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasResource {
    pub id: String,
    #[serde(rename = "partOf", default, skip_serializing_if = "Option::is_none")]
    pub part_of: Option<PartOf>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CanvasResource {
    pub fn in_manifest(canvas_id: impl Into<String>, manifest_id: impl Into<String>) -> Self {
        Self {
            id: canvas_id.into(),
            part_of: Some(PartOf {
                id: manifest_id.into(),
                kind: "Manifest".to_string(),
                extra: Map::new(),
            }),
            kind: "Canvas".to_string(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartOf {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectorSet {
    One(Selector),
    Many(Vec<Selector>),
}

/// Any W3C selector. Fragment and SVG selectors carry their payload in
/// `value`; other kinds (`PointSelector`, `RangeSelector`, ...) keep their
/// members in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selector {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Selector {
    /// `value` is the media fragment, e.g. `xywh=0,0,10,10`.
    pub fn fragment(value: impl Into<String>) -> Self {
        Self::with_value(FRAGMENT_SELECTOR_TYPE, value)
    }

    pub fn svg(value: impl Into<String>) -> Self {
        Self::with_value(SVG_SELECTOR_TYPE, value)
    }

    fn with_value(kind: &str, value: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            value: Some(value.into()),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationPage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub items: Vec<Annotation>,
    #[serde(rename = "type", default = "annotation_page_type")]
    pub kind: String,
}

impl AnnotationPage {
    pub fn empty(id: impl Into<String>) -> Self {
        Self::with_items(id, Vec::new())
    }

    pub fn with_items(id: impl Into<String>, items: Vec<Annotation>) -> Self {
        Self {
            id: id.into(),
            items,
            kind: annotation_page_type(),
        }
    }

    pub fn find(&self, id: &str) -> Option<&Annotation> {
        self.items.iter().find(|a| a.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One view of the document; every adapter is scoped to a single canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canvas {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_id: Option<String>,
}

impl Canvas {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            manifest_id: None,
        }
    }

    pub fn with_manifest(mut self, manifest_id: impl Into<String>) -> Self {
        self.manifest_id = Some(manifest_id.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}
