//! Editor state <-> Web Annotation mapping.

use crate::domain::model::{
    Annotation, Body, CanvasResource, Selector, SelectorSet, Source, SpecificResource, Target,
    TextualBody, PURPOSE_TAGGING,
};
use uuid::Uuid;

/// What the annotation form holds before it is saved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationDraft {
    pub id: String,
    pub canvas_id: String,
    pub manifest_id: Option<String>,
    pub body: String,
    pub tags: Vec<String>,
    pub svg: Option<String>,
    /// `x,y,w,h` without the `xywh=` prefix.
    pub xywh: Option<String>,
}

impl AnnotationDraft {
    pub fn new(canvas_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            canvas_id: canvas_id.into(),
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_xywh(mut self, xywh: impl Into<String>) -> Self {
        let xywh = xywh.into();
        self.xywh = Some(xywh.strip_prefix("xywh=").unwrap_or(&xywh).to_string());
        self
    }

    pub fn with_svg(mut self, svg: impl Into<String>) -> Self {
        self.svg = Some(svg.into());
        self
    }

    pub fn with_manifest(mut self, manifest_id: impl Into<String>) -> Self {
        self.manifest_id = Some(manifest_id.into());
        self
    }

    /// Same content, re-targeted at another canvas.
    pub fn for_canvas(&self, canvas_id: &str, manifest_id: Option<&str>) -> Self {
        Self {
            canvas_id: canvas_id.to_string(),
            manifest_id: manifest_id
                .map(str::to_string)
                .or_else(|| self.manifest_id.clone()),
            ..self.clone()
        }
    }

    /// Loads an existing annotation back into editable fields.
    pub fn from_annotation(annotation: &Annotation) -> Self {
        let mut draft = Self {
            id: annotation.id.clone(),
            canvas_id: annotation.canvas_id().to_string(),
            ..Default::default()
        };

        for body in annotation.bodies() {
            if body.purpose.as_deref() == Some(PURPOSE_TAGGING) {
                draft.tags.push(body.value.clone());
            } else {
                draft.body = body.value.clone();
            }
        }

        if let Target::Specific(resource) = &annotation.target {
            if let Source::Resource(CanvasResource {
                part_of: Some(part_of),
                ..
            }) = &resource.source
            {
                draft.manifest_id = Some(part_of.id.clone());
            }
        }

        draft.svg = annotation.svg().map(str::to_string);
        draft.xywh = annotation.fragment().map(str::to_string);
        draft
    }

    pub fn to_annotation(&self) -> Annotation {
        Annotation::new(self.id.clone(), self.build_body(), self.build_target())
    }

    fn build_body(&self) -> Body {
        let mut bodies = Vec::with_capacity(self.tags.len() + 1);
        if !self.body.is_empty() {
            bodies.push(TextualBody::text(self.body.clone()));
        }
        bodies.extend(self.tags.iter().cloned().map(TextualBody::tag));
        Body::from_vec(bodies)
    }

    fn build_target(&self) -> Target {
        if self.svg.is_none() && self.xywh.is_none() {
            return Target::Canvas(self.canvas_id.clone());
        }

        let mut selectors = Vec::with_capacity(2);
        if let Some(svg) = &self.svg {
            selectors.push(Selector::svg(svg.clone()));
        }
        if let Some(xywh) = &self.xywh {
            selectors.push(Selector::fragment(format!("xywh={}", xywh)));
        }
        let selector = if selectors.len() == 1 {
            SelectorSet::One(selectors.remove(0))
        } else {
            SelectorSet::Many(selectors)
        };

        Target::Specific(SpecificResource::new(Some(selector), self.build_source()))
    }

    fn build_source(&self) -> Source {
        match &self.manifest_id {
            Some(manifest_id) => {
                Source::Resource(CanvasResource::in_manifest(&self.canvas_id, manifest_id))
            }
            None => Source::Canvas(self.canvas_id.clone()),
        }
    }
}
