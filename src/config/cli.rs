use crate::domain::model::Canvas;
use crate::domain::web_annotation::AnnotationDraft;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "anno-store")]
#[command(about = "Create, store and export IIIF annotations")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "anno-store.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the annotation page of each canvas
    List(CanvasArgs),
    /// Print one annotation
    Get {
        #[command(flatten)]
        canvases: CanvasArgs,
        #[arg(long)]
        id: String,
    },
    /// Create an annotation on every given canvas
    Create(EditArgs),
    /// Replace an existing annotation on every given canvas
    Update {
        #[command(flatten)]
        edit: EditArgs,
        #[arg(long)]
        id: String,
    },
    /// Delete an annotation from every given canvas
    Delete {
        #[command(flatten)]
        canvases: CanvasArgs,
        #[arg(long)]
        id: String,
    },
    /// Write stored pages as JSON files
    Export {
        #[command(flatten)]
        canvases: CanvasArgs,
        #[arg(long, default_value = "./export")]
        output: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct CanvasArgs {
    /// Canvas id, repeatable
    #[arg(long = "canvas", required = true)]
    pub canvas_ids: Vec<String>,

    /// Manifest the canvases belong to
    #[arg(long)]
    pub manifest: Option<String>,
}

impl CanvasArgs {
    pub fn canvases(&self) -> Vec<Canvas> {
        self.canvas_ids
            .iter()
            .map(|id| {
                let canvas = Canvas::new(id.clone());
                match &self.manifest {
                    Some(manifest) => canvas.with_manifest(manifest.clone()),
                    None => canvas,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Args)]
pub struct EditArgs {
    #[command(flatten)]
    pub canvases: CanvasArgs,

    /// Annotation text (HTML allowed)
    #[arg(long, default_value = "")]
    pub body: String,

    /// Tag, repeatable
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Rectangle as x,y,w,h
    #[arg(long)]
    pub xywh: Option<String>,

    /// SVG path markup
    #[arg(long)]
    pub svg: Option<String>,
}

impl EditArgs {
    pub fn draft(&self, id: Option<&str>) -> AnnotationDraft {
        let first_canvas = self
            .canvases
            .canvas_ids
            .first()
            .cloned()
            .unwrap_or_default();
        let mut draft = AnnotationDraft::new(first_canvas).with_body(self.body.clone());
        if let Some(id) = id {
            draft.id = id.to_string();
        }
        draft.tags = self.tags.clone();
        draft.manifest_id = self.canvases.manifest.clone();
        if let Some(xywh) = &self.xywh {
            draft = draft.with_xywh(xywh.clone());
        }
        if let Some(svg) = &self.svg {
            draft = draft.with_svg(svg.clone());
        }
        draft
    }
}

impl Validate for EditArgs {
    fn validate(&self) -> Result<()> {
        if let Some(xywh) = &self.xywh {
            validation::validate_xywh("--xywh", xywh)?;
        }
        if let Some(svg) = &self.svg {
            validation::validate_non_empty_string("--svg", svg)?;
        }
        Ok(())
    }
}
