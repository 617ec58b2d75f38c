//! Artifact rendering and validation seams.
//!
//! A [`Renderer`] turns a [`Document`] into the bytes of one artifact kind and
//! a [`Validator`] checks those bytes before they are stored. Both are looked
//! up per [`ArtifactKind`] in a [`RenderRegistry`]. The built-in registry
//! renders HTML only; presentation, word-processing, spreadsheet and PDF
//! renderers are plugged in by the embedding application.

pub mod html;
pub mod validators;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::document::Document;
use crate::domain::manifest::ArtifactKind;

pub use html::HtmlRenderer;
pub use validators::{HtmlValidator, PdfValidator, ZipContainerValidator};

/// Stable validator reason codes.
pub mod reasons {
    pub const OK: &str = "ok";
    pub const EMPTY_PDF: &str = "empty_pdf";
    pub const BAD_MAGIC: &str = "bad_magic";
    pub const TOO_FEW_SLIDES: &str = "too_few_slides";
    pub const NO_SHEETS: &str = "no_sheets";
    pub const EMPTY_HTML: &str = "empty_html";
    pub const EMPTY_CONTAINER: &str = "empty_container";
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("unsupported content: {0}")]
    Unsupported(String),

    #[error("render failed: {0}")]
    Failed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces the bytes of one artifact kind.
pub trait Renderer: Send + Sync {
    fn render(&self, doc: &Document) -> Result<Vec<u8>, RenderError>;
}

/// Result of checking rendered bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub passed: bool,
    pub reason: String,
}

impl ValidationOutcome {
    pub fn ok() -> Self {
        Self {
            passed: true,
            reason: reasons::OK.to_string(),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: reason.into(),
        }
    }
}

/// Checks the bytes of one artifact kind.
pub trait Validator: Send + Sync {
    fn validate(&self, bytes: &[u8]) -> ValidationOutcome;
}

/// Renderer and validator per artifact kind.
#[derive(Clone, Default)]
pub struct RenderRegistry {
    renderers: BTreeMap<ArtifactKind, Arc<dyn Renderer>>,
    validators: BTreeMap<ArtifactKind, Arc<dyn Validator>>,
}

impl std::fmt::Debug for RenderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderRegistry")
            .field("renderers", &self.renderers.keys().collect::<Vec<_>>())
            .field("validators", &self.validators.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// HTML renderer plus validators for every kind.
    pub fn builtin() -> Self {
        let zip: Arc<dyn Validator> = Arc::new(ZipContainerValidator);
        Self::new()
            .with_renderer(ArtifactKind::Html, Arc::new(HtmlRenderer))
            .with_validator(ArtifactKind::Html, Arc::new(HtmlValidator))
            .with_validator(ArtifactKind::Pdf, Arc::new(PdfValidator))
            .with_validator(ArtifactKind::Pptx, Arc::clone(&zip))
            .with_validator(ArtifactKind::Docx, Arc::clone(&zip))
            .with_validator(ArtifactKind::Xlsx, zip)
    }

    pub fn with_renderer(mut self, kind: ArtifactKind, renderer: Arc<dyn Renderer>) -> Self {
        self.renderers.insert(kind, renderer);
        self
    }

    pub fn with_validator(mut self, kind: ArtifactKind, validator: Arc<dyn Validator>) -> Self {
        self.validators.insert(kind, validator);
        self
    }

    pub fn renderer(&self, kind: ArtifactKind) -> Option<&Arc<dyn Renderer>> {
        self.renderers.get(&kind)
    }

    pub fn validator(&self, kind: ArtifactKind) -> Option<&Arc<dyn Validator>> {
        self.validators.get(&kind)
    }

    /// Kinds that can currently be rendered.
    pub fn renderable(&self) -> Vec<ArtifactKind> {
        self.renderers.keys().copied().collect()
    }
}
