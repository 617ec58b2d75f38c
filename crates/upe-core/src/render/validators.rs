//! Byte-level validators for rendered artifacts.

use super::{reasons, ValidationOutcome, Validator};

const PDF_MAGIC: &[u8] = b"%PDF";
/// Local file header signature; pptx, docx and xlsx are all zip containers.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Non-empty is enough.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlValidator;

impl Validator for HtmlValidator {
    fn validate(&self, bytes: &[u8]) -> ValidationOutcome {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            ValidationOutcome::fail(reasons::EMPTY_HTML)
        } else {
            ValidationOutcome::ok()
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfValidator;

impl Validator for PdfValidator {
    fn validate(&self, bytes: &[u8]) -> ValidationOutcome {
        if bytes.is_empty() {
            ValidationOutcome::fail(reasons::EMPTY_PDF)
        } else if !bytes.starts_with(PDF_MAGIC) {
            ValidationOutcome::fail(reasons::BAD_MAGIC)
        } else {
            ValidationOutcome::ok()
        }
    }
}

/// Magic-number check for Office Open XML containers. Slide and sheet counts
/// need a real parser and are left to external validators.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipContainerValidator;

impl Validator for ZipContainerValidator {
    fn validate(&self, bytes: &[u8]) -> ValidationOutcome {
        if bytes.is_empty() {
            ValidationOutcome::fail(reasons::EMPTY_CONTAINER)
        } else if !bytes.starts_with(ZIP_MAGIC) {
            ValidationOutcome::fail(reasons::BAD_MAGIC)
        } else {
            ValidationOutcome::ok()
        }
    }
}
