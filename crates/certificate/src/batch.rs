//! Sequential batch generation
//!
//! Recipients are rendered one after another. A failure for one recipient
//! never stops the batch: the document is retried as a placeholder or
//! recorded as failed, and the batch moves on.

use crate::renderer::{CertificateRenderer, DocumentTemplate, RenderWarning, RenderedDocument};
use crate::schema::GenerationRequest;
use crate::{CertificateError, Result};
use log::{info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A certificate produced by a batch
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    /// Position in the batch, starting at 1
    pub index: usize,
    pub recipient_name: String,
    pub bytes: Vec<u8>,
    pub warnings: Vec<RenderWarning>,
    /// Set when the document is a placeholder, with the reason the
    /// template could not be used
    pub degraded: Option<String>,
}

impl GeneratedDocument {
    fn from_rendered(index: usize, request: &GenerationRequest, rendered: RenderedDocument) -> Self {
        let degraded = rendered.warnings.iter().find_map(|warning| match warning {
            RenderWarning::TemplateUnavailable { reason } => Some(reason.clone()),
            _ => None,
        });

        Self {
            index,
            recipient_name: request.recipient.name.trim().to_string(),
            bytes: rendered.bytes,
            warnings: rendered.warnings,
            degraded,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    /// File name for writing the document into a directory
    ///
    /// `certificate-<index>-<name>.pdf`, with the name reduced to lowercase
    /// ASCII letters, digits and dashes.
    pub fn file_name(&self) -> String {
        let mut slug = String::new();
        for c in self.recipient_name.chars() {
            let c = pdf_core::latin_base(c).unwrap_or(c);
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }
        let slug = slug.trim_end_matches('-');
        let slug = if slug.is_empty() { "recipient" } else { slug };

        format!("certificate-{:03}-{}.pdf", self.index, slug)
    }
}

/// A recipient for whom no document could be produced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub index: usize,
    pub recipient_name: String,
    pub reason: String,
}

/// Outcome of a batch run
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Produced documents, in request order
    pub documents: Vec<GeneratedDocument>,
    pub failures: Vec<BatchFailure>,
    /// Requests not attempted because the batch was cancelled
    pub pending: usize,
}

impl BatchReport {
    /// Documents that are placeholders for failed renders
    pub fn degraded_count(&self) -> usize {
        self.documents.iter().filter(|doc| doc.is_degraded()).count()
    }

    pub fn is_cancelled(&self) -> bool {
        self.pending > 0
    }
}

type ProgressFn<'a> = Box<dyn FnMut(usize, usize) + 'a>;

/// Renders a list of requests against one template
pub struct BatchGenerator<'a> {
    renderer: &'a CertificateRenderer,
    template: Option<&'a DocumentTemplate>,
    on_progress: Option<ProgressFn<'a>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> BatchGenerator<'a> {
    /// `template` is `None` when the template could not be loaded; every
    /// document is then a placeholder.
    pub fn new(renderer: &'a CertificateRenderer, template: Option<&'a DocumentTemplate>) -> Self {
        Self {
            renderer,
            template,
            on_progress: None,
            cancel: None,
        }
    }

    /// Called with `(current, total)` after every recipient
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(usize, usize) + 'a,
    {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Stop before the next recipient once `flag` is set
    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Render every request in order
    ///
    /// Fails only when the batch is not empty and none of its documents
    /// could be produced.
    pub fn generate_all(&mut self, requests: &[GenerationRequest]) -> Result<BatchReport> {
        let total = requests.len();
        let mut report = BatchReport::default();

        for (position, request) in requests.iter().enumerate() {
            let index = position + 1;

            if self.is_cancelled() {
                report.pending = total - position;
                info!("batch cancelled after {position} of {total} documents");
                break;
            }

            match self.generate_one(index, request) {
                Ok(document) => report.documents.push(document),
                Err(failure) => report.failures.push(failure),
            }

            if let Some(progress) = self.on_progress.as_mut() {
                progress(index, total);
            }
        }

        info!(
            "batch finished: {} documents ({} degraded), {} failed, {} pending",
            report.documents.len(),
            report.degraded_count(),
            report.failures.len(),
            report.pending
        );

        if total > 0 && report.failures.len() == total {
            return Err(CertificateError::BatchFailed(report.failures));
        }

        Ok(report)
    }

    fn generate_one(
        &self,
        index: usize,
        request: &GenerationRequest,
    ) -> std::result::Result<GeneratedDocument, BatchFailure> {
        let failure = |reason: String| BatchFailure {
            index,
            recipient_name: request.recipient.name.clone(),
            reason,
        };

        let error = match self.renderer.render(self.template, request) {
            Ok(rendered) => return Ok(GeneratedDocument::from_rendered(index, request, rendered)),
            Err(CertificateError::Validation(reason)) => {
                warn!("document {index} skipped: {reason}");
                return Err(failure(reason));
            }
            Err(e) => e,
        };

        warn!("document {index} failed ({error}), falling back to placeholder");

        match self.renderer.render_placeholder(request) {
            Ok(mut rendered) => {
                rendered.warnings.push(RenderWarning::TemplateUnavailable {
                    reason: error.to_string(),
                });
                Ok(GeneratedDocument::from_rendered(index, request, rendered))
            }
            Err(placeholder_error) => {
                warn!("placeholder for document {index} failed: {placeholder_error}");
                Err(failure(format!("{error}; placeholder: {placeholder_error}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Recipient;
    use pretty_assertions::assert_eq;

    fn document(index: usize, name: &str) -> GeneratedDocument {
        GeneratedDocument {
            index,
            recipient_name: name.to_string(),
            bytes: Vec::new(),
            warnings: Vec::new(),
            degraded: None,
        }
    }

    fn requests(names: &[&str]) -> Vec<GenerationRequest> {
        names
            .iter()
            .map(|name| GenerationRequest::default().for_recipient(Recipient::new(name)))
            .collect()
    }

    #[test]
    fn test_file_name_slug() {
        assert_eq!(
            document(7, "João da Conceição").file_name(),
            "certificate-007-joao-da-conceicao.pdf"
        );
        assert_eq!(
            document(12, "  O'Neil,  Ana  ").file_name(),
            "certificate-012-o-neil-ana.pdf"
        );
        assert_eq!(document(1, "***").file_name(), "certificate-001-recipient.pdf");
    }

    #[test]
    fn test_empty_batch() {
        let renderer = CertificateRenderer::new();
        let report = BatchGenerator::new(&renderer, None)
            .generate_all(&[])
            .unwrap();
        assert!(report.documents.is_empty());
        assert_eq!(report.pending, 0);
    }

    #[test]
    fn test_all_invalid_is_fatal() {
        let renderer = CertificateRenderer::new();
        let result = BatchGenerator::new(&renderer, None).generate_all(&requests(&["", " "]));
        let failures = match result {
            Err(CertificateError::BatchFailed(failures)) => failures,
            other => panic!("expected BatchFailed, got {other:?}"),
        };
        let indices: Vec<usize> = failures.iter().map(|failure| failure.index).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn test_invalid_recipient_recorded_as_failure() {
        let renderer = CertificateRenderer::new();
        let report = BatchGenerator::new(&renderer, None)
            .generate_all(&requests(&["Ana", "", "Bruno"]))
            .unwrap();

        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 2);
        assert_eq!(report.documents[1].index, 3);
    }

    #[test]
    fn test_missing_template_counts_as_degraded() {
        let renderer = CertificateRenderer::new();
        let report = BatchGenerator::new(&renderer, None)
            .generate_all(&requests(&["Ana", "Bruno"]))
            .unwrap();

        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.degraded_count(), 2);
        assert!(report.documents.iter().all(GeneratedDocument::is_degraded));
    }

    #[test]
    fn test_cancel_before_start() {
        let renderer = CertificateRenderer::new();
        let flag = Arc::new(AtomicBool::new(true));
        let report = BatchGenerator::new(&renderer, None)
            .cancel_flag(flag)
            .generate_all(&requests(&["Ana", "Bruno"]))
            .unwrap();

        assert!(report.documents.is_empty());
        assert_eq!(report.pending, 2);
        assert!(report.is_cancelled());
    }

    #[test]
    fn test_cancel_from_progress_callback() {
        let renderer = CertificateRenderer::new();
        let flag = Arc::new(AtomicBool::new(false));
        let setter = Arc::clone(&flag);

        let report = BatchGenerator::new(&renderer, None)
            .cancel_flag(flag)
            .on_progress(move |current, _| {
                if current == 2 {
                    setter.store(true, Ordering::Relaxed);
                }
            })
            .generate_all(&requests(&["Ana", "Bruno", "Carla", "Davi"]))
            .unwrap();

        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.pending, 2);
    }
}
