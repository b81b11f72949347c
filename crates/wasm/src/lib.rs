//! WASM bindings for certforge
//!
//! This crate provides JavaScript-friendly API for:
//! - Loading a certificate template and fonts
//! - Rendering one certificate or a whole batch
//! - Removing the background of signature images
//!
//! # Example (JavaScript)
//!
//! ```javascript
//! import init, { CertificateEngine } from 'certforge-wasm';
//!
//! await init();
//!
//! const engine = new CertificateEngine();
//! engine.loadTemplate(pdfBytes);
//! engine.loadFont('regular', regularTtf);
//! engine.loadFont('bold', boldTtf);
//!
//! const pdf = engine.render({ recipient: { name: "Maria Santos" }, ... });
//! console.log(engine.lastWarnings());
//!
//! const pdfs = engine.renderBatch(requests, (current, total) => {
//!   progress.value = current / total;
//! });
//! ```

use certificate::{
    BackgroundRemoval, BatchFailure, BatchGenerator, BatchReport, CertificateError,
    CertificateRenderer, DocumentTemplate, FontRole, GenerationRequest, PageLayout, RenderWarning,
};
use wasm_bindgen::prelude::*;

// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Certificate renderer bound to one template
#[wasm_bindgen]
pub struct CertificateEngine {
    renderer: CertificateRenderer,
    template: Option<DocumentTemplate>,
    last_warnings: Vec<RenderWarning>,
    last_failures: Vec<BatchFailure>,
}

#[wasm_bindgen]
impl CertificateEngine {
    /// Create an engine with the default layout and Helvetica
    #[wasm_bindgen(constructor)]
    pub fn new() -> CertificateEngine {
        CertificateEngine {
            renderer: CertificateRenderer::new(),
            template: None,
            last_warnings: Vec::new(),
            last_failures: Vec::new(),
        }
    }

    /// Load the template PDF
    ///
    /// Until a template loads, renders produce placeholder pages.
    ///
    /// @param data - PDF file bytes (Uint8Array)
    #[wasm_bindgen(js_name = loadTemplate)]
    pub fn load_template(&mut self, data: &[u8]) -> Result<(), JsValue> {
        self.template = Some(DocumentTemplate::from_bytes(data).map_err(js_error)?);
        Ok(())
    }

    /// Number of pages in the loaded template, 0 if none
    #[wasm_bindgen(js_name = templatePages)]
    pub fn template_pages(&self) -> usize {
        self.template
            .as_ref()
            .map(DocumentTemplate::page_count)
            .unwrap_or(0)
    }

    /// Load a TrueType font
    ///
    /// @param role - "regular" or "bold"
    /// @param data - TTF file bytes (Uint8Array)
    #[wasm_bindgen(js_name = loadFont)]
    pub fn load_font(&mut self, role: &str, data: &[u8]) -> Result<(), JsValue> {
        let role: FontRole = role.parse().map_err(js_error)?;
        self.renderer.load_font(role, data).map_err(js_error)
    }

    /// Replace the page layout
    ///
    /// @param json - Layout JSON; missing regions keep their defaults
    #[wasm_bindgen(js_name = setLayout)]
    pub fn set_layout(&mut self, json: &str) -> Result<(), JsValue> {
        let layout = PageLayout::from_json(json).map_err(js_error)?;
        self.renderer.set_layout(layout);
        Ok(())
    }

    /// Remove the paper background from signatures before placing them
    #[wasm_bindgen(js_name = setSignatureCleanup)]
    pub fn set_signature_cleanup(&mut self, enabled: bool) {
        self.renderer
            .set_signature_cleanup(enabled.then(BackgroundRemoval::default));
    }

    /// Render one certificate
    ///
    /// @param request - Generation request object
    /// @returns PDF bytes (Uint8Array)
    pub fn render(&mut self, request: JsValue) -> Result<Vec<u8>, JsValue> {
        let request: GenerationRequest = serde_wasm_bindgen::from_value(request)?;
        let rendered = self
            .renderer
            .render(self.template.as_ref(), &request)
            .map_err(js_error)?;

        self.last_warnings = rendered.warnings;
        self.last_failures.clear();
        Ok(rendered.bytes)
    }

    /// Warnings of the last `render` or `renderBatch` call
    #[wasm_bindgen(js_name = lastWarnings)]
    pub fn last_warnings(&self) -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(&self.last_warnings)?)
    }

    /// Recipients left out of the last `renderBatch` call
    #[wasm_bindgen(js_name = lastFailures)]
    pub fn last_failures(&self) -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(&self.last_failures)?)
    }

    /// Render a certificate per request
    ///
    /// Failed recipients are left out of the result and reported through
    /// `lastFailures`.
    ///
    /// @param requests - Array of generation request objects
    /// @param progress - Optional callback `(current, total) => void`
    /// @returns Array of PDF bytes (Uint8Array[])
    #[wasm_bindgen(js_name = renderBatch)]
    pub fn render_batch(
        &mut self,
        requests: JsValue,
        progress: Option<js_sys::Function>,
    ) -> Result<js_sys::Array, JsValue> {
        let requests: Vec<GenerationRequest> = serde_wasm_bindgen::from_value(requests)?;
        let report = self.run_batch(&requests, progress);
        Ok(self.collect_report(report.map_err(js_error)?))
    }

    /// Remove the background of a signature image
    ///
    /// @param data - PNG or JPEG bytes (Uint8Array)
    /// @returns RGBA PNG bytes (Uint8Array)
    #[wasm_bindgen(js_name = removeBackground)]
    pub fn remove_background(data: &[u8]) -> Result<Vec<u8>, JsValue> {
        certificate::remove_background(data).map_err(js_error)
    }
}

impl CertificateEngine {
    /// Run a batch, keeping the failures of a batch that failed outright
    fn run_batch(
        &mut self,
        requests: &[GenerationRequest],
        progress: Option<js_sys::Function>,
    ) -> Result<BatchReport, CertificateError> {
        self.last_warnings.clear();
        self.last_failures.clear();

        let mut generator = BatchGenerator::new(&self.renderer, self.template.as_ref());
        if let Some(callback) = progress {
            generator = generator.on_progress(move |current, total| {
                let _ = callback.call2(
                    &JsValue::NULL,
                    &JsValue::from(current as u32),
                    &JsValue::from(total as u32),
                );
            });
        }
        let result = generator.generate_all(requests);
        if let Err(CertificateError::BatchFailed(failures)) = &result {
            self.last_failures = failures.clone();
        }
        result
    }

    fn collect_report(&mut self, report: BatchReport) -> js_sys::Array {
        let mut warnings = Vec::new();
        let output = js_sys::Array::new();
        for document in report.documents {
            warnings.extend(document.warnings);
            output.push(&js_sys::Uint8Array::from(document.bytes.as_slice()));
        }
        self.last_warnings = warnings;
        self.last_failures = report.failures;

        output
    }
}

impl Default for CertificateEngine {
    fn default() -> Self {
        Self::new()
    }
}
