//! Generate one certificate per recipient from a batch file
//! Run with: cargo run --example generate_batch -- --template t.pdf --batch batch.json --out output
//!
//! The batch file holds the shared course request, the recipients and the
//! signature image of each technical approver:
//!
//! ```json
//! {
//!   "course": { "courseFields": [{ "label": "Course", "value": "First Aid" }], ... },
//!   "recipients": [{ "name": "Maria Santos", "identifier": "42" }],
//!   "signatures": { "Helena Costa": "signatures/helena.png" }
//! }
//! ```
//!
//! Signature paths are relative to the batch file.

use anyhow::{Context, Result};
use certificate::{
    BackgroundRemoval, BatchFailure, BatchGenerator, CertificateError, CertificateRenderer,
    DocumentTemplate, FontRole, GenerationRequest, PageLayout, Recipient,
};
use clap::Parser;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(version, about = "Generate certificates for a list of recipients")]
struct Args {
    /// Template PDF
    #[arg(long, value_name = "PDF")]
    template: PathBuf,

    /// Batch description (JSON)
    #[arg(long, value_name = "JSON")]
    batch: PathBuf,

    /// Output directory
    #[arg(long, value_name = "DIR")]
    out: PathBuf,

    /// Page layout overriding the default regions (JSON)
    #[arg(long, value_name = "JSON")]
    layout: Option<PathBuf>,

    /// TrueType font for regular text
    #[arg(long, value_name = "TTF")]
    font: Option<PathBuf>,

    /// TrueType font for bold text
    #[arg(long, value_name = "TTF")]
    bold_font: Option<PathBuf>,

    /// Remove the paper background from signature images
    #[arg(long)]
    clean_signatures: bool,
}

#[derive(Deserialize)]
struct BatchFile {
    course: GenerationRequest,
    recipients: Vec<Recipient>,
    #[serde(default)]
    signatures: BTreeMap<String, PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let renderer = build_renderer(&args)?;

    // A template that cannot be loaded still yields placeholder documents
    let template = fs::read(&args.template)
        .map_err(anyhow::Error::from)
        .and_then(|bytes| DocumentTemplate::from_bytes(&bytes).map_err(anyhow::Error::from));
    let template = match template {
        Ok(template) => Some(template),
        Err(e) => {
            log::warn!("template {:?} unavailable: {e}", args.template);
            None
        }
    };

    let requests = load_requests(&args.batch)?;
    fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create {:?}", args.out))?;

    let report = BatchGenerator::new(&renderer, template.as_ref())
        .on_progress(|current, total| log::info!("{current}/{total}"))
        .generate_all(&requests);
    let report = match report {
        Err(CertificateError::BatchFailed(failures)) => {
            failures.iter().for_each(log_failure);
            return Err(CertificateError::BatchFailed(failures).into());
        }
        report => report?,
    };

    for document in &report.documents {
        let path = args.out.join(document.file_name());
        fs::write(&path, &document.bytes)
            .with_context(|| format!("Failed to write {path:?}"))?;
        for warning in &document.warnings {
            log::warn!("{}: {warning}", document.file_name());
        }
    }
    report.failures.iter().for_each(log_failure);

    println!(
        "{} certificates written to {:?} ({} placeholders, {} failed)",
        report.documents.len(),
        args.out,
        report.degraded_count(),
        report.failures.len()
    );

    Ok(())
}

fn log_failure(failure: &BatchFailure) {
    log::error!(
        "#{} {}: {}",
        failure.index,
        failure.recipient_name,
        failure.reason
    );
}

fn build_renderer(args: &Args) -> Result<CertificateRenderer> {
    let mut renderer = match &args.layout {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read layout {path:?}"))?;
            CertificateRenderer::with_layout(PageLayout::from_json(&json)?)
        }
        None => CertificateRenderer::new(),
    };

    for (role, path) in [(FontRole::Regular, &args.font), (FontRole::Bold, &args.bold_font)] {
        if let Some(path) = path {
            let data = fs::read(path).with_context(|| format!("Failed to read font {path:?}"))?;
            renderer.load_font(role, &data)?;
        }
    }

    if args.clean_signatures {
        renderer = renderer.with_signature_cleanup(BackgroundRemoval::default());
    }

    Ok(renderer)
}

fn load_requests(path: &Path) -> Result<Vec<GenerationRequest>> {
    let json =
        fs::read_to_string(path).with_context(|| format!("Failed to read batch {path:?}"))?;
    let batch: BatchFile = serde_json::from_str(&json).context("Invalid batch file")?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let mut course = batch.course;
    for approver in &mut course.technical_approvers {
        if let Some(file) = batch.signatures.get(&approver.name) {
            let file = base.join(file);
            approver.signature_image = Some(
                fs::read(&file).with_context(|| format!("Failed to read signature {file:?}"))?,
            );
        }
    }

    Ok(batch
        .recipients
        .into_iter()
        .map(|recipient| course.for_recipient(recipient))
        .collect())
}
