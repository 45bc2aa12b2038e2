//! Quote documents
//!
//! Renders a finished freight quote into HTML with Tera and, when a converter
//! such as `wkhtmltopdf` is installed, into PDF.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use atlantis_agent::{QuoteDocumentRenderer, RenderedDocument};
use atlantis_core::domain::quote::{format_usd, format_weight};
use atlantis_core::freight::title_case;
use atlantis_core::{FreightQuote, RouteSource};
use chrono::Utc;
use serde::Serialize;
use tera::{Context, Tera};
use tokio::process::Command;
use tracing::{error, info, warn};

const TEMPLATE_NAME: &str = "freight_quote.html";
const CONVERSION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("template error: {0}")]
    Template(String),
    #[error("conversion error: {0}")]
    Conversion(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentBody {
    Pdf(Vec<u8>),
    Html(String),
}

#[derive(Debug, Serialize)]
struct CostLine {
    label: &'static str,
    amount: String,
}

#[derive(Clone, Debug)]
pub struct QuoteDocumentGenerator {
    tera: Tera,
    converter_path: Option<PathBuf>,
}

impl QuoteDocumentGenerator {
    /// `converter` is looked up on `PATH`; HTML is produced when it is missing.
    pub fn new(converter: &str) -> Result<Self, DocumentError> {
        let converter_path = which::which(converter).ok();
        match &converter_path {
            Some(path) => info!(path = %path.display(), "document converter found"),
            None => warn!(converter, "document converter not found in PATH - quotes are sent as HTML"),
        }
        Self::with_converter(converter_path)
    }

    pub fn with_converter(converter_path: Option<PathBuf>) -> Result<Self, DocumentError> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, include_str!("../templates/freight_quote.html.tera"))
            .map_err(|error| DocumentError::Template(error.to_string()))?;
        Ok(Self { tera, converter_path })
    }

    pub fn produces_pdf(&self) -> bool {
        self.converter_path.is_some()
    }

    pub fn render_html(&self, quote: &FreightQuote, reference: &str) -> Result<String, DocumentError> {
        let lines: Vec<CostLine> = quote
            .breakdown
            .components()
            .into_iter()
            .map(|(label, amount)| CostLine { label, amount: format_usd(amount) })
            .collect();

        let mut context = Context::new();
        context.insert("reference", reference);
        context.insert("issued_at", &Utc::now().format("%Y-%m-%d %H:%M UTC").to_string());
        context.insert("origin", &quote.origin_label);
        context.insert("destination", &quote.destination_label);
        context.insert("distance_nm", &format!("{:.0}", quote.distance_nm));
        context.insert("transit_days", &quote.transit_label());
        context.insert("cargo", &title_case(&quote.cargo_key));
        context.insert("weight_tons", &format_weight(quote.weight_tons));
        context.insert("container", quote.container.label());
        context.insert("recommended_container", &quote.cargo_type.container);
        context.insert("fallback_route", &(quote.route_source == RouteSource::Fallback));
        context.insert("lines", &lines);
        context.insert("total", &format_usd(quote.breakdown.total));

        self.tera
            .render(TEMPLATE_NAME, &context)
            .map_err(|error| DocumentError::Template(error.to_string()))
    }

    /// Falls back to HTML when conversion fails.
    pub async fn generate(&self, quote: &FreightQuote, reference: &str) -> Result<DocumentBody, DocumentError> {
        let html = self.render_html(quote, reference)?;
        let Some(converter) = &self.converter_path else {
            return Ok(DocumentBody::Html(html));
        };

        match convert_html_to_pdf(&html, converter).await {
            Ok(pdf) => Ok(DocumentBody::Pdf(pdf)),
            Err(conversion_error) => {
                warn!(error = %conversion_error, "PDF conversion failed, falling back to HTML");
                Ok(DocumentBody::Html(html))
            }
        }
    }
}

#[async_trait]
impl QuoteDocumentRenderer for QuoteDocumentGenerator {
    async fn render(&self, quote: &FreightQuote, correlation_id: &str) -> anyhow::Result<RenderedDocument> {
        let reference = short_reference(correlation_id);
        let document = match self.generate(quote, &reference).await? {
            DocumentBody::Pdf(bytes) => RenderedDocument {
                file_name: format!("atlantis-quote-{reference}.pdf"),
                mime_type: "application/pdf".to_owned(),
                bytes,
                caption: Some("📄 Your freight quote".to_owned()),
            },
            DocumentBody::Html(html) => RenderedDocument {
                file_name: format!("atlantis-quote-{reference}.html"),
                mime_type: "text/html".to_owned(),
                bytes: html.into_bytes(),
                caption: Some("📄 Your freight quote (open in a browser to print)".to_owned()),
            },
        };
        Ok(document)
    }

    fn format_label(&self) -> &str {
        if self.produces_pdf() {
            "PDF"
        } else {
            "HTML"
        }
    }
}

fn short_reference(correlation_id: &str) -> String {
    let reference: String =
        correlation_id.chars().filter(char::is_ascii_alphanumeric).take(8).collect();
    if reference.is_empty() {
        "quote".to_owned()
    } else {
        reference.to_ascii_uppercase()
    }
}

async fn convert_html_to_pdf(html: &str, converter: &Path) -> Result<Vec<u8>, DocumentError> {
    let temp_dir = std::env::temp_dir();
    let stem = format!("atlantis_quote_{}", uuid::Uuid::new_v4());
    let html_path = temp_dir.join(format!("{stem}.html"));
    let pdf_path = temp_dir.join(format!("{stem}.pdf"));

    tokio::fs::write(&html_path, html).await?;
    let result = run_converter(converter, &html_path, &pdf_path).await;

    let _ = tokio::fs::remove_file(&html_path).await;
    let pdf = match result {
        Ok(()) => tokio::fs::read(&pdf_path).await.map_err(DocumentError::from),
        Err(conversion_error) => Err(conversion_error),
    };
    let _ = tokio::fs::remove_file(&pdf_path).await;

    let pdf = pdf?;
    info!(size = pdf.len(), "PDF generated successfully");
    Ok(pdf)
}

async fn run_converter(converter: &Path, html_path: &Path, pdf_path: &Path) -> Result<(), DocumentError> {
    let mut command = Command::new(converter);
    command
        .args(["--page-size", "A4", "--margin-top", "10mm", "--margin-bottom", "10mm"])
        .args(["--margin-left", "10mm", "--margin-right", "10mm", "--encoding", "utf-8"])
        .arg("--quiet")
        .arg(html_path)
        .arg(pdf_path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(CONVERSION_TIMEOUT, command.output())
        .await
        .map_err(|_| DocumentError::Conversion("converter timed out".to_owned()))??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(stderr = %stderr, "wkhtmltopdf failed");
        return Err(DocumentError::Conversion(stderr.to_string()));
    }
    Ok(())
}
