//! Markdown message bodies for informational commands.

use atlantis_core::Directory;

/// Line-oriented builder for Telegram legacy Markdown.
#[derive(Clone, Debug, Default)]
pub struct MessageBuilder {
    lines: Vec<String>,
}

impl MessageBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self { lines: vec![title.into()] }
    }

    pub fn blank(mut self) -> Self {
        self.lines.push(String::new());
        self
    }

    pub fn line(mut self, text: impl Into<String>) -> Self {
        self.lines.push(text.into());
        self
    }

    pub fn heading(self, text: &str) -> Self {
        self.line(format!("*{text}*"))
    }

    pub fn bullets<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.lines.extend(items.into_iter().map(|item| format!("• {}", item.as_ref())));
        self
    }

    pub fn build(self) -> String {
        self.lines.join("\n")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub model: String,
    pub port_count: usize,
    /// `None` when quote documents are disabled.
    pub document_format: Option<String>,
    pub vision_enabled: bool,
}

pub fn welcome_message() -> String {
    MessageBuilder::new("🌊 *Atlantis AI Agent*")
        .blank()
        .line("Advanced maritime logistics with:")
        .bullets([
            "Freight cost calculator",
            "PDF quote generation",
            "Document analysis",
            "Port database",
            "AI consultations",
        ])
        .blank()
        .heading("Commands:")
        .line("/quote - Interactive quote + PDF")
        .line("/cancel - Cancel the quote in progress")
        .line("/analyze - Document analyzer")
        .line("/ports - Port list")
        .line("/carriers - Shipping companies")
        .line("/docs - Documents guide")
        .line("/status - System status")
        .blank()
        .line("📄 Send document photos for analysis!")
        .line("💡 Ask any shipping question!")
        .build()
}

pub fn analyze_message() -> String {
    MessageBuilder::new("📄 *Document Analyzer*")
        .blank()
        .line("Send photos of:")
        .bullets([
            "Bill of Lading",
            "Commercial Invoice",
            "Packing List",
            "Certificate of Origin",
            "Any shipping document",
        ])
        .blank()
        .line("Add caption: \"analyze this\" or just send it!")
        .blank()
        .line("I'll verify and provide detailed feedback.")
        .build()
}

pub fn documents_guide_message() -> String {
    MessageBuilder::new("📋 *Shipping Documents*")
        .blank()
        .heading("EXPORT:")
        .bullets(["Commercial Invoice", "Packing List", "Bill of Lading", "Certificate of Origin"])
        .blank()
        .heading("IMPORT:")
        .bullets(["Customs Declaration", "Import License", "Delivery Order"])
        .blank()
        .heading("SPECIAL:")
        .bullets([
            "Insurance Certificate",
            "Dangerous Goods (if applicable)",
            "Health/Phyto Certificates",
        ])
        .blank()
        .line("Send photo with /analyze for verification!")
        .build()
}

pub fn ports_message(directory: &Directory) -> String {
    let mut message = MessageBuilder::new("🌍 *Ports:*").blank();
    for (country, ports) in directory.countries() {
        message = message.heading(&format!("{}:", country.to_uppercase()));
        for port in ports.values() {
            message = message.line(format!("  • {}", port.name));
        }
        message = message.blank();
    }
    message.build()
}

pub fn carriers_message(directory: &Directory) -> String {
    let mut message = MessageBuilder::new("🚢 *Carriers:*").blank();
    for carrier in directory.carriers() {
        message = message
            .heading(&carrier.name)
            .line(carrier.website.as_str())
            .line(format!("Rating: {:.1}/5", carrier.rating))
            .blank();
    }
    message.build()
}

pub fn status_message(status: &StatusSnapshot) -> String {
    let documents = match &status.document_format {
        Some(format) => format!("✅ ({format})"),
        None => "❌".to_owned(),
    };
    MessageBuilder::new("✅ *Atlantis Status*")
        .blank()
        .line(format!("AI: {}", status.model))
        .line(format!("Ports: {}", status.port_count))
        .line(format!("Documents: {documents}"))
        .line(format!("Vision: {}", if status.vision_enabled { "✅" } else { "❌" }))
        .line("System: 🟢 Online")
        .build()
}

pub fn unknown_command_message(name: &str) -> String {
    format!("🤔 Unknown command /{name}. Send /help to see what I can do.")
}
