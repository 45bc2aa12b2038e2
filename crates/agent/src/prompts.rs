/// System prompt for every completion.
pub const SYSTEM_PROMPT: &str = "You are Atlantis AI, expert maritime logistics agent.
Be specific, concise (250-500 words), mention real companies, warn about hidden costs, 
and always state estimates may vary.";

pub const SHIPMENT_TIPS_PROMPT: &str = "Give 3 key tips for this shipment";

pub fn system_message(context: Option<&str>) -> String {
    match context.map(str::trim).filter(|context| !context.is_empty()) {
        Some(context) => format!("{SYSTEM_PROMPT}\n\nContext: {context}"),
        None => SYSTEM_PROMPT.to_string(),
    }
}

/// Asks for a structured review of a captioned shipping document.
pub fn document_analysis_prompt(scan: &str) -> String {
    format!(
        "Analyze this shipping document: \"{scan}\"

Provide:
**DOCUMENT TYPE:** [Bill of Lading/Invoice/etc]
**KEY INFO:** Main details visible
**CHECKLIST:** What's present/missing
**WARNINGS:** Issues to check
**NEXT STEPS:** What to do

Keep under 400 words."
    )
}
