//! Prompt text sent to the generation backend.

use shared::tool::IMPORT_SPREADSHEET_TOOL;

/// Attached file content beyond this many characters is cut from prompts.
pub const MAX_FILE_CHARS: usize = 30_000;

pub const SYSTEM_INSTRUCTION: &str =
    "You are an assistant specialised in cattle farming and the analysis of zootechnical data.";

pub const DASHBOARD_SUGGESTION_PROMPT: &str = "Act as a patient, didactic farm consultant \
talking to a producer who is just starting out. Based on the data summary below, give one clear \
and simple suggestion and explain why it matters in plain words. Avoid technical jargon.";

pub const IMAGE_ANALYSIS_PROMPT: &str = "Describe this image in detail. If it shows anything \
related to livestock, animal science or animal health (cattle, pastures, equipment, body \
condition), focus your analysis on those points.";

pub const NOT_ENOUGH_DATA: &str = "There is not enough data to generate an analysis yet.";

/// Get the suggestion prompt for a single index
pub fn index_suggestion_prompt(index_name: &str) -> String {
    format!(
        "Act as a patient farm consultant explaining things to a producer with no technical \
         background. Based on the '{}' data below, give one practical tip that is easy to put \
         into practice to improve this result, and explain in simple terms why it matters.",
        index_name
    )
}

/// Wraps a chat question.
pub fn user_question_prompt(user_text: &str) -> String {
    format!(
        "Using the data context provided (if any), answer the following user question: {}",
        user_text
    )
}

pub fn image_prompt(caption: Option<&str>) -> String {
    match caption.map(str::trim).filter(|c| !c.is_empty()) {
        Some(caption) => format!("{}\n\nThe user added: {}", IMAGE_ANALYSIS_PROMPT, caption),
        None => IMAGE_ANALYSIS_PROMPT.to_string(),
    }
}

fn clip(content: &str) -> String {
    if content.chars().count() <= MAX_FILE_CHARS {
        return content.to_string();
    }
    let mut clipped: String = content.chars().take(MAX_FILE_CHARS).collect();
    clipped.push_str("\n[... content truncated ...]");
    clipped
}

/// Prompt for a freshly attached document. `extraction_failed` switches to
/// asking the user for the content another way.
pub fn document_prompt(
    file_name: &str,
    content: &str,
    caption: Option<&str>,
    extraction_failed: bool,
) -> String {
    if extraction_failed {
        return format!(
            "The user attached the file '{}', but its content could not be extracted ({}). \
             Tell the user the format may not be supported or the file may be damaged, and ask \
             whether they can provide the content another way.",
            file_name, content
        );
    }
    let instruction = match caption.map(str::trim).filter(|c| !c.is_empty()) {
        Some(caption) => format!(
            "Based on the user's question or caption: '{}', analyse the file content below and answer.",
            caption
        ),
        None => "Analyse the content extracted from this file and give a summary, insights or the \
                 key points that matter."
            .to_string(),
    };
    format!(
        "The user attached the file named '{}'.\n{}\n\n--- FILE CONTENT ---\n{}\n--- END OF CONTENT ---",
        file_name,
        instruction,
        clip(content)
    )
}

/// Reminds the model of a document attached earlier in the conversation.
pub fn active_file_block(file_name: &str, content: &str, import_available: bool) -> String {
    let mut block = format!(
        "## Attached file: {}\nThe user attached this file earlier in the conversation. Use it \
         when it is relevant to the question.\n\n--- FILE CONTENT ---\n{}\n--- END OF CONTENT ---",
        file_name,
        clip(content)
    );
    if import_available {
        block.push_str("\n\n");
        block.push_str(&import_hint());
    }
    block
}

/// Tells the model when to call the import function.
pub fn import_hint() -> String {
    format!(
        "If the user asks to import or save this spreadsheet's records, call the `{}` function \
         instead of answering in text.",
        IMPORT_SPREADSHEET_TOOL
    )
}

/// Joins non-empty sections with blank lines.
pub fn assemble(sections: &[String]) -> String {
    sections
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n\n")
}
