//! Prompt text shared by the language-model engines

use alttext::Context;
use image::ImageFormat;

pub const DESCRIBE: &str = "Create alternative-text for this image.";

/// Prompt for a vision model, mentioning the flanking text when there is any
pub fn describe(context: Option<&Context>) -> String {
    match context.filter(|c| !c.is_empty()) {
        Some(context) => format!(
            "{} Use the text surrounding it in the document to decide what matters.\n{}",
            DESCRIBE,
            context_block(context)
        ),
        None => DESCRIBE.to_string(),
    }
}

pub fn refine_description(description: &str) -> String {
    format!(
        "Rewrite this machine-generated image description as concise, well-formed alt-text. \
         Only return the rewritten description.\n\nDescription: {}",
        description
    )
}

pub fn refine_ocr(text: &str) -> String {
    format!(
        "This text was read from an image by OCR and may contain errors or stray characters. \
         Correct it and only return the corrected text.\n\nText: {}",
        text
    )
}

/// Prompt composing one alt-text from every signal gathered for an image
pub fn compose_alt(
    description: &str,
    ocr_text: Option<&str>,
    context: Option<&Context>,
    caption: Option<&str>,
) -> String {
    let mut prompt = String::from(
        "Write alt-text for an image in a document. Use the information below, \
         keep it under 250 characters and only return the alt-text.\n\n",
    );
    prompt.push_str(&format!("Image description: {}\n", description));
    if let Some(text) = ocr_text.filter(|t| !t.trim().is_empty()) {
        prompt.push_str(&format!("Text found in the image: {}\n", text.trim()));
    }
    if let Some(caption) = caption.filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!("Caption: {}\n", caption.trim()));
    }
    if let Some(context) = context.filter(|c| !c.is_empty()) {
        prompt.push_str(&context_block(context));
    }
    prompt
}

fn context_block(context: &Context) -> String {
    let mut block = String::new();
    if let Some(before) = &context.before {
        block.push_str(&format!("Text before the image: {}\n", before));
    }
    if let Some(after) = &context.after {
        block.push_str(&format!("Text after the image: {}\n", after));
    }
    block
}

/// MIME type from the byte signature, falling back to the source extension
pub fn mime_type(image: &[u8], source: &str) -> String {
    if let Ok(format) = image::guess_format(image) {
        return format.to_mime_type().to_string();
    }

    let extension = source
        .split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    extension
        .as_deref()
        .and_then(ImageFormat::from_extension)
        .map(|format| format.to_mime_type().to_string())
        .or_else(|| match extension.as_deref() {
            Some("svg") => Some("image/svg+xml".to_string()),
            _ => None,
        })
        .unwrap_or_else(|| "application/octet-stream".to_string())
}
