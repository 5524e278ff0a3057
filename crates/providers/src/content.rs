//! Message content encoding for multimodal requests.
//!
//! Text-only messages collapse to a plain string. Messages with images
//! become a list of parts shaped for the configured endpoint family.

use serde_json::{Value, json};
use steward_config::ImageFormat;
use steward_core::conversation::ImagePayload;

/// Build the `content` field of a chat message.
pub fn build_user_content(text: &str, images: &[ImagePayload], format: ImageFormat) -> Value {
    if images.is_empty() {
        return Value::String(text.trim().to_string());
    }

    let mut parts = Vec::with_capacity(images.len() + 1);
    if !text.trim().is_empty() {
        parts.push(text_part(text.trim(), format));
    }
    parts.extend(images.iter().map(|image| image_part(image, format)));
    Value::Array(parts)
}

fn text_part(text: &str, format: ImageFormat) -> Value {
    match format {
        ImageFormat::Gemini => json!({ "text": text }),
        ImageFormat::OpenAi | ImageFormat::OpenSource => json!({ "type": "text", "text": text }),
    }
}

fn image_part(image: &ImagePayload, format: ImageFormat) -> Value {
    match format {
        ImageFormat::OpenAi => json!({
            "type": "image_url",
            "image_url": { "url": image.to_data_url() },
        }),
        ImageFormat::Gemini => json!({
            "inline_data": {
                "mime_type": image.mime_type,
                "data": image.base64_data,
            }
        }),
        ImageFormat::OpenSource => json!({ "type": "image", "url": image.to_data_url() }),
    }
}
