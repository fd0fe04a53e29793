//! Local image attachments.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chorus_core::{ChorusError, Result};
use std::path::Path;

/// Reads an image file and encodes it as a `data:<mime>;base64,...` URL.
pub async fn image_data_url(path: &Path) -> Result<String> {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_() != mime_guess::mime::IMAGE {
        return Err(ChorusError::data_access(format!(
            "{} is not an image ({})",
            path.display(),
            mime
        )));
    }

    let bytes = tokio::fs::read(path).await?;
    Ok(format!(
        "data:{};base64,{}",
        mime.essence_str(),
        BASE64_STANDARD.encode(bytes)
    ))
}
