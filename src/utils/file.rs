use crate::constants;
use crate::model::material::Upload;
use crate::types::error::{Error, Result};
use std::path::Path;

pub async fn async_get_content(path: &Path) -> Result<String> {
    async_fs::read_to_string(path)
        .await
        .map_err(|e| Error::system_error(format!("{}: {}", path.display(), e).as_str()))
}

/// Lower-cased extension including the dot, e.g. `.pdf`.
pub fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}

/// Size and extension checks for ticket attachments.
pub fn validate_attachment(upload: &Upload) -> Result<()> {
    if upload.bytes.len() > constants::MAX_ATTACHMENT_SIZE {
        return Err(Error::bad_request(
            format!(
                "file is too large, the limit is {} MB",
                constants::MAX_ATTACHMENT_SIZE / (1024 * 1024)
            )
            .as_str(),
        ));
    }
    match extension_of(&upload.file_name) {
        Some(ext) if constants::ALLOWED_ATTACHMENT_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(Error::bad_request(
            format!(
                "file type not allowed, use one of {}",
                constants::ALLOWED_ATTACHMENT_EXTENSIONS.join(", ")
            )
            .as_str(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_listed_extensions_in_any_case() {
        assert!(validate_attachment(&Upload::new("notes.PDF", "application/pdf", vec![1])).is_ok());
        assert!(validate_attachment(&Upload::new("scan.jpeg", "image/jpeg", vec![1])).is_ok());
    }

    #[test]
    fn rejects_bad_type_and_size() {
        assert!(validate_attachment(&Upload::new("run.exe", "application/octet-stream", vec![1])).is_err());
        assert!(validate_attachment(&Upload::new("README", "text/plain", vec![1])).is_err());
        let big = vec![0u8; constants::MAX_ATTACHMENT_SIZE + 1];
        assert!(validate_attachment(&Upload::new("big.pdf", "application/pdf", big)).is_err());
    }
}
