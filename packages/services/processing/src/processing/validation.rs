use std::collections::HashSet;

use crate::config::Config;
use crate::models::{ImageKind, IncomingFile, ProcessingError, Result, ValidatedFile};

/// Server-side batch policy: file count cap, MIME allow-list and per-file size cap.
pub struct BatchValidator {
    max_files: usize,
    max_file_size_bytes: usize,
    allowed_mime_types: HashSet<String>,
}

impl BatchValidator {
    pub fn new(config: &Config) -> Self {
        Self {
            max_files: config.max_files,
            max_file_size_bytes: config.max_file_size_bytes(),
            allowed_mime_types: config
                .allowed_mime_types
                .iter()
                .map(|m| m.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Cheap precondition checked while the multipart body is still streaming.
    pub fn check_count(&self, count: usize) -> Result<()> {
        if count > self.max_files {
            return Err(ProcessingError::TooManyFiles { count, max: self.max_files });
        }
        Ok(())
    }

    pub fn validate_batch(&self, files: Vec<IncomingFile>) -> Result<Vec<ValidatedFile>> {
        if files.is_empty() {
            return Err(ProcessingError::Validation("No images provided".to_string()));
        }
        self.check_count(files.len())?;
        files.into_iter().map(|f| self.validate_file(f)).collect()
    }

    pub fn validate_file(&self, file: IncomingFile) -> Result<ValidatedFile> {
        if file.data.is_empty() {
            return Err(ProcessingError::Validation(format!("{} is empty", file.original_name)));
        }
        if file.data.len() > self.max_file_size_bytes {
            return Err(ProcessingError::FileTooLarge {
                name: file.original_name,
                size_bytes: file.data.len(),
                max_bytes: self.max_file_size_bytes,
            });
        }

        // Declared type first; clients that omit it fall back to sniffing alone
        if let Some(declared) = file.content_type.as_deref() {
            let essence = declared
                .parse::<mime::Mime>()
                .map(|m| m.essence_str().to_ascii_lowercase())
                .map_err(|_| ProcessingError::UnsupportedMediaType(declared.to_string()))?;
            if !self.allowed_mime_types.contains(&essence) {
                return Err(ProcessingError::UnsupportedMediaType(essence));
            }
        }

        let kind = ::image::guess_format(&file.data)
            .ok()
            .and_then(ImageKind::from_format)
            .ok_or_else(|| {
                ProcessingError::UnsupportedMediaType(format!("{} is not a JPEG or PNG image", file.original_name))
            })?;
        if !self.allowed_mime_types.contains(kind.mime_type()) {
            return Err(ProcessingError::UnsupportedMediaType(kind.mime_type().to_string()));
        }

        Ok(ValidatedFile { original_name: file.original_name, kind, data: file.data })
    }
}
