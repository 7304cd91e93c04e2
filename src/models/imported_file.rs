use bytes::Bytes;
use serde_json::Value;

/// Upload kinds, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Json,
    Pdf,
    Image,
}

impl FileKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(FileKind::Json),
            "pdf" => Some(FileKind::Pdf),
            "jpg" | "jpeg" | "png" => Some(FileKind::Image),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Json => "json",
            FileKind::Pdf => "pdf",
            FileKind::Image => "image",
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self, FileKind::Pdf | FileKind::Image)
    }
}

#[derive(Debug, Clone)]
pub enum ImportedFile {
    Json { file_name: String, data: Value },
    Pdf { file_name: String, data: Bytes },
    Image { file_name: String, data: Bytes },
}

impl ImportedFile {
    pub fn kind(&self) -> FileKind {
        match self {
            ImportedFile::Json { .. } => FileKind::Json,
            ImportedFile::Pdf { .. } => FileKind::Pdf,
            ImportedFile::Image { .. } => FileKind::Image,
        }
    }

    pub fn file_name(&self) -> &str {
        match self {
            ImportedFile::Json { file_name, .. }
            | ImportedFile::Pdf { file_name, .. }
            | ImportedFile::Image { file_name, .. } => file_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_dispatch_is_case_insensitive() {
        assert_eq!(FileKind::from_extension("PDF"), Some(FileKind::Pdf));
        assert_eq!(FileKind::from_extension("Jpeg"), Some(FileKind::Image));
        assert_eq!(FileKind::from_extension("json"), Some(FileKind::Json));
        assert_eq!(FileKind::from_extension("docx"), None);
        assert_eq!(FileKind::from_extension("gif"), None);
    }
}
