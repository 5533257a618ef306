use std::fmt;

/// Status text reported for a batch or for a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Processing,
    UnsupportedFormat,
    ReadFailure,
    DecodeFailure,
    CompressionFailure,
    CompressionProcess,
    Success,
}

impl Status {
    pub fn message(self) -> &'static str {
        match self {
            Status::Processing => "Processing images...",
            Status::UnsupportedFormat => {
                "Error: Unsupported file format. Please upload an image file."
            }
            Status::ReadFailure => "Error: Failed to read file.",
            Status::DecodeFailure => "Error: Failed to load image.",
            Status::CompressionFailure => "Error: Failed to compress image.",
            Status::CompressionProcess => "Error: Compression process failed.",
            Status::Success => "Image compressed and downloaded successfully.",
        }
    }

    pub fn is_error(self) -> bool {
        !matches!(self, Status::Processing | Status::Success)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_statuses_are_prefixed() {
        for status in [
            Status::UnsupportedFormat,
            Status::ReadFailure,
            Status::DecodeFailure,
            Status::CompressionFailure,
            Status::CompressionProcess,
        ] {
            assert!(status.is_error());
            assert!(status.to_string().starts_with("Error: "));
        }
        assert!(!Status::Success.is_error());
        assert!(!Status::Processing.is_error());
    }

    #[test]
    fn success_text() {
        assert_eq!(
            Status::Success.to_string(),
            "Image compressed and downloaded successfully."
        );
    }
}
