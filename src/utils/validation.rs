use std::path::Path;

/// Longest filename accepted as a storage key, in bytes
pub const MAX_FILENAME_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validates a client-supplied filename before it is used as a storage key.
///
/// Names are rejected, never rewritten: the same check guards both the upload
/// destination and the playback lookup, so a name that passes here maps to
/// exactly one entry directly under a storage root.
pub fn validate_filename(filename: &str) -> Result<&str, ValidationError> {
    if filename.is_empty() {
        return Err(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        });
    }

    if filename.len() > MAX_FILENAME_LEN {
        return Err(ValidationError {
            code: "FILENAME_TOO_LONG",
            message: format!(
                "Filename is {} bytes, maximum is {}",
                filename.len(),
                MAX_FILENAME_LEN
            ),
        });
    }

    if filename == "." || filename == ".." || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path traversal attempt detected: {:?}", filename);
        return Err(ValidationError {
            code: "PATH_TRAVERSAL",
            message: "Filename must not contain path separators or parent segments".to_string(),
        });
    }

    if let Some(c) = filename
        .chars()
        .find(|c| c.is_control() || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|'))
    {
        return Err(ValidationError {
            code: "INVALID_CHARACTER",
            message: format!("Filename contains a forbidden character {:?}", c),
        });
    }

    // Hidden names are reserved for staging files
    if filename.starts_with('.') {
        return Err(ValidationError {
            code: "HIDDEN_FILE",
            message: "Hidden files (starting with '.') are not allowed".to_string(),
        });
    }

    // Must resolve to exactly one normal path component
    if Path::new(filename).file_name().and_then(|n| n.to_str()) != Some(filename) {
        return Err(ValidationError {
            code: "PATH_TRAVERSAL",
            message: "Filename must be a single path component".to_string(),
        });
    }

    Ok(filename)
}

/// Case-insensitive extension check; `extensions` are given without the dot.
pub fn has_extension(filename: &str, extensions: &[String]) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_filename_accepts_plain_names() {
        assert_eq!(validate_filename("clip.mp4").unwrap(), "clip.mp4");
        assert_eq!(validate_filename("my file.csv").unwrap(), "my file.csv");
        assert_eq!(validate_filename("日本語.mp4").unwrap(), "日本語.mp4");
        assert_eq!(validate_filename("a..b.mp4").unwrap(), "a..b.mp4");
    }

    #[test]
    fn test_validate_filename_rejects_traversal() {
        for name in [
            "../../../etc/passwd",
            "..\\..\\windows\\system32",
            "videos/clip.mp4",
            "/etc/passwd",
            "..",
            ".",
        ] {
            let err = validate_filename(name).unwrap_err();
            assert_eq!(err.code, "PATH_TRAVERSAL", "{}", name);
        }
    }

    #[test]
    fn test_validate_filename_rejects_bad_input() {
        assert_eq!(validate_filename("").unwrap_err().code, "INVALID_FILENAME");
        assert_eq!(
            validate_filename("bad\u{0}name.mp4").unwrap_err().code,
            "INVALID_CHARACTER"
        );
        assert_eq!(
            validate_filename("line\nbreak.csv").unwrap_err().code,
            "INVALID_CHARACTER"
        );
        assert_eq!(validate_filename("what?.mp4").unwrap_err().code, "INVALID_CHARACTER");
        assert_eq!(validate_filename(".htaccess").unwrap_err().code, "HIDDEN_FILE");

        let long = format!("{}.mp4", "a".repeat(MAX_FILENAME_LEN));
        assert_eq!(validate_filename(&long).unwrap_err().code, "FILENAME_TOO_LONG");
    }

    #[test]
    fn test_has_extension() {
        let exts = vec!["mp4".to_string(), "webm".to_string()];
        assert!(has_extension("clip.mp4", &exts));
        assert!(has_extension("CLIP.MP4", &exts));
        assert!(has_extension("talk.webm", &exts));
        assert!(!has_extension("notes.txt", &exts));
        assert!(!has_extension("mp4", &exts));
        assert!(!has_extension("clip.mp4.part", &exts));
    }
}
