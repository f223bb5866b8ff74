use crate::error::FilesystemError;

pub const SEPARATOR: char = '/';
const URI_SCHEME: &str = "oss://";

/// Splits `oss://bucket/key` into its bucket and key. Plain keys yield no bucket.
pub fn parse_object_uri(uri: &str) -> (Option<&str>, &str) {
    match uri.strip_prefix(URI_SCHEME) {
        None => (None, uri),
        Some(rest) => match rest.split_once(SEPARATOR) {
            Some((bucket, key)) => (Some(bucket), key),
            None => (Some(rest), ""),
        },
    }
}

/// `dir`, `dir/` and `dir//` all become `dir/`.
pub fn directory_prefix(path: &str) -> String {
    format!("{}{}", path.trim_end_matches(SEPARATOR), SEPARATOR)
}

/// Listing prefix for `path`; the bucket root lists without one.
pub fn listing_prefix(path: &str) -> Option<String> {
    if path.trim_matches(SEPARATOR).is_empty() {
        None
    } else {
        Some(directory_prefix(path))
    }
}

/// Normalizes a caller-supplied path into an object key.
///
/// Backslashes become separators, empty and `.` segments are dropped and
/// `..` pops the previous segment. Walking above the root or embedding
/// control characters is rejected.
pub fn normalize_path(path: &str) -> Result<String, FilesystemError> {
    if path.chars().any(|c| c.is_control()) {
        return Err(FilesystemError::InvalidInput(format!(
            "corrupted path detected: {:?}",
            path
        )));
    }

    let path = path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(FilesystemError::InvalidInput(format!(
                        "path traversal detected: {}",
                        path
                    )));
                }
            }
            segment => segments.push(segment),
        }
    }

    Ok(segments.join("/"))
}

/// Rejects keys an object cannot be written under.
pub fn ensure_file_key(path: &str) -> Result<(), FilesystemError> {
    if path.is_empty() {
        return Err(FilesystemError::InvalidInput(
            "path must not be empty".to_string(),
        ));
    }

    if path.ends_with(SEPARATOR) {
        return Err(FilesystemError::InvalidInput(format!(
            "path must not end with a separator: {}",
            path
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_uri() {
        let cases = vec![
            ("oss://bucket/dir/file.txt", (Some("bucket"), "dir/file.txt")),
            ("oss://bucket", (Some("bucket"), "")),
            ("oss://bucket/", (Some("bucket"), "")),
            ("dir/file.txt", (None, "dir/file.txt")),
            ("s3://bucket/key", (None, "s3://bucket/key")),
        ];

        for (input, expected) in cases {
            assert_eq!(parse_object_uri(input), expected, "failed for case: {}", input);
        }
    }

    #[test]
    fn test_directory_prefix() {
        let cases = vec![
            ("dir", "dir/"),
            ("dir/", "dir/"),
            ("dir//", "dir/"),
            ("a/b", "a/b/"),
            ("", "/"),
        ];

        for (input, expected) in cases {
            assert_eq!(directory_prefix(input), expected, "failed for case: {}", input);
        }
    }

    #[test]
    fn test_listing_prefix() {
        assert_eq!(listing_prefix(""), None);
        assert_eq!(listing_prefix("/"), None);
        assert_eq!(listing_prefix("dir"), Some("dir/".to_string()));
    }

    #[test]
    fn test_normalize_path() {
        let cases = vec![
            ("file.txt", "file.txt"),
            ("/dir/file.txt", "dir/file.txt"),
            ("dir/./file.txt", "dir/file.txt"),
            ("dir/sub/../file.txt", "dir/file.txt"),
            ("dir\\file.txt", "dir/file.txt"),
            ("dir//file.txt/", "dir/file.txt"),
            ("", ""),
        ];

        for (input, expected) in cases {
            let result = normalize_path(input).unwrap();
            assert_eq!(result, expected, "failed for case: {}", input);
        }
    }

    #[test]
    fn test_normalize_path_rejects() {
        let cases = vec!["../file.txt", "dir/../../file.txt", "dir/fi\u{0}le", "a\tb"];

        for input in cases {
            assert!(
                matches!(normalize_path(input), Err(FilesystemError::InvalidInput(_))),
                "failed for case: {:?}",
                input
            );
        }
    }

    #[test]
    fn test_ensure_file_key() {
        assert!(ensure_file_key("dir/file.txt").is_ok());
        assert!(ensure_file_key("").is_err());
        assert!(ensure_file_key("dir/").is_err());
    }
}
