use std::{collections::HashMap, fmt, str::FromStr};

use time::OffsetDateTime;

use crate::error::FilesystemError;

/// Portable visibility of a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    /// Parses a visibility string for `path`, failing before anything reaches the backend.
    pub fn parse_for(path: &str, visibility: &str) -> Result<Self, FilesystemError> {
        visibility.parse().map_err(|message| FilesystemError::InvalidVisibility {
            path: path.to_string(),
            message,
            source: None,
        })
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(format!("unknown visibility: {}", other)),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only description of a stored object. Query operations fill in
/// only the fields they were asked for.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FileAttributes {
    pub path: String,
    pub file_size: Option<u64>,
    pub visibility: Option<Visibility>,
    pub last_modified: Option<OffsetDateTime>,
    pub mime_type: Option<String>,
    pub extra_metadata: HashMap<String, String>,
}

impl FileAttributes {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Default::default()
        }
    }

    pub fn with_file_size(mut self, size: u64) -> Self {
        self.file_size = Some(size);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_last_modified(mut self, last_modified: Option<OffsetDateTime>) -> Self {
        self.last_modified = last_modified;
        self
    }

    pub fn with_mime_type(mut self, mime_type: Option<String>) -> Self {
        self.mime_type = mime_type;
        self
    }

    pub fn with_extra(mut self, key: &str, value: Option<String>) -> Self {
        if let Some(value) = value {
            self.extra_metadata.insert(key.to_string(), value);
        }
        self
    }

    pub fn last_modified_timestamp(&self) -> Option<i64> {
        self.last_modified.map(|t| t.unix_timestamp())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DirectoryAttributes {
    pub path: String,
    pub last_modified: Option<OffsetDateTime>,
}

impl DirectoryAttributes {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.trim_end_matches('/').to_string(),
            last_modified: None,
        }
    }
}

/// One entry of a listing.
#[derive(Clone, Debug, PartialEq)]
pub enum StorageAttributes {
    File(FileAttributes),
    Directory(DirectoryAttributes),
}

impl StorageAttributes {
    pub fn path(&self) -> &str {
        match self {
            StorageAttributes::File(f) => &f.path,
            StorageAttributes::Directory(d) => &d.path,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, StorageAttributes::File(_))
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, StorageAttributes::Directory(_))
    }
}

/// Per-call options for writes, copies and moves.
#[derive(Clone, Debug, Default)]
pub struct WriteConfig {
    pub visibility: Option<Visibility>,
    pub mime_type: Option<String>,
    /// Re-apply the source object's ACL to the destination on copy and move.
    pub retain_visibility: bool,
}

impl WriteConfig {
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = Some(mime_type.to_string());
        self
    }

    pub fn retaining_visibility(mut self) -> Self {
        self.retain_visibility = true;
        self
    }
}
