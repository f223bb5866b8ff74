use std::fmt;

/// Broad classification of a backend fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientErrorKind {
    NotFound,
    AccessDenied,
    InvalidArgument,
    Service,
    Transport,
    Io,
}

/// A failure reported by an `ObjectClient`.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{message}")]
pub struct ClientError {
    pub kind: ClientErrorKind,
    pub code: Option<String>,
    pub message: String,
}

impl ClientError {
    pub fn new(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::NotFound, message).with_code("NoSuchKey")
    }

    pub fn service(code: &str, message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Service, message).with_code(code)
    }

    pub fn io(err: std::io::Error) -> Self {
        Self::new(ClientErrorKind::Io, format!("failed to read stream, {}", err))
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ClientErrorKind::NotFound
    }
}

/// The attribute a metadata query was after.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetadataKind {
    Visibility,
    MimeType,
    LastModified,
    FileSize,
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetadataKind::Visibility => "visibility",
            MetadataKind::MimeType => "mime type",
            MetadataKind::LastModified => "last modified",
            MetadataKind::FileSize => "file size",
        };
        f.write_str(name)
    }
}

/// Which half of a copy-then-delete move failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveFailure {
    Copy,
    DeleteSource,
}

impl fmt::Display for MoveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveFailure::Copy => f.write_str("copying to the destination failed"),
            MoveFailure::DeleteSource => f.write_str(concat!(
                "the destination was written but the source could not be deleted, ",
                "both objects exist"
            )),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FilesystemError {
    #[error("unable to write file at location: {path}")]
    WriteFailed {
        path: String,
        #[source]
        source: ClientError,
    },

    #[error("unable to read file from location: {path}")]
    ReadFailed {
        path: String,
        #[source]
        source: ClientError,
    },

    #[error("unable to delete file at location: {path}")]
    DeleteFailed {
        path: String,
        #[source]
        source: ClientError,
    },

    #[error("unable to move file from {source_path} to {destination}: {reason}")]
    MoveFailed {
        source_path: String,
        destination: String,
        reason: MoveFailure,
        #[source]
        source: Box<FilesystemError>,
    },

    #[error("unable to copy file from {source_path} to {destination}")]
    CopyFailed {
        source_path: String,
        destination: String,
        #[source]
        source: ClientError,
    },

    #[error("unable to retrieve the {metadata} for file at location: {path}")]
    MetadataRetrievalFailed {
        path: String,
        metadata: MetadataKind,
        #[source]
        source: Option<ClientError>,
    },

    #[error("unable to check existence for: {path}")]
    ExistenceCheckFailed {
        path: String,
        #[source]
        source: ClientError,
    },

    #[error("unable to list contents for location: {path}")]
    ListFailed {
        path: String,
        #[source]
        source: ClientError,
    },

    #[error("invalid visibility provided for {path}: {message}")]
    InvalidVisibility {
        path: String,
        message: String,
        #[source]
        source: Option<ClientError>,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, FilesystemError>;

/// The abstract call a backend fault happened under.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Operation<'a> {
    Write(&'a str),
    Read(&'a str),
    Delete(&'a str),
    Copy(&'a str, &'a str),
    Metadata(&'a str, MetadataKind),
    Existence(&'a str),
    List(&'a str),
    SetVisibility(&'a str),
}

/// Maps a backend fault onto the error kind of the operation it interrupted.
pub(crate) fn translate(operation: Operation<'_>, err: ClientError) -> FilesystemError {
    match operation {
        Operation::Write(path) => FilesystemError::WriteFailed {
            path: path.to_string(),
            source: err,
        },
        Operation::Read(path) => FilesystemError::ReadFailed {
            path: path.to_string(),
            source: err,
        },
        Operation::Delete(path) => FilesystemError::DeleteFailed {
            path: path.to_string(),
            source: err,
        },
        Operation::Copy(source, destination) => FilesystemError::CopyFailed {
            source_path: source.to_string(),
            destination: destination.to_string(),
            source: err,
        },
        Operation::Metadata(path, metadata) => FilesystemError::MetadataRetrievalFailed {
            path: path.to_string(),
            metadata,
            source: Some(err),
        },
        Operation::Existence(path) => FilesystemError::ExistenceCheckFailed {
            path: path.to_string(),
            source: err,
        },
        Operation::List(path) => FilesystemError::ListFailed {
            path: path.to_string(),
            source: err,
        },
        Operation::SetVisibility(path) => FilesystemError::InvalidVisibility {
            path: path.to_string(),
            message: format!("backend rejected acl change, {}", err),
            source: Some(err),
        },
    }
}
