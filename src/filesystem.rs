use std::io::Read;

use bytes::Bytes;
use time::OffsetDateTime;

use crate::{
    error::{FilesystemError, MetadataKind, Result},
    fs::FilesystemAdapter,
    model::fs::{StorageAttributes, Visibility, WriteConfig},
    util::object::normalize_path,
};

/// Caller-facing filesystem over any `FilesystemAdapter`.
///
/// Normalizes paths before they reach the adapter, parses visibility
/// strings, and unwraps single attributes out of `FileAttributes`.
pub struct Filesystem<A: FilesystemAdapter> {
    adapter: A,
    defaults: WriteConfig,
}

impl<A: FilesystemAdapter> Filesystem<A> {
    pub fn new(adapter: A) -> Self {
        Self::with_defaults(adapter, WriteConfig::default())
    }

    /// `defaults` applies to writes, copies and moves that pass no config of their own.
    pub fn with_defaults(adapter: A, defaults: WriteConfig) -> Self {
        Self { adapter, defaults }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn file_exists(&self, path: &str) -> Result<bool> {
        self.adapter.file_exists(&normalize_path(path)?)
    }

    pub fn directory_exists(&self, path: &str) -> Result<bool> {
        self.adapter.directory_exists(&normalize_path(path)?)
    }

    /// True when `path` names either a file or a directory.
    pub fn has(&self, path: &str) -> Result<bool> {
        let path = normalize_path(path)?;
        Ok(self.adapter.file_exists(&path)? || self.adapter.directory_exists(&path)?)
    }

    pub fn write(&self, path: &str, contents: &[u8]) -> Result<()> {
        self.write_with(path, contents, &self.defaults)
    }

    pub fn write_with(&self, path: &str, contents: &[u8], config: &WriteConfig) -> Result<()> {
        self.adapter.write(&normalize_path(path)?, contents, config)
    }

    pub fn write_stream(&self, path: &str, contents: &mut dyn Read) -> Result<()> {
        self.write_stream_with(path, contents, &self.defaults)
    }

    pub fn write_stream_with(
        &self,
        path: &str,
        contents: &mut dyn Read,
        config: &WriteConfig,
    ) -> Result<()> {
        self.adapter
            .write_stream(&normalize_path(path)?, contents, config)
    }

    pub fn read(&self, path: &str) -> Result<Bytes> {
        self.adapter.read(&normalize_path(path)?)
    }

    pub fn read_stream(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        self.adapter.read_stream(&normalize_path(path)?)
    }

    pub fn delete(&self, path: &str) -> Result<()> {
        self.adapter.delete(&normalize_path(path)?)
    }

    pub fn delete_directory(&self, path: &str) -> Result<()> {
        self.adapter.delete_directory(&normalize_path(path)?)
    }

    pub fn create_directory(&self, path: &str) -> Result<()> {
        self.adapter
            .create_directory(&normalize_path(path)?, &self.defaults)
    }

    /// Accepts `public` or `private`; anything else fails without a backend call.
    pub fn set_visibility(&self, path: &str, visibility: &str) -> Result<()> {
        let path = normalize_path(path)?;
        let visibility = Visibility::parse_for(&path, visibility)?;
        self.adapter.set_visibility(&path, visibility)
    }

    pub fn visibility(&self, path: &str) -> Result<Visibility> {
        let path = normalize_path(path)?;
        self.adapter
            .visibility(&path)?
            .visibility
            .ok_or_else(|| missing(&path, MetadataKind::Visibility))
    }

    pub fn mime_type(&self, path: &str) -> Result<String> {
        let path = normalize_path(path)?;
        self.adapter
            .mime_type(&path)?
            .mime_type
            .ok_or_else(|| missing(&path, MetadataKind::MimeType))
    }

    pub fn last_modified(&self, path: &str) -> Result<OffsetDateTime> {
        let path = normalize_path(path)?;
        self.adapter
            .last_modified(&path)?
            .last_modified
            .ok_or_else(|| missing(&path, MetadataKind::LastModified))
    }

    pub fn file_size(&self, path: &str) -> Result<u64> {
        let path = normalize_path(path)?;
        self.adapter
            .file_size(&path)?
            .file_size
            .ok_or_else(|| missing(&path, MetadataKind::FileSize))
    }

    pub fn list_contents(&self, path: &str, deep: bool) -> Result<Vec<StorageAttributes>> {
        self.adapter.list_contents(&normalize_path(path)?, deep)
    }

    pub fn move_file(&self, source: &str, destination: &str) -> Result<()> {
        self.move_file_with(source, destination, &self.defaults)
    }

    pub fn move_file_with(
        &self,
        source: &str,
        destination: &str,
        config: &WriteConfig,
    ) -> Result<()> {
        self.adapter
            .move_file(&normalize_path(source)?, &normalize_path(destination)?, config)
    }

    pub fn copy(&self, source: &str, destination: &str) -> Result<()> {
        self.copy_with(source, destination, &self.defaults)
    }

    pub fn copy_with(&self, source: &str, destination: &str, config: &WriteConfig) -> Result<()> {
        self.adapter
            .copy(&normalize_path(source)?, &normalize_path(destination)?, config)
    }
}

fn missing(path: &str, metadata: MetadataKind) -> FilesystemError {
    FilesystemError::MetadataRetrievalFailed {
        path: path.to_string(),
        metadata,
        source: None,
    }
}
