use std::io::Read;

use bytes::Bytes;
use tracing::{error, info, span, warn, Level};

use crate::{
    adapters,
    config::AdapterOptions,
    error::{
        translate, ClientError, FilesystemError, MetadataKind, MoveFailure, Operation, Result,
    },
    model::{
        fs::{DirectoryAttributes, FileAttributes, StorageAttributes, Visibility, WriteConfig},
        oss::{Acl, ListObjectsV2Request, PutObjectOptions},
    },
    pager::ListPages,
    util::object::{directory_prefix, ensure_file_key, listing_prefix, SEPARATOR},
    visibility,
};

/// The uniform operation set a generic filesystem facade drives.
pub trait FilesystemAdapter {
    fn file_exists(&self, path: &str) -> Result<bool>;

    fn directory_exists(&self, path: &str) -> Result<bool>;

    fn write(&self, path: &str, contents: &[u8], config: &WriteConfig) -> Result<()>;

    fn write_stream(&self, path: &str, contents: &mut dyn Read, config: &WriteConfig)
        -> Result<()>;

    fn read(&self, path: &str) -> Result<Bytes>;

    /// The returned reader belongs to the caller; dropping it releases the connection.
    fn read_stream(&self, path: &str) -> Result<Box<dyn Read + Send>>;

    fn delete(&self, path: &str) -> Result<()>;

    fn delete_directory(&self, path: &str) -> Result<()>;

    fn create_directory(&self, path: &str, config: &WriteConfig) -> Result<()>;

    fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()>;

    fn visibility(&self, path: &str) -> Result<FileAttributes>;

    fn mime_type(&self, path: &str) -> Result<FileAttributes>;

    fn last_modified(&self, path: &str) -> Result<FileAttributes>;

    fn file_size(&self, path: &str) -> Result<FileAttributes>;

    fn list_contents(&self, path: &str, deep: bool) -> Result<Vec<StorageAttributes>>;

    fn move_file(&self, source: &str, destination: &str, config: &WriteConfig) -> Result<()>;

    fn copy(&self, source: &str, destination: &str, config: &WriteConfig) -> Result<()>;
}

/// Filesystem adapter over a single OSS bucket.
///
/// Holds nothing but the client, the bucket name and its options, so one
/// instance can serve any number of callers.
pub struct OssAdapter {
    client: Box<dyn adapters::ObjectClient>,
    bucket: String,
    options: AdapterOptions,
}

impl OssAdapter {
    pub fn new(client: Box<dyn adapters::ObjectClient>, bucket: &str) -> Self {
        Self::with_options(client, bucket, AdapterOptions::default())
    }

    pub fn with_options(
        client: Box<dyn adapters::ObjectClient>,
        bucket: &str,
        options: AdapterOptions,
    ) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            options,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    fn put_options(&self, config: &WriteConfig) -> PutObjectOptions {
        PutObjectOptions {
            acl: config
                .visibility
                .map(|v| visibility::acl_for_visibility(v, self.options.public_acl)),
            content_type: config.mime_type.clone(),
        }
    }

    fn list_pages(&self, request: ListObjectsV2Request) -> ListPages<'_> {
        ListPages::new(self.client.as_ref(), &self.bucket, request)
    }

    fn collect_listing(&self, path: &str, deep: bool) -> Result<Vec<StorageAttributes>> {
        let request = ListObjectsV2Request {
            prefix: listing_prefix(path),
            delimiter: if deep {
                None
            } else {
                Some(SEPARATOR.to_string())
            },
            max_keys: Some(self.options.page_size),
            continuation_token: None,
        };
        let prefix = request.prefix.clone().unwrap_or_default();

        let mut entries = Vec::new();
        for page in self.list_pages(request) {
            let page = page.map_err(|err| {
                error!(error_message=%err, error_group="list_objects");
                translate(Operation::List(path), err)
            })?;

            for group in page.common_prefixes {
                entries.push(StorageAttributes::Directory(DirectoryAttributes::new(&group)));
            }

            for object in page.contents {
                // the listed directory's own marker object
                if object.key == prefix {
                    continue;
                }

                if object.key.ends_with(SEPARATOR) {
                    entries.push(StorageAttributes::Directory(DirectoryAttributes {
                        last_modified: object.last_modified,
                        ..DirectoryAttributes::new(&object.key)
                    }));
                    continue;
                }

                entries.push(StorageAttributes::File(
                    FileAttributes::new(&object.key)
                        .with_file_size(object.size)
                        .with_last_modified(object.last_modified)
                        .with_extra("etag", object.etag)
                        .with_extra("storage_class", object.storage_class),
                ));
            }
        }

        entries.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(entries)
    }

    /// ACL the copy destination should carry, if any.
    fn copy_acl(
        &self,
        source: &str,
        config: &WriteConfig,
    ) -> std::result::Result<Option<Acl>, ClientError> {
        if let Some(v) = config.visibility {
            return Ok(Some(visibility::acl_for_visibility(
                v,
                self.options.public_acl,
            )));
        }

        if config.retain_visibility {
            return self.client.get_object_acl(&self.bucket, source).map(Some);
        }

        Ok(None)
    }
}

impl FilesystemAdapter for OssAdapter {
    fn file_exists(&self, path: &str) -> Result<bool> {
        let span = span!(Level::INFO, "file_exists", context = "file_exists");
        let _e = span.enter();
        info!(path = path, "called");

        // the root is never an object
        if path.is_empty() {
            return Ok(false);
        }

        self.client
            .is_object_exist(&self.bucket, path)
            .map_err(|err| {
                error!(error_message=%err, error_group="is_object_exist");
                translate(Operation::Existence(path), err)
            })
    }

    fn directory_exists(&self, path: &str) -> Result<bool> {
        let span = span!(Level::INFO, "directory_exists", context = "directory_exists");
        let _e = span.enter();
        info!(path = path, "called");

        // prefixes cannot be told apart from absent ones without listing
        Ok(!path.is_empty())
    }

    fn write(&self, path: &str, contents: &[u8], config: &WriteConfig) -> Result<()> {
        let span = span!(Level::INFO, "write", context = "write");
        let _e = span.enter();
        info!(path = path, size = contents.len(), "called");

        ensure_file_key(path)?;

        self.client
            .put_object(
                &self.bucket,
                path,
                Bytes::copy_from_slice(contents),
                &self.put_options(config),
            )
            .map_err(|err| {
                error!(error_message=%err, error_group="put_object");
                translate(Operation::Write(path), err)
            })
    }

    fn write_stream(
        &self,
        path: &str,
        contents: &mut dyn Read,
        config: &WriteConfig,
    ) -> Result<()> {
        let span = span!(Level::INFO, "write_stream", context = "write_stream");
        let _e = span.enter();
        info!(path = path, "called");

        ensure_file_key(path)?;

        self.client
            .put_object_stream(&self.bucket, path, contents, &self.put_options(config))
            .map_err(|err| {
                error!(error_message=%err, error_group="put_object_stream");
                translate(Operation::Write(path), err)
            })
    }

    fn read(&self, path: &str) -> Result<Bytes> {
        let span = span!(Level::INFO, "read", context = "read");
        let _e = span.enter();
        info!(path = path, "called");

        if path.is_empty() {
            return Err(FilesystemError::InvalidInput(
                "path must not be empty".to_string(),
            ));
        }

        self.client.get_object(&self.bucket, path).map_err(|err| {
            error!(error_message=%err, error_group="get_object");
            translate(Operation::Read(path), err)
        })
    }

    fn read_stream(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let span = span!(Level::INFO, "read_stream", context = "read_stream");
        let _e = span.enter();
        info!(path = path, "called");

        if path.is_empty() {
            return Err(FilesystemError::InvalidInput(
                "path must not be empty".to_string(),
            ));
        }

        self.client
            .get_object_stream(&self.bucket, path)
            .map_err(|err| {
                error!(error_message=%err, error_group="get_object");
                translate(Operation::Read(path), err)
            })
    }

    fn delete(&self, path: &str) -> Result<()> {
        let span = span!(Level::INFO, "delete", context = "delete");
        let _e = span.enter();
        info!(path = path, "called");

        self.client.delete_object(&self.bucket, path).map_err(|err| {
            error!(error_message=%err, error_group="delete_object");
            translate(Operation::Delete(path), err)
        })
    }

    fn delete_directory(&self, path: &str) -> Result<()> {
        let span = span!(Level::INFO, "delete_directory", context = "delete_directory");
        let _e = span.enter();
        info!(path = path, "called");

        let request = ListObjectsV2Request {
            prefix: Some(directory_prefix(path)),
            max_keys: Some(self.options.page_size),
            ..Default::default()
        };

        let mut deleted = 0;
        for page in self.list_pages(request) {
            let page = page.map_err(|err| {
                error!(error_message=%err, error_group="list_objects");
                translate(Operation::Delete(path), err)
            })?;

            let keys: Vec<String> = page.contents.into_iter().map(|o| o.key).collect();
            if keys.is_empty() {
                continue;
            }

            self.client
                .delete_multiple_objects(&self.bucket, &keys)
                .map_err(|err| {
                    error!(
                        error_message=%err,
                        error_group="delete_multiple_objects",
                        deleted = deleted
                    );
                    translate(Operation::Delete(path), err)
                })?;
            deleted += keys.len();
        }

        info!(path = path, deleted = deleted, "directory deleted");
        Ok(())
    }

    fn create_directory(&self, path: &str, _config: &WriteConfig) -> Result<()> {
        let span = span!(Level::INFO, "create_directory", context = "create_directory");
        let _e = span.enter();
        info!(path = path, "called");

        // objects under the prefix are all a directory needs
        Ok(())
    }

    fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()> {
        let span = span!(Level::INFO, "set_visibility", context = "set_visibility");
        let _e = span.enter();
        info!(path = path, visibility = %visibility, "called");

        let acl = visibility::acl_for_visibility(visibility, self.options.public_acl);

        self.client
            .put_object_acl(&self.bucket, path, acl)
            .map_err(|err| {
                error!(error_message=%err, error_group="put_object_acl");
                translate(Operation::SetVisibility(path), err)
            })
    }

    fn visibility(&self, path: &str) -> Result<FileAttributes> {
        let span = span!(Level::INFO, "visibility", context = "visibility");
        let _e = span.enter();
        info!(path = path, "called");

        let acl = visibility::resolve_acl(self.client.as_ref(), &self.bucket, path).map_err(
            |err| {
                error!(error_message=%err, error_group="get_acl");
                translate(Operation::Metadata(path, MetadataKind::Visibility), err)
            },
        )?;

        Ok(FileAttributes::new(path).with_visibility(visibility::visibility_for_acl(acl)))
    }

    fn mime_type(&self, path: &str) -> Result<FileAttributes> {
        let span = span!(Level::INFO, "mime_type", context = "mime_type");
        let _e = span.enter();
        info!(path = path, "called");

        let meta = self.client.head_object(&self.bucket, path).map_err(|err| {
            error!(error_message=%err, error_group="head_object");
            translate(Operation::Metadata(path, MetadataKind::MimeType), err)
        })?;

        Ok(FileAttributes::new(path).with_mime_type(meta.content_type))
    }

    fn last_modified(&self, path: &str) -> Result<FileAttributes> {
        let span = span!(Level::INFO, "last_modified", context = "last_modified");
        let _e = span.enter();
        info!(path = path, "called");

        let meta = self.client.head_object(&self.bucket, path).map_err(|err| {
            error!(error_message=%err, error_group="head_object");
            translate(Operation::Metadata(path, MetadataKind::LastModified), err)
        })?;

        Ok(FileAttributes::new(path).with_last_modified(meta.last_modified))
    }

    fn file_size(&self, path: &str) -> Result<FileAttributes> {
        let span = span!(Level::INFO, "file_size", context = "file_size");
        let _e = span.enter();
        info!(path = path, "called");

        let meta = self
            .client
            .get_object_meta(&self.bucket, path)
            .map_err(|err| {
                error!(error_message=%err, error_group="get_object_meta");
                translate(Operation::Metadata(path, MetadataKind::FileSize), err)
            })?;

        Ok(FileAttributes::new(path).with_file_size(meta.size))
    }

    fn list_contents(&self, path: &str, deep: bool) -> Result<Vec<StorageAttributes>> {
        let span = span!(Level::INFO, "list_contents", context = "list_contents");
        let _e = span.enter();
        info!(path = path, deep = deep, "called");

        match self.collect_listing(path, deep) {
            Err(err) if self.options.lenient_listing => {
                warn!(error_message=%err, "listing failed, reporting an empty listing");
                Ok(Vec::new())
            }
            result => result,
        }
    }

    fn move_file(&self, source: &str, destination: &str, config: &WriteConfig) -> Result<()> {
        let span = span!(Level::INFO, "move_file", context = "move_file");
        let _e = span.enter();
        info!(source = source, destination = destination, "called");

        if source == destination {
            return Ok(());
        }

        let failed = |reason: MoveFailure, err: FilesystemError| FilesystemError::MoveFailed {
            source_path: source.to_string(),
            destination: destination.to_string(),
            reason,
            source: Box::new(err),
        };

        self.copy(source, destination, config)
            .map_err(|err| failed(MoveFailure::Copy, err))?;

        self.delete(source).map_err(|err| {
            warn!(
                source = source,
                destination = destination,
                "destination written but source kept"
            );
            failed(MoveFailure::DeleteSource, err)
        })
    }

    fn copy(&self, source: &str, destination: &str, config: &WriteConfig) -> Result<()> {
        let span = span!(Level::INFO, "copy", context = "copy");
        let _e = span.enter();
        info!(source = source, destination = destination, "called");

        let options = PutObjectOptions {
            acl: self.copy_acl(source, config).map_err(|err| {
                error!(error_message=%err, error_group="get_object_acl");
                translate(Operation::Copy(source, destination), err)
            })?,
            content_type: config.mime_type.clone(),
        };

        self.client
            .copy_object(&self.bucket, source, &self.bucket, destination, &options)
            .map_err(|err| {
                error!(error_message=%err, error_group="copy_object");
                translate(Operation::Copy(source, destination), err)
            })
    }
}
