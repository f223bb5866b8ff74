use std::io::Read;

use bytes::Bytes;

use crate::{error::ClientError, model};

pub mod mock;
pub mod oss;

/// Blocking object-storage primitives the filesystem adapter is built on.
pub trait ObjectClient: Send + Sync {
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: &model::oss::PutObjectOptions,
    ) -> Result<(), ClientError>;

    /// Uploads `body` without holding more than one part of it in memory.
    fn put_object_stream(
        &self,
        bucket: &str,
        key: &str,
        body: &mut dyn Read,
        options: &model::oss::PutObjectOptions,
    ) -> Result<(), ClientError>;

    fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, ClientError>;

    fn get_object_stream(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Box<dyn Read + Send>, ClientError>;

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ClientError>;

    fn delete_multiple_objects(&self, bucket: &str, keys: &[String]) -> Result<(), ClientError>;

    fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        bucket: &str,
        key: &str,
        options: &model::oss::PutObjectOptions,
    ) -> Result<(), ClientError>;

    fn head_object(&self, bucket: &str, key: &str) -> Result<model::oss::ObjectMeta, ClientError>;

    /// Lighter variant of `head_object`; only size, etag and modification time are reliable.
    fn get_object_meta(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<model::oss::ObjectMeta, ClientError>;

    fn get_object_acl(&self, bucket: &str, key: &str) -> Result<model::oss::Acl, ClientError>;

    fn put_object_acl(
        &self,
        bucket: &str,
        key: &str,
        acl: model::oss::Acl,
    ) -> Result<(), ClientError>;

    fn get_bucket_acl(&self, bucket: &str) -> Result<model::oss::Acl, ClientError>;

    fn list_objects_v2(
        &self,
        bucket: &str,
        request: &model::oss::ListObjectsV2Request,
    ) -> Result<model::oss::ListObjectsV2Output, ClientError>;

    /// `Ok(false)` for a missing key; errors mean the check itself failed.
    fn is_object_exist(&self, bucket: &str, key: &str) -> Result<bool, ClientError>;
}
