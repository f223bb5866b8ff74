use std::{
    io::{self, Read},
    sync::Arc,
};

use aws_config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion, Region};
use aws_sdk_s3::{
    config::{
        http::HttpResponse, Credentials, RequestChecksumCalculation, ResponseChecksumValidation,
    },
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation::head_object::HeadObjectOutput,
    primitives::{ByteStream, DateTime},
    types::{
        CompletedMultipartUpload, CompletedPart, Delete, Grant, MetadataDirective,
        ObjectCannedAcl, ObjectIdentifier, Permission,
    },
};
use bytes::{Buf, Bytes};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::{
    adapters,
    config::{ConfigError, OssConfig},
    error::{ClientError, ClientErrorKind},
    model,
    util::{self, poll::ClientRuntime},
};

const ALL_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

/// Bytes left as-is in `x-amz-copy-source`: RFC 3986 unreserved plus the separator.
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// `ObjectClient` backed by the OSS S3-compatible API.
///
/// Every call blocks on the client's own runtime, so the client can be used
/// from plain threads as well as from inside tokio.
pub struct OssClient {
    client: aws_sdk_s3::Client,
    runtime: Arc<ClientRuntime>,
    part_size: usize,
}

impl OssClient {
    pub fn new(config: &OssConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("ossfs-client")
            .enable_all()
            .build()?;

        let timeout_config = TimeoutConfig::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region_name()?))
            .endpoint_url(config.endpoint_url())
            .timeout_config(timeout_config)
            .retry_config(RetryConfig::standard().with_max_attempts(config.max_attempts));

        if let (Some(id), Some(secret)) = (&config.access_key_id, &config.access_key_secret) {
            let credentials = Credentials::new(id, secret, None, None, "Static");
            loader = loader.credentials_provider(credentials);
        }

        let runtime = ClientRuntime::new(runtime);
        let sdk_config = util::poll::poll_until_ready(&runtime, loader.load());

        // OSS only serves virtual-hosted requests and rejects the SDK's default checksums
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(false)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
            .build();

        Ok(Self::from_client(
            aws_sdk_s3::Client::from_conf(s3_config),
            runtime,
            config.part_size,
        ))
    }

    pub fn from_client(
        client: aws_sdk_s3::Client,
        runtime: ClientRuntime,
        part_size: usize,
    ) -> Self {
        Self {
            client,
            runtime: Arc::new(runtime),
            part_size,
        }
    }

    fn head(
        &self,
        action: &str,
        bucket: &str,
        key: &str,
    ) -> Result<HeadObjectOutput, ClientError> {
        let req = self.client.head_object().bucket(bucket).key(key);

        util::poll::poll_until_ready(&self.runtime, req.send())
            .map_err(|err| client_error(action, key, err))
    }

    fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        options: &model::oss::PutObjectOptions,
    ) -> Result<String, ClientError> {
        let req = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .set_acl(options.acl.map(canned_acl))
            .set_content_type(options.content_type.clone());

        let out = util::poll::poll_until_ready(&self.runtime, req.send())
            .map_err(|err| client_error("create_multipart_upload", key, err))?;

        let upload_id = out.upload_id().ok_or_else(|| {
            ClientError::service(
                "InvalidResponse",
                format!("no upload id returned for: {}", key),
            )
        })?;

        debug!(key = key, upload_id = upload_id, "multipart upload initialized");
        Ok(upload_id.to_string())
    }

    /// Uploads `first` (already read, `filled` bytes) and every following part of `body`.
    fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        body: &mut dyn Read,
        mut buf: Vec<u8>,
        mut filled: usize,
    ) -> Result<Vec<CompletedPart>, ClientError> {
        let mut parts = Vec::new();
        let mut part_number = 1;

        loop {
            let req = self
                .client
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(Bytes::copy_from_slice(&buf[..filled])));

            let out = util::poll::poll_until_ready(&self.runtime, req.send())
                .map_err(|err| client_error("upload_part", key, err))?;

            debug!(key = key, part_number = part_number, size = filled, "part uploaded");

            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(out.e_tag().map(str::to_string))
                    .build(),
            );

            if filled < buf.len() {
                break;
            }

            filled = util::io::read_part(body, &mut buf).map_err(ClientError::io)?;
            if filled == 0 {
                break;
            }
            part_number += 1;
        }

        Ok(parts)
    }

    fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<(), ClientError> {
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        let req = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed);

        util::poll::poll_until_ready(&self.runtime, req.send())
            .map_err(|err| client_error("complete_multipart_upload", key, err))?;

        Ok(())
    }

    fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) {
        let req = self
            .client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id);

        if let Err(err) = util::poll::poll_until_ready(&self.runtime, req.send()) {
            let err = client_error("abort_multipart_upload", key, err);
            warn!(error_message = %err, upload_id = upload_id, "failed to abort multipart upload");
        }
    }
}

impl adapters::ObjectClient for OssClient {
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: &model::oss::PutObjectOptions,
    ) -> Result<(), ClientError> {
        let req = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_acl(options.acl.map(canned_acl))
            .set_content_type(options.content_type.clone());

        util::poll::poll_until_ready(&self.runtime, req.send())
            .map_err(|err| client_error("put_object", key, err))?;

        Ok(())
    }

    fn put_object_stream(
        &self,
        bucket: &str,
        key: &str,
        body: &mut dyn Read,
        options: &model::oss::PutObjectOptions,
    ) -> Result<(), ClientError> {
        let mut buf = vec![0u8; self.part_size];
        let filled = util::io::read_part(body, &mut buf).map_err(ClientError::io)?;

        if filled < self.part_size {
            buf.truncate(filled);
            return self.put_object(bucket, key, Bytes::from(buf), options);
        }

        let upload_id = self.create_multipart_upload(bucket, key, options)?;

        let result = self
            .upload_parts(bucket, key, &upload_id, body, buf, filled)
            .and_then(|parts| self.complete_multipart_upload(bucket, key, &upload_id, parts));

        if result.is_err() {
            self.abort_multipart_upload(bucket, key, &upload_id);
        }

        result
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, ClientError> {
        let req = self.client.get_object().bucket(bucket).key(key);

        let o = util::poll::poll_until_ready(&self.runtime, req.send())
            .map_err(|err| client_error("get_object", key, err))?;

        let bytes = util::poll::poll_until_ready(&self.runtime, o.body.collect()).map_err(|err| {
            ClientError::new(
                ClientErrorKind::Transport,
                format!("failed to collect body: {}, {}", key, err),
            )
        })?;

        Ok(bytes.into_bytes())
    }

    fn get_object_stream(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Box<dyn Read + Send>, ClientError> {
        let req = self.client.get_object().bucket(bucket).key(key);

        let o = util::poll::poll_until_ready(&self.runtime, req.send())
            .map_err(|err| client_error("get_object", key, err))?;

        Ok(Box::new(ObjectReader {
            body: o.body,
            chunk: Bytes::new(),
            runtime: Arc::clone(&self.runtime),
        }))
    }

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ClientError> {
        let req = self.client.delete_object().bucket(bucket).key(key);

        util::poll::poll_until_ready(&self.runtime, req.send())
            .map_err(|err| client_error("delete_object", key, err))?;

        Ok(())
    }

    fn delete_multiple_objects(&self, bucket: &str, keys: &[String]) -> Result<(), ClientError> {
        if keys.is_empty() {
            return Ok(());
        }

        let invalid = |err: aws_sdk_s3::error::BuildError| {
            ClientError::new(
                ClientErrorKind::InvalidArgument,
                format!("failed to build delete request, {}", err),
            )
        };

        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid)?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(invalid)?;

        let req = self.client.delete_objects().bucket(bucket).delete(delete);

        let out = util::poll::poll_until_ready(&self.runtime, req.send())
            .map_err(|err| client_error("delete_objects", &keys[0], err))?;

        if let Some(failed) = out.errors().first() {
            return Err(ClientError::service(
                failed.code().unwrap_or("DeleteFailed"),
                format!(
                    "failed to delete_objects at: {}, {}",
                    failed.key().unwrap_or(""),
                    failed.message().unwrap_or("")
                ),
            ));
        }

        Ok(())
    }

    fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        bucket: &str,
        key: &str,
        options: &model::oss::PutObjectOptions,
    ) -> Result<(), ClientError> {
        let mut req = self
            .client
            .copy_object()
            .bucket(bucket)
            .key(key)
            .copy_source(copy_source(source_bucket, source_key))
            .set_acl(options.acl.map(canned_acl));

        if let Some(content_type) = &options.content_type {
            req = req
                .content_type(content_type)
                .metadata_directive(MetadataDirective::Replace);
        }

        util::poll::poll_until_ready(&self.runtime, req.send())
            .map_err(|err| client_error("copy_object", source_key, err))?;

        Ok(())
    }

    fn head_object(&self, bucket: &str, key: &str) -> Result<model::oss::ObjectMeta, ClientError> {
        let ho = self.head("head_object", bucket, key)?;
        Ok(object_meta(key, &ho))
    }

    fn get_object_meta(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<model::oss::ObjectMeta, ClientError> {
        // the S3 dialect has no objectMeta call, HEAD carries the same headers
        let ho = self.head("get_object_meta", bucket, key)?;
        Ok(object_meta(key, &ho))
    }

    fn get_object_acl(&self, bucket: &str, key: &str) -> Result<model::oss::Acl, ClientError> {
        let req = self.client.get_object_acl().bucket(bucket).key(key);

        let out = util::poll::poll_until_ready(&self.runtime, req.send())
            .map_err(|err| client_error("get_object_acl", key, err))?;

        Ok(acl_from_grants(out.grants(), true))
    }

    fn put_object_acl(
        &self,
        bucket: &str,
        key: &str,
        acl: model::oss::Acl,
    ) -> Result<(), ClientError> {
        let req = self
            .client
            .put_object_acl()
            .bucket(bucket)
            .key(key)
            .acl(canned_acl(acl));

        util::poll::poll_until_ready(&self.runtime, req.send())
            .map_err(|err| client_error("put_object_acl", key, err))?;

        Ok(())
    }

    fn get_bucket_acl(&self, bucket: &str) -> Result<model::oss::Acl, ClientError> {
        let req = self.client.get_bucket_acl().bucket(bucket);

        let out = util::poll::poll_until_ready(&self.runtime, req.send())
            .map_err(|err| client_error("get_bucket_acl", bucket, err))?;

        Ok(acl_from_grants(out.grants(), false))
    }

    fn list_objects_v2(
        &self,
        bucket: &str,
        request: &model::oss::ListObjectsV2Request,
    ) -> Result<model::oss::ListObjectsV2Output, ClientError> {
        let req = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_prefix(request.prefix.clone())
            .set_delimiter(request.delimiter.clone())
            .set_max_keys(request.max_keys)
            .set_continuation_token(request.continuation_token.clone());

        let lo = util::poll::poll_until_ready(&self.runtime, req.send()).map_err(|err| {
            client_error(
                "list_objects",
                request.prefix.as_deref().unwrap_or(""),
                err,
            )
        })?;

        let contents = lo
            .contents()
            .iter()
            .map(|o| model::oss::ObjectSummary {
                key: o.key().unwrap_or("").to_string(),
                size: o.size().unwrap_or(0).max(0) as u64,
                last_modified: o.last_modified().and_then(to_offset_date_time),
                etag: o.e_tag().map(str::to_string),
                storage_class: o.storage_class().map(|c| c.as_str().to_string()),
            })
            .collect();

        let common_prefixes = lo
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix())
            .map(str::to_string)
            .collect();

        Ok(model::oss::ListObjectsV2Output {
            contents,
            common_prefixes,
            next_continuation_token: lo.next_continuation_token().map(str::to_string),
            is_truncated: lo.is_truncated().unwrap_or(false),
        })
    }

    fn is_object_exist(&self, bucket: &str, key: &str) -> Result<bool, ClientError> {
        match self.head("head_object", bucket, key) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// Caller-owned reader over a `GetObject` body. Chunks are pulled from the
/// connection only as the caller reads.
struct ObjectReader {
    body: ByteStream,
    chunk: Bytes,
    runtime: Arc<ClientRuntime>,
}

impl Read for ObjectReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.chunk.is_empty() {
            match util::poll::poll_until_ready(&self.runtime, self.body.next()) {
                None => return Ok(0),
                Some(Ok(chunk)) => self.chunk = chunk,
                Some(Err(err)) => return Err(io::Error::other(err)),
            }
        }

        let n = buf.len().min(self.chunk.len());
        buf[..n].copy_from_slice(&self.chunk[..n]);
        self.chunk.advance(n);

        Ok(n)
    }
}

fn client_error<E>(action: &str, key: &str, err: SdkError<E, HttpResponse>) -> ClientError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let code = err.code().map(str::to_string);

    let kind = match (&err, code.as_deref(), status) {
        (SdkError::TimeoutError(_) | SdkError::DispatchFailure(_), _, _) => {
            ClientErrorKind::Transport
        }
        (_, Some("NoSuchKey" | "NoSuchBucket" | "NotFound"), _) | (_, _, Some(404)) => {
            ClientErrorKind::NotFound
        }
        (_, Some("AccessDenied"), _) | (_, _, Some(403)) => ClientErrorKind::AccessDenied,
        (SdkError::ConstructionFailure(_), _, _) | (_, Some("InvalidArgument"), _) => {
            ClientErrorKind::InvalidArgument
        }
        _ => ClientErrorKind::Service,
    };

    ClientError {
        kind,
        code,
        message: format!("failed to {} at: {}, {}", action, key, DisplayErrorContext(&err)),
    }
}

/// Value of `x-amz-copy-source`; the service URL-decodes it.
fn copy_source(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, utf8_percent_encode(key, COPY_SOURCE))
}

fn canned_acl(acl: model::oss::Acl) -> ObjectCannedAcl {
    // `default` is not an S3 canned ACL; OSS accepts it verbatim
    ObjectCannedAcl::from(acl.as_str())
}

/// Reads a grant list as an OSS ACL. An object answering with no grants at
/// all is taken to inherit the bucket ACL.
fn acl_from_grants(grants: &[Grant], inherits: bool) -> model::oss::Acl {
    if grants.is_empty() && inherits {
        return model::oss::Acl::Default;
    }

    let public: Vec<&Permission> = grants
        .iter()
        .filter(|g| g.grantee().and_then(|g| g.uri()) == Some(ALL_USERS_URI))
        .filter_map(|g| g.permission())
        .collect();

    if public
        .iter()
        .any(|p| matches!(p, Permission::Write | Permission::FullControl))
    {
        model::oss::Acl::PublicReadWrite
    } else if public.iter().any(|p| matches!(p, Permission::Read)) {
        model::oss::Acl::PublicRead
    } else {
        model::oss::Acl::Private
    }
}

fn object_meta(key: &str, ho: &HeadObjectOutput) -> model::oss::ObjectMeta {
    model::oss::ObjectMeta {
        key: key.to_string(),
        size: ho.content_length().unwrap_or(0).max(0) as u64,
        content_type: ho.content_type().map(str::to_string),
        last_modified: ho.last_modified().and_then(to_offset_date_time),
        etag: ho.e_tag().map(str::to_string),
    }
}

fn to_offset_date_time(dt: &DateTime) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(dt.secs())
        .ok()
        .map(|t| t + time::Duration::nanoseconds(i64::from(dt.subsec_nanos())))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use aws_sdk_s3::types::{Grantee, Type};
    use aws_smithy_http_client::test_util::infallible_client_fn;
    use aws_smithy_types::body::SdkBody;

    use super::*;
    use crate::{adapters::ObjectClient, fs::OssAdapter};

    const INITIATE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<InitiateMultipartUploadResult>
  <Bucket>bkt</Bucket>
  <Key>big.bin</Key>
  <UploadId>upload-1</UploadId>
</InitiateMultipartUploadResult>"#;

    const COMPLETE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<CompleteMultipartUploadResult>
  <Bucket>bkt</Bucket>
  <Key>big.bin</Key>
  <ETag>"etag"</ETag>
</CompleteMultipartUploadResult>"#;

    const COPY_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<CopyObjectResult>
  <ETag>"etag"</ETag>
  <LastModified>2024-01-02T03:04:05.000Z</LastModified>
</CopyObjectResult>"#;

    const ERROR_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>InternalError</Code><Message>boom</Message><RequestId>1</RequestId></Error>"#;

    const EMPTY_LIST_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult>
  <Name>bkt</Name>
  <KeyCount>0</KeyCount>
  <IsTruncated>false</IsTruncated>
</ListBucketResult>"#;

    const LIST_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>bkt</Name>
  <Prefix>dir/</Prefix>
  <Delimiter>/</Delimiter>
  <MaxKeys>2</MaxKeys>
  <KeyCount>2</KeyCount>
  <IsTruncated>true</IsTruncated>
  <ContinuationToken>token-1</ContinuationToken>
  <NextContinuationToken>token-2</NextContinuationToken>
  <Contents>
    <Key>dir/a.txt</Key>
    <LastModified>2024-01-02T03:04:05.000Z</LastModified>
    <ETag>"abc"</ETag>
    <Size>3</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
  <CommonPrefixes><Prefix>dir/sub/</Prefix></CommonPrefixes>
</ListBucketResult>"#;

    /// One request as the fake endpoint saw it.
    #[derive(Clone, Debug)]
    struct Sent {
        operation: &'static str,
        query: String,
        copy_source: Option<String>,
        size: usize,
    }

    /// Scripted stand-in for the OSS HTTP endpoint.
    #[derive(Clone, Default)]
    struct FakeOss {
        sent: Arc<Mutex<Vec<Sent>>>,
        failing_part: Option<u32>,
        head_status: Option<u16>,
        list_body: Option<&'static str>,
    }

    impl FakeOss {
        fn operations(&self) -> Vec<&'static str> {
            self.sent().iter().map(|s| s.operation).collect()
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        fn respond(&self, req: http::Request<SdkBody>) -> http::Response<SdkBody> {
            let operation = operation(&req);
            let query = req.uri().query().unwrap_or("").to_string();
            let size = req.body().bytes().map(<[u8]>::len).or_else(|| {
                req.headers()
                    .get("content-length")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
            });

            self.sent.lock().unwrap().push(Sent {
                operation,
                copy_source: req
                    .headers()
                    .get("x-amz-copy-source")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
                size: size.unwrap_or(0),
                query: query.clone(),
            });

            let part = query_value(&query, "partNumber").and_then(|v| v.parse::<u32>().ok());

            match operation {
                "upload_part" if part.is_some() && part == self.failing_part => {
                    reply(500, ERROR_XML)
                }
                "create_multipart_upload" => reply(200, INITIATE_XML),
                "complete_multipart_upload" => reply(200, COMPLETE_XML),
                "abort_multipart_upload" => reply(204, ""),
                "copy_object" => reply(200, COPY_XML),
                "list_objects_v2" => reply(200, self.list_body.unwrap_or(EMPTY_LIST_XML)),
                "get_object" => reply(200, "streamed-body"),
                "head_object" => http::Response::builder()
                    .status(self.head_status.unwrap_or(200))
                    .header("Content-Length", "3")
                    .header("Content-Type", "text/plain")
                    .header("ETag", "\"etag\"")
                    .header("Last-Modified", "Tue, 02 Jan 2024 03:04:05 GMT")
                    .body(SdkBody::empty())
                    .unwrap(),
                _ => reply(200, ""),
            }
        }
    }

    fn query_value<'a>(query: &'a str, name: &str) -> Option<&'a str> {
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
    }

    fn operation(req: &http::Request<SdkBody>) -> &'static str {
        let query = req.uri().query().unwrap_or("");
        let has = |name: &str| {
            query.split('&').any(|pair| pair == name) || query_value(query, name).is_some()
        };

        match req.method().as_str() {
            "POST" if has("uploads") => "create_multipart_upload",
            "POST" if has("uploadId") => "complete_multipart_upload",
            "PUT" if has("partNumber") => "upload_part",
            "DELETE" if has("uploadId") => "abort_multipart_upload",
            "PUT" if req.headers().contains_key("x-amz-copy-source") => "copy_object",
            "PUT" => "put_object",
            "GET" if has("list-type") => "list_objects_v2",
            "GET" => "get_object",
            "HEAD" => "head_object",
            "DELETE" => "delete_object",
            _ => "unknown",
        }
    }

    fn reply(status: u16, body: &str) -> http::Response<SdkBody> {
        http::Response::builder()
            .status(status)
            .header("Content-Type", "application/xml")
            .header("ETag", "\"etag\"")
            .body(SdkBody::from(body.to_string()))
            .unwrap()
    }

    fn oss_client(fake: &FakeOss, part_size: usize) -> OssClient {
        let handler = fake.clone();
        let http_client = infallible_client_fn(move |req| handler.respond(req));

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("cn-hangzhou"))
            .endpoint_url("https://oss-cn-hangzhou.aliyuncs.com")
            .credentials_provider(Credentials::new("id", "secret", None, None, "test"))
            .retry_config(RetryConfig::disabled())
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
            .http_client(http_client)
            .build();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();

        OssClient::from_client(
            aws_sdk_s3::Client::from_conf(config),
            ClientRuntime::new(runtime),
            part_size,
        )
    }

    fn grant(uri: Option<&str>, permission: Permission) -> Grant {
        let grantee = match uri {
            Some(uri) => Grantee::builder().r#type(Type::Group).uri(uri).build(),
            None => Grantee::builder()
                .r#type(Type::CanonicalUser)
                .id("owner")
                .build(),
        };

        Grant::builder()
            .grantee(grantee.unwrap())
            .permission(permission)
            .build()
    }

    #[test]
    fn test_acl_from_grants() {
        let owner = grant(None, Permission::FullControl);

        let cases = vec![
            (vec![], true, model::oss::Acl::Default),
            (vec![], false, model::oss::Acl::Private),
            (vec![owner.clone()], true, model::oss::Acl::Private),
            (
                vec![owner.clone(), grant(Some(ALL_USERS_URI), Permission::Read)],
                true,
                model::oss::Acl::PublicRead,
            ),
            (
                vec![
                    owner.clone(),
                    grant(Some(ALL_USERS_URI), Permission::Read),
                    grant(Some(ALL_USERS_URI), Permission::Write),
                ],
                false,
                model::oss::Acl::PublicReadWrite,
            ),
            (
                vec![grant(
                    Some("http://acs.amazonaws.com/groups/global/AuthenticatedUsers"),
                    Permission::Read,
                )],
                true,
                model::oss::Acl::Private,
            ),
        ];

        for (grants, inherits, expected) in cases {
            assert_eq!(
                acl_from_grants(&grants, inherits),
                expected,
                "failed for case: {:?}",
                grants
            );
        }
    }

    #[test]
    fn test_canned_acl() {
        assert_eq!(canned_acl(model::oss::Acl::Private), ObjectCannedAcl::Private);
        assert_eq!(canned_acl(model::oss::Acl::PublicRead), ObjectCannedAcl::PublicRead);
        assert_eq!(canned_acl(model::oss::Acl::Default).as_str(), "default");
    }

    #[test]
    fn test_to_offset_date_time() {
        let dt = DateTime::from_secs_and_nanos(1_700_000_000, 500);
        let converted = to_offset_date_time(&dt).unwrap();

        assert_eq!(converted.unix_timestamp(), 1_700_000_000);
        assert_eq!(converted.nanosecond(), 500);
    }

    #[test]
    fn test_copy_source_encoding() {
        let cases = vec![
            ("a.txt", "bkt/a.txt"),
            ("dir/sub/a-b_c.~d", "bkt/dir/sub/a-b_c.~d"),
            ("a%2Fb c+d.txt", "bkt/a%252Fb%20c%2Bd.txt"),
            ("报告/a.txt", "bkt/%E6%8A%A5%E5%91%8A/a.txt"),
        ];

        for (key, expected) in cases {
            assert_eq!(copy_source("bkt", key), expected, "failed for case: {}", key);
        }
    }

    #[test]
    fn test_copy_object_sends_encoded_source() {
        let fake = FakeOss::default();
        let client = oss_client(&fake, 4);

        client
            .copy_object(
                "bkt",
                "报告/a%2Fb c+d.txt",
                "bkt",
                "copy.txt",
                &model::oss::PutObjectOptions::default(),
            )
            .unwrap();

        let sent = fake.sent();
        assert_eq!(fake.operations(), vec!["copy_object"]);
        assert_eq!(
            sent[0].copy_source.as_deref(),
            Some("bkt/%E6%8A%A5%E5%91%8A/a%252Fb%20c%2Bd.txt")
        );
    }

    #[test]
    fn test_put_object_stream_splits_into_parts() {
        let cases = vec![
            ("abc", vec!["put_object"], vec![3]),
            (
                "abcd",
                vec!["create_multipart_upload", "upload_part", "complete_multipart_upload"],
                vec![4],
            ),
            (
                "abcdefghij",
                vec![
                    "create_multipart_upload",
                    "upload_part",
                    "upload_part",
                    "upload_part",
                    "complete_multipart_upload",
                ],
                vec![4, 4, 2],
            ),
        ];

        for (body, expected_operations, expected_sizes) in cases {
            let fake = FakeOss::default();
            let client = oss_client(&fake, 4);

            client
                .put_object_stream(
                    "bkt",
                    "big.bin",
                    &mut io::Cursor::new(body.as_bytes()),
                    &model::oss::PutObjectOptions::default(),
                )
                .unwrap();

            assert_eq!(fake.operations(), expected_operations, "failed for case: {}", body);

            let sizes: Vec<usize> = fake
                .sent()
                .iter()
                .filter(|s| s.operation == "put_object" || s.operation == "upload_part")
                .map(|s| s.size)
                .collect();
            assert_eq!(sizes, expected_sizes, "failed for case: {}", body);
        }
    }

    #[test]
    fn test_put_object_stream_aborts_on_failed_part() {
        let fake = FakeOss {
            failing_part: Some(2),
            ..Default::default()
        };
        let client = oss_client(&fake, 4);

        let err = client
            .put_object_stream(
                "bkt",
                "big.bin",
                &mut io::Cursor::new(b"abcdefghij".to_vec()),
                &model::oss::PutObjectOptions::default(),
            )
            .unwrap_err();

        assert_eq!(err.kind, ClientErrorKind::Service);
        assert_eq!(
            fake.operations(),
            vec![
                "create_multipart_upload",
                "upload_part",
                "upload_part",
                "abort_multipart_upload"
            ]
        );
        let abort = &fake.sent()[3];
        assert_eq!(query_value(&abort.query, "uploadId"), Some("upload-1"));
    }

    #[test]
    fn test_list_objects_v2_maps_page() {
        let fake = FakeOss {
            list_body: Some(LIST_XML),
            ..Default::default()
        };
        let client = oss_client(&fake, 4);

        let request = model::oss::ListObjectsV2Request {
            prefix: Some("dir/".to_string()),
            delimiter: Some("/".to_string()),
            max_keys: Some(2),
            continuation_token: Some("token-1".to_string()),
        };
        let page = client.list_objects_v2("bkt", &request).unwrap();

        assert!(page.is_truncated);
        assert_eq!(page.next_continuation_token.as_deref(), Some("token-2"));
        assert_eq!(page.common_prefixes, vec!["dir/sub/"]);

        assert_eq!(page.contents.len(), 1);
        let object = &page.contents[0];
        assert_eq!(object.key, "dir/a.txt");
        assert_eq!(object.size, 3);
        assert_eq!(object.etag.as_deref(), Some("\"abc\""));
        assert_eq!(object.storage_class.as_deref(), Some("STANDARD"));
        assert!(object.last_modified.is_some());

        let query = &fake.sent()[0].query;
        assert_eq!(query_value(query, "max-keys"), Some("2"));
        assert_eq!(query_value(query, "continuation-token"), Some("token-1"));
    }

    #[test]
    fn test_head_errors_are_classified() {
        let cases = vec![
            (404, ClientErrorKind::NotFound),
            (403, ClientErrorKind::AccessDenied),
            (500, ClientErrorKind::Service),
        ];

        for (status, expected) in cases {
            let fake = FakeOss {
                head_status: Some(status),
                ..Default::default()
            };
            let client = oss_client(&fake, 4);

            let err = client.head_object("bkt", "a.txt").unwrap_err();
            assert_eq!(err.kind, expected, "failed for case: {}", status);
            assert!(err.message.contains("a.txt"), "failed for case: {}", status);
        }
    }

    #[test]
    fn test_is_object_exist() {
        let cases = vec![(200, Some(true)), (404, Some(false)), (403, None)];

        for (status, expected) in cases {
            let fake = FakeOss {
                head_status: Some(status),
                ..Default::default()
            };
            let client = oss_client(&fake, 4);

            let result = client.is_object_exist("bkt", "a.txt").ok();
            assert_eq!(result, expected, "failed for case: {}", status);
        }
    }

    #[test]
    fn test_head_object_maps_headers() {
        let fake = FakeOss::default();
        let client = oss_client(&fake, 4);

        let meta = client.head_object("bkt", "a.txt").unwrap();

        assert_eq!(meta.size, 3);
        assert_eq!(meta.content_type.as_deref(), Some("text/plain"));
        assert_eq!(meta.etag.as_deref(), Some("\"etag\""));
        assert_eq!(
            meta.last_modified.map(|t| t.unix_timestamp()),
            Some(1_704_164_645)
        );
    }

    #[test]
    fn test_get_object_stream_reads_body() {
        let fake = FakeOss::default();
        let client = oss_client(&fake, 4);

        let mut contents = String::new();
        client
            .get_object_stream("bkt", "a.txt")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();

        assert_eq!(contents, "streamed-body");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_use_and_drop_inside_multi_thread_runtime() {
        let fake = FakeOss::default();
        let adapter = OssAdapter::new(Box::new(oss_client(&fake, 4)), "bkt");

        assert!(crate::fs::FilesystemAdapter::file_exists(&adapter, "a.txt").unwrap());

        drop(adapter);
    }

    #[tokio::test]
    async fn test_use_and_drop_inside_current_thread_runtime() {
        let fake = FakeOss::default();
        let client = oss_client(&fake, 4);

        assert!(client.is_object_exist("bkt", "a.txt").unwrap());

        drop(client);
    }
}
