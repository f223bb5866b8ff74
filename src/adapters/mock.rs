use std::{
    collections::{BTreeMap, HashMap},
    io::{Cursor, Read},
    sync::{Arc, Mutex, MutexGuard},
};

use bytes::Bytes;
use time::OffsetDateTime;

use crate::{
    adapters,
    error::{ClientError, ClientErrorKind},
    model,
};

const DEFAULT_MAX_KEYS: i32 = 1000;

#[derive(Clone, Debug)]
struct MockObject {
    data: Bytes,
    acl: model::oss::Acl,
    content_type: Option<String>,
    last_modified: OffsetDateTime,
}

#[derive(Debug)]
struct Failure {
    skip: usize,
    error: ClientError,
}

#[derive(Debug)]
struct MockState {
    objects: BTreeMap<String, MockObject>,
    bucket_acl: model::oss::Acl,
    failures: HashMap<String, Failure>,
    calls: Vec<String>,
}

/// In-memory bucket. Clones share the same state so a test can keep a
/// handle after boxing one into an adapter.
#[derive(Clone, Debug)]
pub struct MockClient {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                objects: BTreeMap::new(),
                bucket_acl: model::oss::Acl::Private,
                failures: HashMap::new(),
                calls: Vec::new(),
            })),
        }
    }

    pub fn with_bucket_acl(self, acl: model::oss::Acl) -> Self {
        self.lock().bucket_acl = acl;
        self
    }

    /// Stores an object directly, bypassing the call log.
    pub fn insert(&self, key: &str, data: &[u8]) {
        self.lock().objects.insert(
            key.to_string(),
            MockObject {
                data: Bytes::copy_from_slice(data),
                acl: model::oss::Acl::Default,
                content_type: None,
                last_modified: OffsetDateTime::now_utc(),
            },
        );
    }

    /// Makes every call of `operation` fail with `error`.
    pub fn fail(&self, operation: &str, error: ClientError) {
        self.fail_after(operation, 0, error);
    }

    /// Lets `successes` calls of `operation` through, then fails the rest.
    pub fn fail_after(&self, operation: &str, successes: usize, error: ClientError) {
        self.lock().failures.insert(
            operation.to_string(),
            Failure {
                skip: successes,
                error,
            },
        );
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    pub fn acl_of(&self, key: &str) -> Option<model::oss::Acl> {
        self.lock().objects.get(key).map(|o| o.acl)
    }

    pub fn content_type_of(&self, key: &str) -> Option<String> {
        self.lock()
            .objects
            .get(key)
            .and_then(|o| o.content_type.clone())
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self, operation: &str) -> Result<MutexGuard<'_, MockState>, ClientError> {
        let mut state = self.lock();
        state.calls.push(operation.to_string());

        if let Some(failure) = state.failures.get_mut(operation) {
            if failure.skip > 0 {
                failure.skip -= 1;
            } else {
                return Err(failure.error.clone());
            }
        }

        Ok(state)
    }

    /// Same as `begin`, but rejects the empty key the way the SDK refuses to build such a request.
    fn begin_with_key(
        &self,
        operation: &str,
        key: &str,
    ) -> Result<MutexGuard<'_, MockState>, ClientError> {
        let state = self.begin(operation)?;
        Self::check_key(operation, key)?;
        Ok(state)
    }

    fn check_key(operation: &str, key: &str) -> Result<(), ClientError> {
        if key.is_empty() {
            return Err(ClientError::new(
                ClientErrorKind::InvalidArgument,
                format!("failed to construct {} request: key must not be empty", operation),
            ));
        }
        Ok(())
    }

    fn store(
        state: &mut MockState,
        key: &str,
        data: Bytes,
        options: &model::oss::PutObjectOptions,
    ) {
        state.objects.insert(
            key.to_string(),
            MockObject {
                data,
                acl: options.acl.unwrap_or(model::oss::Acl::Default),
                content_type: Some(
                    options
                        .content_type
                        .clone()
                        .unwrap_or_else(|| "application/octet-stream".to_string()),
                ),
                last_modified: OffsetDateTime::now_utc(),
            },
        );
    }

    fn missing(key: &str) -> ClientError {
        ClientError::not_found(format!("the specified key does not exist: {}", key))
    }
}

impl adapters::ObjectClient for MockClient {
    fn put_object(
        &self,
        _bucket: &str,
        key: &str,
        body: Bytes,
        options: &model::oss::PutObjectOptions,
    ) -> Result<(), ClientError> {
        let mut state = self.begin_with_key("put_object", key)?;
        Self::store(&mut state, key, body, options);
        Ok(())
    }

    fn put_object_stream(
        &self,
        _bucket: &str,
        key: &str,
        body: &mut dyn Read,
        options: &model::oss::PutObjectOptions,
    ) -> Result<(), ClientError> {
        let mut state = self.begin_with_key("put_object_stream", key)?;

        let mut data = Vec::new();
        body.read_to_end(&mut data).map_err(ClientError::io)?;

        Self::store(&mut state, key, Bytes::from(data), options);
        Ok(())
    }

    fn get_object(&self, _bucket: &str, key: &str) -> Result<Bytes, ClientError> {
        let state = self.begin_with_key("get_object", key)?;
        state
            .objects
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| Self::missing(key))
    }

    fn get_object_stream(
        &self,
        _bucket: &str,
        key: &str,
    ) -> Result<Box<dyn Read + Send>, ClientError> {
        let state = self.begin_with_key("get_object_stream", key)?;
        let data = state
            .objects
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| Self::missing(key))?;

        Ok(Box::new(Cursor::new(data)))
    }

    fn delete_object(&self, _bucket: &str, key: &str) -> Result<(), ClientError> {
        let mut state = self.begin_with_key("delete_object", key)?;
        state.objects.remove(key);
        Ok(())
    }

    fn delete_multiple_objects(&self, _bucket: &str, keys: &[String]) -> Result<(), ClientError> {
        let mut state = self.begin("delete_multiple_objects")?;
        for key in keys {
            Self::check_key("delete_multiple_objects", key)?;
        }
        for key in keys {
            state.objects.remove(key);
        }
        Ok(())
    }

    fn copy_object(
        &self,
        _source_bucket: &str,
        source_key: &str,
        _bucket: &str,
        key: &str,
        options: &model::oss::PutObjectOptions,
    ) -> Result<(), ClientError> {
        let mut state = self.begin_with_key("copy_object", key)?;
        Self::check_key("copy_object", source_key)?;
        let source = state
            .objects
            .get(source_key)
            .cloned()
            .ok_or_else(|| Self::missing(source_key))?;

        state.objects.insert(
            key.to_string(),
            MockObject {
                acl: options.acl.unwrap_or(model::oss::Acl::Default),
                content_type: options.content_type.clone().or(source.content_type),
                last_modified: OffsetDateTime::now_utc(),
                data: source.data,
            },
        );
        Ok(())
    }

    fn head_object(&self, _bucket: &str, key: &str) -> Result<model::oss::ObjectMeta, ClientError> {
        let state = self.begin_with_key("head_object", key)?;
        let object = state.objects.get(key).ok_or_else(|| Self::missing(key))?;

        Ok(model::oss::ObjectMeta {
            key: key.to_string(),
            size: object.data.len() as u64,
            content_type: object.content_type.clone(),
            last_modified: Some(object.last_modified),
            etag: Some(format!("\"{:x}\"", object.data.len())),
        })
    }

    fn get_object_meta(
        &self,
        _bucket: &str,
        key: &str,
    ) -> Result<model::oss::ObjectMeta, ClientError> {
        let state = self.begin_with_key("get_object_meta", key)?;
        let object = state.objects.get(key).ok_or_else(|| Self::missing(key))?;

        Ok(model::oss::ObjectMeta {
            key: key.to_string(),
            size: object.data.len() as u64,
            content_type: None,
            last_modified: Some(object.last_modified),
            etag: Some(format!("\"{:x}\"", object.data.len())),
        })
    }

    fn get_object_acl(&self, _bucket: &str, key: &str) -> Result<model::oss::Acl, ClientError> {
        let state = self.begin_with_key("get_object_acl", key)?;
        state
            .objects
            .get(key)
            .map(|o| o.acl)
            .ok_or_else(|| Self::missing(key))
    }

    fn put_object_acl(
        &self,
        _bucket: &str,
        key: &str,
        acl: model::oss::Acl,
    ) -> Result<(), ClientError> {
        let mut state = self.begin_with_key("put_object_acl", key)?;
        match state.objects.get_mut(key) {
            None => Err(Self::missing(key)),
            Some(object) => {
                object.acl = acl;
                Ok(())
            }
        }
    }

    fn get_bucket_acl(&self, _bucket: &str) -> Result<model::oss::Acl, ClientError> {
        let state = self.begin("get_bucket_acl")?;
        Ok(state.bucket_acl)
    }

    fn list_objects_v2(
        &self,
        _bucket: &str,
        request: &model::oss::ListObjectsV2Request,
    ) -> Result<model::oss::ListObjectsV2Output, ClientError> {
        let state = self.begin("list_objects_v2")?;

        let prefix = request.prefix.as_deref().unwrap_or("");
        let max_keys = request.max_keys.unwrap_or(DEFAULT_MAX_KEYS).max(1) as usize;
        let after = request.continuation_token.as_deref();

        let mut output = model::oss::ListObjectsV2Output::default();
        let mut last_key: Option<&String> = None;

        let candidates = state
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| after.map_or(true, |token| key.as_str() > token));

        for (key, object) in candidates {
            let group = request.delimiter.as_deref().and_then(|delimiter| {
                key[prefix.len()..]
                    .find(delimiter)
                    .map(|pos| key[..prefix.len() + pos + delimiter.len()].to_string())
            });

            if let Some(group) = &group {
                if output.common_prefixes.last() == Some(group) {
                    last_key = Some(key);
                    continue;
                }
            }

            if output.contents.len() + output.common_prefixes.len() == max_keys {
                output.is_truncated = true;
                break;
            }

            match group {
                Some(group) => output.common_prefixes.push(group),
                None => output.contents.push(model::oss::ObjectSummary {
                    key: key.clone(),
                    size: object.data.len() as u64,
                    last_modified: Some(object.last_modified),
                    etag: Some(format!("\"{:x}\"", object.data.len())),
                    storage_class: Some("Standard".to_string()),
                }),
            }
            last_key = Some(key);
        }

        if output.is_truncated {
            output.next_continuation_token = last_key.cloned();
        }

        Ok(output)
    }

    fn is_object_exist(&self, _bucket: &str, key: &str) -> Result<bool, ClientError> {
        let state = self.begin_with_key("is_object_exist", key)?;
        Ok(state.objects.contains_key(key))
    }
}
