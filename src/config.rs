use std::time::Duration;

use crate::model::oss::Acl;

/// OSS rejects batch deletes and listings above this many keys.
pub const MAX_PAGE_SIZE: i32 = 1000;
pub const MIN_PART_SIZE: usize = 100 * 1024;
pub const DEFAULT_PART_SIZE: usize = 8 * 1024 * 1024;

const OSS_HOST_SUFFIX: &str = ".aliyuncs.com";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required oss parameter: {0}")]
    MissingParam(&'static str),

    #[error("invalid oss parameter {name}: {reason}")]
    InvalidParam { name: &'static str, reason: String },

    #[error("failed to start client runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Connection settings for an OSS bucket.
#[derive(Clone, Debug)]
pub struct OssConfig {
    pub endpoint: String,
    pub region: Option<String>,
    pub bucket: String,
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub max_attempts: u32,
    /// Streams larger than one part go through multipart upload.
    pub part_size: usize,
}

impl OssConfig {
    pub fn new(endpoint: &str, bucket: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            region: None,
            bucket: bucket.to_string(),
            access_key_id: None,
            access_key_secret: None,
            connect_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(30),
            max_attempts: 3,
            part_size: DEFAULT_PART_SIZE,
        }
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn with_credentials(mut self, access_key_id: &str, access_key_secret: &str) -> Self {
        self.access_key_id = Some(access_key_id.to_string());
        self.access_key_secret = Some(access_key_secret.to_string());
        self
    }

    pub fn endpoint_url(&self) -> String {
        if self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://") {
            self.endpoint.clone()
        } else {
            format!("https://{}", self.endpoint)
        }
    }

    /// The explicit region, or the one encoded in an `oss-<region>.aliyuncs.com` endpoint.
    pub fn region_name(&self) -> Result<String, ConfigError> {
        if let Some(region) = self.region.as_ref().filter(|r| !r.is_empty()) {
            return Ok(region.clone());
        }

        region_from_endpoint(&self.endpoint).ok_or(ConfigError::MissingParam("region"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.is_empty() {
            return Err(ConfigError::MissingParam("bucket"));
        }

        if self.endpoint.is_empty() {
            return Err(ConfigError::MissingParam("endpoint"));
        }

        match (&self.access_key_id, &self.access_key_secret) {
            (Some(_), None) => return Err(ConfigError::MissingParam("access_key_secret")),
            (None, Some(_)) => return Err(ConfigError::MissingParam("access_key_id")),
            _ => {}
        }

        if self.part_size < MIN_PART_SIZE {
            return Err(ConfigError::InvalidParam {
                name: "part_size",
                reason: format!("must be at least {} bytes", MIN_PART_SIZE),
            });
        }

        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidParam {
                name: "max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }

        self.region_name().map(|_| ())
    }
}

fn region_from_endpoint(endpoint: &str) -> Option<String> {
    let host = endpoint
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split(['/', ':'])
        .next()?;

    if !host.ends_with(OSS_HOST_SUFFIX) {
        return None;
    }

    host.split('.')
        .find_map(|label| label.strip_prefix("oss-"))
        .map(|region| region.trim_end_matches("-internal").to_string())
        .filter(|region| !region.is_empty())
}

/// Behavior switches of `OssAdapter` that do not touch the connection.
#[derive(Clone, Debug)]
pub struct AdapterOptions {
    /// Keys per listing page and per batch delete.
    pub page_size: i32,
    /// ACL written for `Visibility::Public`.
    pub public_acl: Acl,
    /// Report listing failures as an empty listing instead of an error.
    pub lenient_listing: bool,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            public_acl: Acl::PublicRead,
            lenient_listing: false,
        }
    }
}

impl AdapterOptions {
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn with_public_acl(mut self, acl: Acl) -> Self {
        self.public_acl = acl;
        self
    }

    pub fn with_lenient_listing(mut self, lenient: bool) -> Self {
        self.lenient_listing = lenient;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_from_endpoint() {
        let cases = vec![
            ("oss-cn-hangzhou.aliyuncs.com", Some("cn-hangzhou")),
            ("https://oss-cn-shanghai.aliyuncs.com", Some("cn-shanghai")),
            ("oss-cn-beijing-internal.aliyuncs.com", Some("cn-beijing")),
            ("http://oss-ap-southeast-1.aliyuncs.com:80/", Some("ap-southeast-1")),
            ("https://minio.local:9000", None),
            ("oss.aliyuncs.com", None),
        ];

        for (endpoint, expected) in cases {
            assert_eq!(
                region_from_endpoint(endpoint).as_deref(),
                expected,
                "failed for case: {}",
                endpoint
            );
        }
    }

    #[test]
    fn test_endpoint_url() {
        let cases = vec![
            ("oss-cn-hangzhou.aliyuncs.com", "https://oss-cn-hangzhou.aliyuncs.com"),
            ("http://127.0.0.1:9000", "http://127.0.0.1:9000"),
        ];

        for (endpoint, expected) in cases {
            let config = OssConfig::new(endpoint, "bucket");
            assert_eq!(config.endpoint_url(), expected, "failed for case: {}", endpoint);
        }
    }

    #[test]
    fn test_validate() {
        let valid = OssConfig::new("oss-cn-hangzhou.aliyuncs.com", "bucket");
        assert!(valid.validate().is_ok());

        let cases = vec![
            ("bucket", OssConfig::new("oss-cn-hangzhou.aliyuncs.com", "")),
            ("endpoint", OssConfig::new("", "bucket").with_region("cn-hangzhou")),
            ("region", OssConfig::new("https://minio.local:9000", "bucket")),
            (
                "access_key_secret",
                OssConfig {
                    access_key_id: Some("id".to_string()),
                    ..valid.clone()
                },
            ),
            (
                "part_size",
                OssConfig {
                    part_size: 1024,
                    ..valid.clone()
                },
            ),
            (
                "max_attempts",
                OssConfig {
                    max_attempts: 0,
                    ..valid.clone()
                },
            ),
        ];

        for (param, config) in cases {
            let err = config.validate().unwrap_err();
            assert!(
                err.to_string().contains(param),
                "failed for case: {}, got: {}",
                param,
                err
            );
        }
    }

    #[test]
    fn test_explicit_region_wins() {
        let config = OssConfig::new("https://minio.local:9000", "bucket").with_region("us-east-1");
        assert_eq!(config.region_name().unwrap(), "us-east-1");
    }

    #[test]
    fn test_page_size_is_clamped() {
        let cases = vec![(0, 1), (2, 2), (1000, 1000), (5000, 1000)];

        for (input, expected) in cases {
            let options = AdapterOptions::default().with_page_size(input);
            assert_eq!(options.page_size, expected, "failed for case: {}", input);
        }
    }
}
