use std::{fmt, str::FromStr};

use time::OffsetDateTime;

/// OSS access-control levels for objects and buckets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Acl {
    Private,
    PublicRead,
    PublicReadWrite,
    /// Object follows the bucket ACL.
    Default,
}

impl Acl {
    pub fn as_str(&self) -> &'static str {
        match self {
            Acl::Private => "private",
            Acl::PublicRead => "public-read",
            Acl::PublicReadWrite => "public-read-write",
            Acl::Default => "default",
        }
    }
}

impl FromStr for Acl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Acl::Private),
            "public-read" => Ok(Acl::PublicRead),
            "public-read-write" => Ok(Acl::PublicReadWrite),
            "default" => Ok(Acl::Default),
            other => Err(format!("unknown acl: {}", other)),
        }
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Headers of a single object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub last_modified: Option<OffsetDateTime>,
    pub etag: Option<String>,
}

/// One object of a listing page.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<OffsetDateTime>,
    pub etag: Option<String>,
    pub storage_class: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListObjectsV2Request {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub max_keys: Option<i32>,
    pub continuation_token: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListObjectsV2Output {
    pub contents: Vec<ObjectSummary>,
    pub common_prefixes: Vec<String>,
    pub next_continuation_token: Option<String>,
    pub is_truncated: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PutObjectOptions {
    pub acl: Option<Acl>,
    pub content_type: Option<String>,
}
