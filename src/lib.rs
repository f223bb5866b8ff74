//! Alibaba Cloud OSS backend for a generic filesystem abstraction.
//!
//! `OssAdapter` maps the uniform `FilesystemAdapter` operations onto OSS
//! object calls; `Filesystem` wraps any adapter with path normalization.

pub mod adapters;
pub mod config;
pub mod error;
pub mod filesystem;
pub mod fs;
pub mod model;
pub mod pager;
pub mod util;
pub mod visibility;

pub use adapters::{mock::MockClient, oss::OssClient, ObjectClient};
pub use config::{AdapterOptions, OssConfig};
pub use error::{ClientError, FilesystemError};
pub use filesystem::Filesystem;
pub use fs::{FilesystemAdapter, OssAdapter};
pub use model::fs::{FileAttributes, StorageAttributes, Visibility, WriteConfig};
