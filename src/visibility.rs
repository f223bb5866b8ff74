use crate::{
    adapters::ObjectClient,
    error::ClientError,
    model::{fs::Visibility, oss::Acl},
};

/// Effective ACL of an object: its own, or the bucket's when the object
/// inherits (`default`).
pub fn resolve_acl(
    client: &dyn ObjectClient,
    bucket: &str,
    key: &str,
) -> Result<Acl, ClientError> {
    match client.get_object_acl(bucket, key)? {
        Acl::Default => client.get_bucket_acl(bucket),
        acl => Ok(acl),
    }
}

pub fn visibility_for_acl(acl: Acl) -> Visibility {
    match acl {
        Acl::PublicRead | Acl::PublicReadWrite => Visibility::Public,
        // a bucket never inherits; treat it as locked down
        Acl::Private | Acl::Default => Visibility::Private,
    }
}

pub fn acl_for_visibility(visibility: Visibility, public_acl: Acl) -> Acl {
    match visibility {
        Visibility::Public => public_acl,
        Visibility::Private => Acl::Private,
    }
}
