use crate::{adapters::ObjectClient, error::ClientError, model};

/// Lazily pulls `ListObjectsV2` pages, following continuation tokens until
/// the backend reports the listing is no longer truncated.
///
/// Iteration stops after the first error. `restart` rewinds to the first page.
pub struct ListPages<'a> {
    client: &'a dyn ObjectClient,
    bucket: &'a str,
    request: model::oss::ListObjectsV2Request,
    finished: bool,
}

impl<'a> ListPages<'a> {
    pub fn new(
        client: &'a dyn ObjectClient,
        bucket: &'a str,
        request: model::oss::ListObjectsV2Request,
    ) -> Self {
        Self {
            client,
            bucket,
            request: model::oss::ListObjectsV2Request {
                continuation_token: None,
                ..request
            },
            finished: false,
        }
    }

    pub fn restart(&mut self) {
        self.request.continuation_token = None;
        self.finished = false;
    }
}

impl Iterator for ListPages<'_> {
    type Item = Result<model::oss::ListObjectsV2Output, ClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let page = match self.client.list_objects_v2(self.bucket, &self.request) {
            Err(err) => {
                self.finished = true;
                return Some(Err(err));
            }
            Ok(page) => page,
        };

        // a truncated page without a token cannot be continued
        match (page.is_truncated, &page.next_continuation_token) {
            (true, Some(token)) => self.request.continuation_token = Some(token.clone()),
            _ => self.finished = true,
        }

        Some(Ok(page))
    }
}
