use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use pagescope_core::S3Settings;

use crate::blob::{join_url, BlobStore};
use crate::error::StorageError;
use crate::keys::validate_key;

/// [`BlobStore`] backed by an S3-compatible bucket.
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    url_base: String,
}

impl S3BlobStore {
    /// Builds a client from `settings`.
    ///
    /// Static credentials are used when both keys are configured; otherwise
    /// the default AWS provider chain applies. A custom endpoint switches the
    /// client to path-style addressing, which MinIO and most S3-compatible
    /// stores expect.
    #[tracing::instrument(level = "debug", skip(settings), fields(bucket = %settings.bucket))]
    pub async fn new(settings: &S3Settings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));

        if let (Some(key_id), Some(secret)) =
            (&settings.access_key_id, &settings.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                "pagescope_static",
            ));
        }
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let shared = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(settings.endpoint.is_some())
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: settings.bucket.clone(),
            url_base: public_url_base(settings),
        }
    }
}

/// Base URL objects are served from.
///
/// Precedence: explicit public base URL, then `{endpoint}/{bucket}`, then
/// the AWS virtual-hosted form.
fn public_url_base(settings: &S3Settings) -> String {
    if let Some(base) = &settings.public_base_url {
        return base.trim_end_matches('/').to_owned();
    }
    if let Some(endpoint) = &settings.endpoint {
        return format!("{}/{}", endpoint.trim_end_matches('/'), settings.bucket);
    }
    format!(
        "https://{}.s3.{}.amazonaws.com",
        settings.bucket, settings.region
    )
}

#[async_trait]
impl BlobStore for S3BlobStore {
    #[tracing::instrument(level = "debug", skip(self, data), fields(bytes = data.len()))]
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError> {
        validate_key(key)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::backend("s3 put_object", e))?;

        Ok(join_url(&self.url_base, key))
    }
}
