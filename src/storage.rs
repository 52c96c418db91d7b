//! Object storage for generated images.
//!
//! Thin wrapper around `object_store`, which already provides S3,
//! local-filesystem, and in-memory backends. Objects are keyed by a
//! generated unique name; the public retrieval URL is built from a
//! configured base so the gallery can serve images without proxying.

use std::sync::Arc;

use bytes::Bytes;
use object_store::path::Path;
use object_store::{ObjectStore, ObjectStoreExt};

use crate::config::{Config, StorageBackendKind};
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct ArtStore {
    store: Arc<dyn ObjectStore>,
    public_base_url: String,
}

impl ArtStore {
    /// Build the store selected by configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = match config.storage_backend {
            StorageBackendKind::S3 => {
                let mut builder = object_store::aws::AmazonS3Builder::from_env()
                    .with_bucket_name(&config.storage_bucket);
                if let Some(ref endpoint) = config.storage_endpoint {
                    builder = builder.with_endpoint(endpoint);
                    if endpoint.starts_with("http://") {
                        builder = builder.with_allow_http(true);
                    }
                }
                Arc::new(builder.build()?)
            }
            StorageBackendKind::Filesystem => {
                std::fs::create_dir_all(&config.storage_path)?;
                Arc::new(object_store::local::LocalFileSystem::new_with_prefix(
                    &config.storage_path,
                )?)
            }
            StorageBackendKind::Memory => Arc::new(object_store::memory::InMemory::new()),
        };

        Ok(Self {
            store,
            public_base_url: config.storage_public_url.trim_end_matches('/').to_string(),
        })
    }

    /// In-memory store, for tests.
    pub fn in_memory(public_base_url: &str) -> Self {
        Self {
            store: Arc::new(object_store::memory::InMemory::new()),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Store a generated image under the given object name.
    pub async fn put_png(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let path = object_path(name)?;
        self.store
            .put(&path, object_store::PutPayload::from(Bytes::from(bytes)))
            .await?;
        Ok(())
    }

    /// Fetch an object back (used by tests).
    pub async fn get(&self, name: &str) -> Result<Vec<u8>> {
        let path = object_path(name)?;
        let result = self.store.get(&path).await?;
        Ok(result.bytes().await?.to_vec())
    }

    /// Durable public URL for a stored object.
    pub fn public_url(&self, name: &str) -> String {
        format!("{}/{}", self.public_base_url, name)
    }
}

fn object_path(name: &str) -> Result<Path> {
    let name = name.trim_start_matches('/');
    if name.is_empty() {
        return Err(Error::Validation("object name must not be empty".to_string()));
    }
    Ok(Path::from(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let store = ArtStore::in_memory("http://localhost:9000/artworks");
        store.put_png("abc.png", vec![1, 2, 3]).await.unwrap();
        assert_eq!(store.get("abc.png").await.unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn public_url_joins_cleanly() {
        let store = ArtStore::in_memory("http://localhost:9000/artworks/");
        assert_eq!(
            store.public_url("abc.png"),
            "http://localhost:9000/artworks/abc.png"
        );
    }

    #[test]
    fn empty_object_name_rejected() {
        assert!(object_path("").is_err());
    }
}
