use futures::stream::{FuturesUnordered, StreamExt};
use image::DynamicImage;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::picsum::{ImageRecord, PicsumClient};

/// Decoded images keyed by record id.
///
/// Entries are only ever added by a lookup miss or by warming a page, and are
/// only ever removed all at once by [`ImageCache::clear`]. There is no size
/// bound.
#[derive(Clone)]
pub struct ImageCache {
    inner: Arc<RwLock<ImageCacheInner>>,
    client: PicsumClient,
}

#[derive(Default)]
struct ImageCacheInner {
    images: HashMap<String, Arc<DynamicImage>>,
    hits: u64,
    misses: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cache: {} images ({} hits, {} misses)",
            self.entries, self.hits, self.misses
        )
    }
}

impl ImageCache {
    pub fn new(client: PicsumClient) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ImageCacheInner::default())),
            client,
        }
    }

    /// Returns the image for `record`, downloading it on a miss.
    ///
    /// Failed downloads return `None` and leave nothing behind in the cache.
    pub async fn get(&self, record: &ImageRecord) -> Option<Arc<DynamicImage>> {
        {
            let mut inner = self.inner.write().await;
            if let Some(image) = inner.images.get(&record.id).cloned() {
                inner.hits += 1;
                debug!("Image id '{}' served from cache", record.id);
                return Some(image);
            }
            inner.misses += 1;
        }

        debug!("Image id '{}' is being fetched from API", record.id);
        match self.client.download_image(&record.download_url).await {
            Ok(image) => {
                let image = Arc::new(image);
                let mut inner = self.inner.write().await;
                debug!("Adding image id '{}' to the cache", record.id);
                inner.images.insert(record.id.clone(), image.clone());
                Some(image)
            }
            Err(e) => {
                warn!("Image id '{}' unavailable: {}", record.id, e);
                None
            }
        }
    }

    /// Downloads every record's image concurrently and caches each one as it
    /// arrives. Returns how many ended up cached.
    pub async fn warm(&self, records: &[ImageRecord]) -> usize {
        let mut downloads: FuturesUnordered<_> = records
            .iter()
            .map(|record| async move {
                let result = self.client.download_image(&record.download_url).await;
                (record, result)
            })
            .collect();

        let mut cached = 0;
        while let Some((record, result)) = downloads.next().await {
            match result {
                Ok(image) => {
                    self.inner
                        .write()
                        .await
                        .images
                        .insert(record.id.clone(), Arc::new(image));
                    cached += 1;
                }
                Err(e) => warn!("Skipping image id '{}' while warming: {}", record.id, e),
            }
        }

        cached
    }

    #[cfg(test)]
    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.images.contains_key(id)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.read().await.images.len()
    }

    #[cfg(test)]
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        info!("Dropping {} cached images", inner.images.len());
        inner.images.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        CacheStats {
            entries: inner.images.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}
