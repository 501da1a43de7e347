use image::DynamicImage;
use log::{debug, error, info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::cache::ImageCache;
use super::error::FetchError;
use super::picsum::{ImageRecord, PicsumClient};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryEvent {
    /// A foreground fetch replaced the image list.
    DataChanged { page: u32, count: usize },
    /// The background warm of `page` finished.
    CacheWarmed { page: u32, cached: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPhase {
    #[default]
    Idle,
    Fetching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// A newer update started before this one finished; its result was dropped.
    Superseded,
}

/// Consistent view of the image list and the page it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GallerySnapshot {
    /// Page the records were fetched from, 0 before the first update.
    pub page: u32,
    pub records: Vec<ImageRecord>,
}

struct GalleryState {
    page_count: u32,
    records_page: u32,
    records: Vec<ImageRecord>,
}

#[derive(Default)]
struct FetchSlot {
    generation: u64,
    current: Option<CancellationToken>,
}

/// Frees the fetch slot when its fetch ends, however it ends, unless a newer
/// fetch has taken the slot over.
struct FetchGuard {
    slot: Arc<Mutex<FetchSlot>>,
    generation: u64,
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        let mut slot = lock_slot(&self.slot);
        if slot.generation == self.generation {
            slot.current = None;
        }
    }
}

fn lock_slot(slot: &Mutex<FetchSlot>) -> MutexGuard<'_, FetchSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Session state shared between the terminal loop and background fetches.
///
/// Only one foreground fetch is live at a time. Starting another cancels the
/// previous one, which then discards whatever it received.
#[derive(Clone)]
pub struct Gallery {
    client: PicsumClient,
    cache: ImageCache,
    state: Arc<RwLock<GalleryState>>,
    slot: Arc<Mutex<FetchSlot>>,
    events: mpsc::UnboundedSender<GalleryEvent>,
}

impl Gallery {
    pub fn new(client: PicsumClient) -> (Self, mpsc::UnboundedReceiver<GalleryEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let gallery = Self {
            cache: ImageCache::new(client.clone()),
            client,
            state: Arc::new(RwLock::new(GalleryState {
                page_count: 1,
                records_page: 0,
                records: Vec::new(),
            })),
            slot: Arc::new(Mutex::new(FetchSlot::default())),
            events,
        };
        (gallery, events_rx)
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn phase(&self) -> FetchPhase {
        if lock_slot(&self.slot).current.is_some() {
            FetchPhase::Fetching
        } else {
            FetchPhase::Idle
        }
    }

    pub async fn page_count(&self) -> u32 {
        self.state.read().await.page_count
    }

    pub async fn snapshot(&self) -> GallerySnapshot {
        let state = self.state.read().await;
        GallerySnapshot {
            page: state.records_page,
            records: state.records.clone(),
        }
    }

    /// Fetches the current page in the background, replaces the image list
    /// and advances the page counter, then warms the cache with the following
    /// page. Any update still in flight is superseded right away.
    pub fn update_images(&self) -> JoinHandle<Result<FetchOutcome, FetchError>> {
        let gallery = self.clone();
        let (token, guard) = self.begin_fetch();
        tokio::spawn(async move {
            let _guard = guard;
            gallery.run_fetch(token).await
        })
    }

    pub async fn get_image(&self, index: usize) -> Option<Arc<DynamicImage>> {
        let record = self.state.read().await.records.get(index).cloned()?;
        self.cache.get(&record).await
    }

    pub async fn handle_memory_pressure(&self) {
        info!("Memory pressure, clearing image cache");
        self.cache.clear().await;
    }

    fn begin_fetch(&self) -> (CancellationToken, FetchGuard) {
        let token = CancellationToken::new();
        let mut slot = lock_slot(&self.slot);
        slot.generation += 1;
        if let Some(previous) = slot.current.replace(token.clone()) {
            debug!("Superseding in-flight image update");
            previous.cancel();
        }
        let guard = FetchGuard {
            slot: self.slot.clone(),
            generation: slot.generation,
        };
        (token, guard)
    }

    async fn run_fetch(&self, token: CancellationToken) -> Result<FetchOutcome, FetchError> {
        let page = self.state.read().await.page_count;
        info!("Updating images from page {}", page);

        let result = tokio::select! {
            _ = token.cancelled() => return Ok(FetchOutcome::Superseded),
            result = self.client.fetch_page(page) => result,
        };

        let mut state = self.state.write().await;
        if token.is_cancelled() {
            return Ok(FetchOutcome::Superseded);
        }

        let records = match result {
            Ok(records) => records,
            Err(e) => {
                error!("Error fetching page {}: {}", page, e);
                return Err(e);
            }
        };

        let count = records.len();
        state.records = records;
        state.records_page = page;
        state.page_count += 1;
        let next_page = state.page_count;
        drop(state);

        info!("Received {} images for page {}", count, page);
        let _ = self.events.send(GalleryEvent::DataChanged { page, count });
        self.spawn_prefetch(next_page);

        Ok(FetchOutcome::Applied)
    }

    fn spawn_prefetch(&self, page: u32) -> JoinHandle<()> {
        let client = self.client.clone();
        let cache = self.cache.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            info!("Prepping cache for page {}", page);
            match client.fetch_page(page).await {
                Ok(records) => {
                    let cached = cache.warm(&records).await;
                    debug!("Warmed {} of {} images for page {}", cached, records.len(), page);
                    let _ = events.send(GalleryEvent::CacheWarmed { page, cached });
                }
                Err(e) => error!("Error prefetching page {}: {}", page, e),
            }
        })
    }
}
