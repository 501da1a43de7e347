//! Canned transport for exercising the backend without the network.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use reqwest::Url;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::config::GalleryConfig;
use super::error::TransportError;
use super::picsum::ImageRecord;

pub const BASE_URL: &str = "http://picsum.test";
pub const PAGE_SIZE: u32 = 25;
pub const IMAGE_SIZE: (u32, u32) = (2, 3);

pub fn config() -> GalleryConfig {
    GalleryConfig::default()
        .with_base_url(BASE_URL)
        .with_page_size(PAGE_SIZE)
}

pub fn list_url(page: u32) -> String {
    format!("{}/v2/list?page={}&limit={}", BASE_URL, page, PAGE_SIZE)
}

pub fn image_url(id: &str) -> String {
    format!("{}/id/{}/full", BASE_URL, id)
}

pub fn record(id: &str) -> ImageRecord {
    ImageRecord {
        id: id.to_string(),
        author: format!("Author {}", id),
        width: 640,
        height: 480,
        url: format!("https://unsplash.com/photos/{}", id),
        download_url: image_url(id),
    }
}

/// Records of `page`, with ids continuing across pages ("0".."24" on page 1).
pub fn page_records(page: u32) -> Vec<ImageRecord> {
    let start = (page - 1) * PAGE_SIZE;
    (start..start + PAGE_SIZE)
        .map(|id| record(&id.to_string()))
        .collect()
}

pub fn png_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::new_rgb8(IMAGE_SIZE.0, IMAGE_SIZE.1)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode test png");
    bytes
}

struct Hold {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

/// Serves registered bodies, counts requests per URL and answers 404 otherwise.
#[derive(Default)]
pub struct StubTransport {
    routes: Mutex<HashMap<String, Result<Vec<u8>, u16>>>,
    hits: Mutex<HashMap<String, usize>>,
    holds: Mutex<HashMap<String, Hold>>,
}

impl StubTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve_json(&self, url: &str, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(body.as_bytes().to_vec()));
    }

    pub fn serve_image(&self, url: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(png_bytes()));
    }

    pub fn fail(&self, url: &str, status: u16) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(status));
    }

    /// Serves the metadata list of `page` and the image behind every record.
    pub fn serve_page(&self, page: u32) -> Vec<ImageRecord> {
        let records = page_records(page);
        let body = serde_json::to_string(&records).expect("encode test page");
        self.serve_json(&list_url(page), &body);
        for record in &records {
            self.serve_image(&record.download_url);
        }
        records
    }

    /// Parks the next request for `url` until `release` is notified.
    /// `entered` fires once the request has arrived.
    pub fn hold(&self, url: &str) -> (Arc<Notify>, Arc<Notify>) {
        let hold = Hold {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        let handles = (hold.entered.clone(), hold.release.clone());
        self.holds.lock().unwrap().insert(url.to_string(), hold);
        handles
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl super::transport::Transport for StubTransport {
    async fn get(&self, url: Url) -> Result<Vec<u8>, TransportError> {
        let key = url.to_string();
        *self.hits.lock().unwrap().entry(key.clone()).or_insert(0) += 1;

        let hold = self.holds.lock().unwrap().remove(&key);
        if let Some(hold) = hold {
            hold.entered.notify_one();
            hold.release.notified().await;
        }

        let route = self.routes.lock().unwrap().get(&key).cloned();
        match route {
            Some(Ok(body)) => Ok(body),
            Some(Err(status)) => Err(TransportError::Status(status)),
            None => Err(TransportError::Status(404)),
        }
    }
}
