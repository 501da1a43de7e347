use image::DynamicImage;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;

use super::config::GalleryConfig;
use super::error::{FetchError, ImageError};
use super::transport::{ReqwestTransport, Transport};

/// One entry of the `/v2/list` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub author: String,
    pub width: u32,
    pub height: u32,
    pub url: String,
    pub download_url: String,
}

#[derive(Clone)]
pub struct PicsumClient {
    transport: Arc<dyn Transport>,
    config: Arc<GalleryConfig>,
}

impl PicsumClient {
    pub fn new(config: GalleryConfig) -> Result<Self, FetchError> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, config: GalleryConfig) -> Self {
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    pub fn page_url(&self, page: u32) -> Result<Url, FetchError> {
        if page == 0 {
            return Err(FetchError::InvalidPage(page));
        }

        let base = self.config.base_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/v2/list", base))
            .map_err(|e| FetchError::General(format!("invalid base URL '{}': {}", base, e)))?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("limit", &self.config.page_size.to_string());

        Ok(url)
    }

    /// Retrieves one page of image metadata.
    pub async fn fetch_page(&self, page: u32) -> Result<Vec<ImageRecord>, FetchError> {
        let url = self.page_url(page)?;
        let body = self.transport.get(url).await?;
        let records: Vec<ImageRecord> = serde_json::from_slice(&body)?;

        Ok(records)
    }

    /// Downloads and decodes the image behind `download_url`.
    pub async fn download_image(&self, download_url: &str) -> Result<DynamicImage, ImageError> {
        let url = Url::parse(download_url).map_err(|e| ImageError::InvalidUrl {
            url: download_url.to_string(),
            reason: e.to_string(),
        })?;

        let bytes = self.transport.get(url).await?;

        image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ImageError::Undecodable(e.to_string()))?
            .decode()
            .map_err(|e| ImageError::Undecodable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{self, StubTransport};

    fn client(stub: &Arc<StubTransport>) -> PicsumClient {
        PicsumClient::with_transport(stub.clone(), testing::config())
    }

    #[test]
    fn page_url_carries_page_and_limit() {
        let client = PicsumClient::with_transport(
            StubTransport::new(),
            GalleryConfig::default().with_base_url("https://picsum.photos/"),
        );

        let url = client.page_url(3).unwrap();
        assert_eq!(url.as_str(), "https://picsum.photos/v2/list?page=3&limit=25");
    }

    #[test]
    fn page_size_is_configurable() {
        let client = PicsumClient::with_transport(
            StubTransport::new(),
            GalleryConfig::default().with_page_size(10),
        );

        let url = client.page_url(1).unwrap();
        assert_eq!(url.query(), Some("page=1&limit=10"));
    }

    #[test]
    fn page_zero_is_rejected() {
        let client = client(&StubTransport::new());
        assert!(matches!(client.page_url(0), Err(FetchError::InvalidPage(0))));
    }

    #[tokio::test]
    async fn fetch_page_decodes_snake_case_fields() {
        let stub = StubTransport::new();
        stub.serve_json(
            &testing::list_url(1),
            r#"[{"id":"0","author":"Alejandro Escamilla","width":5000,"height":3333,
                "url":"https://unsplash.com/photos/yC-Yzbqy7PY",
                "download_url":"https://picsum.photos/id/0/5000/3333"}]"#,
        );

        let records = client(&stub).fetch_page(1).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "0");
        assert_eq!(records[0].author, "Alejandro Escamilla");
        assert_eq!(records[0].width, 5000);
        assert_eq!(records[0].height, 3333);
        assert_eq!(records[0].download_url, "https://picsum.photos/id/0/5000/3333");
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let stub = StubTransport::new();
        stub.serve_json(&testing::list_url(1), r#"{"error":"nope"}"#);

        let err = client(&stub).fetch_page(1).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn transport_failure_is_a_general_error() {
        let stub = StubTransport::new();
        stub.fail(&testing::list_url(1), 503);

        let err = client(&stub).fetch_page(1).await.unwrap_err();
        assert!(matches!(err, FetchError::General(_)));
    }

    #[tokio::test]
    async fn download_rejects_malformed_url() {
        let stub = StubTransport::new();

        let err = client(&stub).download_image("not a url").await.unwrap_err();

        assert!(matches!(err, ImageError::InvalidUrl { .. }));
        assert_eq!(stub.total_hits(), 0);
    }

    #[tokio::test]
    async fn download_decodes_image_bytes() {
        let stub = StubTransport::new();
        let url = testing::image_url("7");
        stub.serve_image(&url);

        let image = client(&stub).download_image(&url).await.unwrap();
        assert_eq!((image.width(), image.height()), testing::IMAGE_SIZE);
    }

    #[tokio::test]
    async fn download_of_garbage_bytes_is_undecodable() {
        let stub = StubTransport::new();
        let url = testing::image_url("7");
        stub.serve_json(&url, "definitely not a png");

        let err = client(&stub).download_image(&url).await.unwrap_err();
        assert!(matches!(err, ImageError::Undecodable(_)));
    }
}
