use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://picsum.photos";
pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const USER_AGENT: &str = "picsum-gallery/0.1.0";

/// Settings for talking to the Picsum API.
#[derive(Debug, Clone)]
pub struct GalleryConfig {
    pub base_url: String,
    pub page_size: u32,
    pub user_agent: String,
    pub timeout: Duration,
}

#[cfg(test)]
impl GalleryConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            user_agent: USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}
