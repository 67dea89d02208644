//! Content Lookup
//!
//! Read-only access to the documents a site serves.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::ContentConfig;

/// A renderable document.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
    pub content_type: String,
    pub body: Bytes,
    /// Sets an `Expires` header this many seconds ahead when present.
    pub expires_secs: Option<u64>,
    /// `false` keeps rendered pages of this item out of the page cache.
    pub cacheable: bool,
}

impl ContentItem {
    pub fn html(body: impl Into<Bytes>) -> Self {
        Self {
            content_type: "text/html; charset=utf-8".to_string(),
            body: body.into(),
            expires_secs: None,
            cacheable: true,
        }
    }
}

/// Looks up content by site and site-relative path.
#[async_trait]
pub trait ContentLookup: Send + Sync {
    async fn find(&self, site: &str, path: &str) -> Option<ContentItem>;
}

// == Static Content ==
/// Content held in memory, keyed by `(site, path)`.
#[derive(Debug, Clone, Default)]
pub struct StaticContent {
    items: HashMap<(String, String), ContentItem>,
}

impl StaticContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(items: &[ContentConfig]) -> Self {
        let mut content = Self::new();
        for item in items {
            content.insert(
                &item.site,
                &item.path,
                ContentItem {
                    content_type: item.content_type.clone(),
                    body: Bytes::from(item.body.clone()),
                    expires_secs: item.expires_secs,
                    cacheable: item.cacheable,
                },
            );
        }
        content
    }

    pub fn insert(&mut self, site: &str, path: &str, item: ContentItem) {
        self.items
            .insert((site.to_string(), normalize(path)), item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl ContentLookup for StaticContent {
    async fn find(&self, site: &str, path: &str) -> Option<ContentItem> {
        self.items
            .get(&(site.to_string(), normalize(path)))
            .cloned()
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    format!("/{trimmed}")
}
