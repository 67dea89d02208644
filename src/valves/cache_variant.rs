//! Cache Variant Valve
//!
//! Adds configured query parameters and cookies to the page cache key so
//! that pages varying on them are cached once per value. Runs ahead of the
//! page caching valve.

use async_trait::async_trait;

use crate::config::CacheVariantConfig;
use crate::error::Result;
use crate::pipeline::{Valve, ValveContext};

pub struct CacheVariantValve {
    query: Vec<String>,
    cookies: Vec<String>,
}

impl CacheVariantValve {
    pub fn new(query: Vec<String>, cookies: Vec<String>) -> Self {
        Self { query, cookies }
    }

    pub fn from_config(config: &CacheVariantConfig) -> Self {
        Self::new(config.query.clone(), config.cookies.clone())
    }

    /// `(attribute, value)` pairs for this request. Absent values are kept
    /// as `None` so that "missing" and "empty" stay distinct keys.
    fn variants(&self, ctx: &ValveContext) -> Vec<(String, Option<String>)> {
        let request = ctx.request();
        let query = self.query.iter().map(|name| {
            (
                format!("query.{name}"),
                request.query_param(name).map(str::to_string),
            )
        });
        let cookies = self.cookies.iter().map(|name| {
            (
                format!("cookie.{name}"),
                request.cookie(name).map(str::to_string),
            )
        });
        query.chain(cookies).collect()
    }
}

#[async_trait]
impl Valve for CacheVariantValve {
    async fn invoke(&self, ctx: &mut ValveContext) -> Result<()> {
        let variants = self.variants(ctx);
        let key = ctx.page_cache_context_mut().key_mut();
        for (name, value) in &variants {
            key.set_attribute(name, value)?;
        }
        ctx.invoke_next().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::PageRequest;
    use crate::pipeline::RegisteredValve;
    use std::sync::Arc;

    async fn key_for(request: PageRequest) -> String {
        let valve = CacheVariantValve::new(vec!["lang".into()], vec!["theme".into()]);
        let valves: Vec<RegisteredValve> = vec![RegisteredValve::new("cache-variant", Arc::new(valve))];
        let mut ctx = ValveContext::new(request);
        ctx.walk("processing", valves.into()).await.unwrap();
        ctx.page_cache_context().key().as_cache_string()
    }

    #[tokio::test]
    async fn test_query_and_cookie_values_enter_the_key() {
        let request = PageRequest::get("/news?lang=fr&page=2").with_header("cookie", "theme=dark; sid=1");

        let key = key_for(request).await;

        assert_eq!(key, r#"query.lang="fr";cookie.theme="dark""#);
    }

    #[tokio::test]
    async fn test_different_values_give_different_keys() {
        let french = key_for(PageRequest::get("/news?lang=fr")).await;
        let german = key_for(PageRequest::get("/news?lang=de")).await;
        let unrelated = key_for(PageRequest::get("/news?lang=fr&page=9")).await;

        assert_ne!(french, german);
        assert_eq!(french, unrelated);
    }

    #[tokio::test]
    async fn test_missing_value_is_null_not_empty() {
        let missing = key_for(PageRequest::get("/news")).await;
        let empty = key_for(PageRequest::get("/news?lang=")).await;

        assert_eq!(missing, "query.lang=null;cookie.theme=null");
        assert_ne!(missing, empty);
    }

    #[tokio::test]
    async fn test_encoded_query_value_is_decoded_into_the_key() {
        let encoded = key_for(PageRequest::get("/news?lang=pt%2Dbr")).await;
        let plain = key_for(PageRequest::get("/news?lang=pt-br")).await;

        assert_eq!(encoded, plain);
    }
}
