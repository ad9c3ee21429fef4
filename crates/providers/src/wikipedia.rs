//! Wikipedia knowledge source: REST search, then the page summary of the
//! best hit.

use reqwest::Url;
use serde_json::Value;

use ps_domain::config::EnrichmentConfig;
use ps_domain::error::{Error, Result};
use ps_domain::record::EnrichmentPayload;

use crate::traits::EnrichmentProvider;
use crate::util::{ensure_success, from_reqwest, http_client};

const DEFAULT_BASE: &str = "https://ko.wikipedia.org";

pub struct WikipediaProvider {
    base: Url,
    user_agent: String,
    client: reqwest::Client,
}

impl WikipediaProvider {
    pub fn from_config(cfg: &EnrichmentConfig) -> Result<Self> {
        let raw = cfg.base_url.as_deref().unwrap_or(DEFAULT_BASE);
        let base = Url::parse(raw).map_err(|e| Error::Config(format!("enrichment.base_url {raw:?}: {e}")))?;
        Ok(Self {
            base,
            user_agent: cfg.user_agent.clone(),
            client: http_client(cfg.request_timeout())?,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("enrichment.base_url {} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> Result<Value> {
        let resp = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(from_reqwest)?;
        let resp = ensure_success(self.provider_id(), resp).await?;
        resp.json().await.map_err(from_reqwest)
    }
}

/// Title of the first search hit.
fn first_title(search: &Value) -> Option<&str> {
    search
        .get("pages")?
        .as_array()?
        .first()?
        .get("title")?
        .as_str()
        .filter(|t| !t.is_empty())
}

#[async_trait::async_trait]
impl EnrichmentProvider for WikipediaProvider {
    async fn lookup(&self, term: &str) -> Result<EnrichmentPayload> {
        let term = term.trim();

        let mut search_url = self.url(&["w", "rest.php", "v1", "search", "page"])?;
        search_url
            .query_pairs_mut()
            .append_pair("q", term)
            .append_pair("limit", "1");
        let search = self.get_json(search_url).await?;

        let title = first_title(&search)
            .ok_or_else(|| Error::EmptyResult(term.to_owned()))?
            .to_owned();
        tracing::debug!(term, title = %title, "wikipedia search hit");

        let summary = self
            .get_json(self.url(&["api", "rest_v1", "page", "summary", title.as_str()])?)
            .await?;

        let mut payload = EnrichmentPayload::new("wikipedia", term);
        payload.search = Some(search);
        payload.summary = Some(summary);
        Ok(payload)
    }

    fn provider_id(&self) -> &str {
        "wikipedia"
    }
}
