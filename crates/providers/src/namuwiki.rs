//! NamuWiki knowledge source: fetch the article page and flatten the text
//! rendered under `#app`.

use reqwest::Url;
use scraper::{Html, Selector};

use ps_domain::config::EnrichmentConfig;
use ps_domain::error::{Error, Result};
use ps_domain::record::EnrichmentPayload;

use crate::traits::EnrichmentProvider;
use crate::util::{ensure_success, from_reqwest, http_client};

const DEFAULT_BASE: &str = "https://namu.wiki";

pub struct NamuWikiProvider {
    base: Url,
    user_agent: String,
    client: reqwest::Client,
}

impl NamuWikiProvider {
    pub fn from_config(cfg: &EnrichmentConfig) -> Result<Self> {
        let raw = cfg.base_url.as_deref().unwrap_or(DEFAULT_BASE);
        let base = Url::parse(raw).map_err(|e| Error::Config(format!("enrichment.base_url {raw:?}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(Error::Config(format!("enrichment.base_url {raw:?} cannot be a base")));
        }
        Ok(Self {
            base,
            user_agent: cfg.user_agent.clone(),
            client: http_client(cfg.request_timeout())?,
        })
    }

    fn article_url(&self, title: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["w", title]);
        }
        url
    }
}

/// Text of every text node under `#app`, whitespace-collapsed.
pub(crate) fn extract_app_text(html: &str) -> Result<String> {
    let app_sel = Selector::parse("#app").map_err(|e| Error::Other(format!("selector: {e:?}")))?;
    let any_sel = Selector::parse("*").map_err(|e| Error::Other(format!("selector: {e:?}")))?;

    let doc = Html::parse_document(html);
    let mut pieces: Vec<&str> = Vec::new();
    for app in doc.select(&app_sel) {
        for el in app.select(&any_sel) {
            pieces.extend(
                el.children()
                    .filter_map(|child| child.value().as_text())
                    .map(|text| text.trim())
                    .filter(|text| !text.is_empty()),
            );
        }
    }

    Ok(pieces
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" "))
}

#[async_trait::async_trait]
impl EnrichmentProvider for NamuWikiProvider {
    async fn lookup(&self, term: &str) -> Result<EnrichmentPayload> {
        let term = term.trim();
        let url = self.article_url(term);
        tracing::debug!(term, url = %url, "namuwiki fetch");

        let resp = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept-Language", "ko-KR,ko;q=0.9,en;q=0.7")
            .send()
            .await
            .map_err(from_reqwest)?;
        let resp = ensure_success(self.provider_id(), resp).await?;
        let html = resp.text().await.map_err(from_reqwest)?;

        let content = extract_app_text(&html)?;
        if content.is_empty() {
            return Err(Error::EmptyResult(term.to_owned()));
        }

        let mut payload = EnrichmentPayload::new("namuwiki", term);
        payload.content = Some(content);
        Ok(payload)
    }

    fn provider_id(&self) -> &str {
        "namuwiki"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_text_under_app_only() {
        let html = r#"
            <html><body>
              <nav>site menu</nav>
              <div id="app">
                <h1>선충</h1>
                <div><p>선형동물문에   속하는
                  동물의 총칭.</p><span>C. elegans</span></div>
              </div>
              <footer>copyright</footer>
            </body></html>"#;
        let text = extract_app_text(html).unwrap();
        assert_eq!(text, "선충 선형동물문에 속하는 동물의 총칭. C. elegans");
    }

    #[test]
    fn missing_app_yields_empty_text() {
        let text = extract_app_text("<html><body><p>nothing here</p></body></html>").unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn article_url_encodes_title() {
        let provider = NamuWikiProvider::from_config(&EnrichmentConfig::default()).unwrap();
        let url = provider.article_url("C. elegans");
        assert_eq!(url.as_str(), "https://namu.wiki/w/C.%20elegans");
    }
}
