//! Selector-driven HTML content source.
//!
//! Search and detail pages are fetched with a plain GET and parsed with
//! configured CSS selectors. Nothing about a particular dictionary site is
//! hard-coded here; everything comes from [`HtmlSourceConfig`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use hanjadeck_shared::{HanjaDeckError, HtmlSourceConfig, Record, Result, SourceError};

use super::{Candidate, ContentSource, EntryDetail, SourceResult};

/// User-Agent string for lookup requests.
const USER_AGENT: &str = concat!("HanjaDeck/", env!("CARGO_PKG_VERSION"));

const QUERY_PLACEHOLDER: &str = "{query}";
const ID_PLACEHOLDER: &str = "{id}";

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Selectors {
    candidate_row: Selector,
    candidate_label: Selector,
    candidate_link: Selector,
    meaning: Selector,
    example: Selector,
    sub_entry: Selector,
    fields: Vec<(String, Selector)>,
}

impl Selectors {
    fn compile(config: &HtmlSourceConfig) -> Result<Self> {
        Ok(Self {
            candidate_row: compile_selector("candidate_row", &config.candidate_row)?,
            candidate_label: compile_selector("candidate_label", &config.candidate_label)?,
            candidate_link: compile_selector("candidate_link", &config.candidate_link)?,
            meaning: compile_selector("meaning", &config.meaning)?,
            example: compile_selector("example", &config.example)?,
            sub_entry: compile_selector("sub_entry", &config.sub_entry)?,
            fields: config
                .fields
                .iter()
                .map(|(name, css)| Ok((name.clone(), compile_selector(name, css)?)))
                .collect::<Result<Vec<_>>>()?,
        })
    }
}

fn compile_selector(name: &str, css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| {
        HanjaDeckError::configuration(format!("invalid selector for '{name}' ({css}): {e:?}"))
    })
}

// ---------------------------------------------------------------------------
// HtmlSource
// ---------------------------------------------------------------------------

/// HTTP content source parsing search and detail pages with CSS selectors.
#[derive(Debug)]
pub struct HtmlSource {
    client: Client,
    search_url: String,
    detail_url: String,
    selectors: Selectors,
}

impl HtmlSource {
    /// Build a source from its configuration.
    ///
    /// Fails with a configuration error if a URL template lacks its
    /// placeholder or a selector does not parse.
    pub fn new(config: &HtmlSourceConfig, timeout: Duration) -> Result<Self> {
        if !config.search_url.contains(QUERY_PLACEHOLDER) {
            return Err(HanjaDeckError::configuration(format!(
                "search_url must contain {QUERY_PLACEHOLDER}"
            )));
        }
        if !config.detail_url.contains(ID_PLACEHOLDER) {
            return Err(HanjaDeckError::configuration(format!(
                "detail_url must contain {ID_PLACEHOLDER}"
            )));
        }

        let selectors = Selectors::compile(config)?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()
            .map_err(|e| {
                HanjaDeckError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            search_url: config.search_url.clone(),
            detail_url: config.detail_url.clone(),
            selectors,
        })
    }

    async fn fetch(&self, url: &str) -> SourceResult<String> {
        debug!(%url, "fetching");

        let response = self.client.get(url).send().await.map_err(transport_error)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound);
        }
        if !status.is_success() {
            return Err(SourceError::Transport(format!("{url}: HTTP {status}")));
        }

        response.text().await.map_err(transport_error)
    }
}

#[async_trait]
impl ContentSource for HtmlSource {
    #[instrument(skip(self))]
    async fn query(&self, text: &str) -> SourceResult<Vec<Candidate>> {
        let url = self.search_url.replace(QUERY_PLACEHOLDER, &encode(text));
        let base = Url::parse(&url).map_err(|e| SourceError::Malformed(format!("{url}: {e}")))?;
        let body = self.fetch(&url).await?;
        Ok(parse_candidates(&body, &base, &self.selectors))
    }

    #[instrument(skip(self))]
    async fn detail(&self, id: &str) -> SourceResult<EntryDetail> {
        let url = self.detail_url.replace(ID_PLACEHOLDER, &encode(id));
        let base = Url::parse(&url).map_err(|e| SourceError::Malformed(format!("{url}: {e}")))?;
        let body = self.fetch(&url).await?;
        Ok(parse_detail(&body, &base, &self.selectors))
    }

    fn name(&self) -> &str {
        "html"
    }
}

fn transport_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Transport(e.to_string())
    }
}

fn encode(text: &str) -> String {
    url::form_urlencoded::byte_serialize(text.as_bytes()).collect()
}

// ---------------------------------------------------------------------------
// Page parsing
// ---------------------------------------------------------------------------

fn parse_candidates(body: &str, base: &Url, selectors: &Selectors) -> Vec<Candidate> {
    let doc = Html::parse_document(body);
    let mut candidates = Vec::new();

    for row in doc.select(&selectors.candidate_row) {
        let label = row
            .select(&selectors.candidate_label)
            .next()
            .map(element_text)
            .unwrap_or_default();
        let id = row
            .select(&selectors.candidate_link)
            .next()
            .and_then(|link| link_id(link, base));

        match id {
            Some(id) if !label.is_empty() => candidates.push(Candidate { label, id }),
            _ => debug!("skipping candidate row without label or link"),
        }
    }

    candidates
}

fn parse_detail(body: &str, base: &Url, selectors: &Selectors) -> EntryDetail {
    let doc = Html::parse_document(body);

    let mut fields = Record::new();
    for (name, selector) in &selectors.fields {
        if let Some(text) = doc.select(selector).next().map(element_text) {
            if !text.is_empty() {
                fields.insert(name.as_str(), text);
            }
        }
    }

    let meanings = doc
        .select(&selectors.meaning)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect();

    let examples = doc
        .select(&selectors.example)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect();

    let mut sub_entry_ids: Vec<String> = Vec::new();
    for id in doc.select(&selectors.sub_entry).filter_map(|el| link_id(el, base)) {
        if !sub_entry_ids.contains(&id) {
            sub_entry_ids.push(id);
        }
    }

    EntryDetail {
        fields,
        sub_entry_ids,
        meanings,
        examples,
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The entry id is the last non-empty path segment of the link target.
fn link_id(el: ElementRef<'_>, base: &Url) -> Option<String> {
    let href = el.value().attr("href")?;
    let url = base.join(href).ok()?;
    url.path_segments()?
        .rev()
        .find(|segment| !segment.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> HtmlSourceConfig {
        let mut fields = indexmap::IndexMap::new();
        fields.insert("reading".to_string(), ".reading".to_string());
        fields.insert("radical".to_string(), ".radical".to_string());

        HtmlSourceConfig {
            search_url: format!("{}/search?q={{query}}", server.uri()),
            detail_url: format!("{}/entry/{{id}}", server.uri()),
            candidate_row: ".row".into(),
            candidate_label: ".label".into(),
            candidate_link: "a".into(),
            meaning: ".meaning".into(),
            example: ".example".into(),
            sub_entry: ".derived a".into(),
            fields,
        }
    }

    const SEARCH_PAGE: &str = r#"<html><body>
        <div class="row"><span class="label">木</span><a href="/entry/1001">보기</a></div>
        <div class="row"><span class="label">林</span><a href="/entry/1002/">보기</a></div>
        <div class="row"><span class="label">森</span></div>
    </body></html>"#;

    const DETAIL_PAGE: &str = r#"<html><body>
        <span class="reading"> 목 </span>
        <ul>
            <li class="meaning">나무</li>
            <li class="meaning">   </li>
            <li class="meaning">목재</li>
        </ul>
        <p class="example">나무를   심어
            숲을 만든다</p>
        <div class="derived">
            <a href="/entry/2001">木材</a>
            <a href="https://elsewhere.test/entry/2002?ref=x">木星</a>
            <a href="/entry/2001">木材</a>
        </div>
    </body></html>"#;

    #[tokio::test]
    async fn query_parses_candidate_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "木"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_PAGE))
            .mount(&server)
            .await;

        let source = HtmlSource::new(&config_for(&server), Duration::from_secs(5)).unwrap();
        let candidates = source.query("木").await.expect("query");

        assert_eq!(
            candidates,
            vec![Candidate::new("木", "1001"), Candidate::new("林", "1002")]
        );
    }

    #[tokio::test]
    async fn detail_extracts_fields_meanings_examples_and_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/entry/1001"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DETAIL_PAGE))
            .mount(&server)
            .await;

        let source = HtmlSource::new(&config_for(&server), Duration::from_secs(5)).unwrap();
        let detail = source.detail("1001").await.expect("detail");

        assert_eq!(detail.fields.get_text("reading"), Some("목"));
        assert!(!detail.fields.contains_key("radical"));
        assert_eq!(detail.meanings, vec!["나무", "목재"]);
        assert_eq!(detail.examples, vec!["나무를 심어 숲을 만든다"]);
        assert_eq!(detail.sub_entry_ids, vec!["2001", "2002"]);
    }

    #[tokio::test]
    async fn missing_page_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = HtmlSource::new(&config_for(&server), Duration::from_secs(5)).unwrap();
        assert_eq!(source.detail("9").await.unwrap_err(), SourceError::NotFound);
    }

    #[tokio::test]
    async fn server_error_is_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HtmlSource::new(&config_for(&server), Duration::from_secs(5)).unwrap();
        let err = source.query("木").await.unwrap_err();
        assert!(matches!(err, SourceError::Transport(msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(SEARCH_PAGE)
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let source = HtmlSource::new(&config_for(&server), Duration::from_millis(200)).unwrap();
        assert_eq!(source.query("木").await.unwrap_err(), SourceError::Timeout);
    }

    #[test]
    fn invalid_selector_is_configuration_error() {
        let mut config = HtmlSourceConfig {
            search_url: "http://localhost/s?q={query}".into(),
            detail_url: "http://localhost/e/{id}".into(),
            candidate_row: ".row".into(),
            candidate_label: ".label".into(),
            candidate_link: "a".into(),
            meaning: ".meaning".into(),
            example: ".example".into(),
            sub_entry: ".derived a".into(),
            fields: Default::default(),
        };
        config.meaning = "[[".into();

        let err = HtmlSource::new(&config, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, HanjaDeckError::Configuration { .. }));
        assert!(err.to_string().contains("meaning"));
    }

    #[test]
    fn url_template_needs_placeholder() {
        let config = HtmlSourceConfig {
            search_url: "http://localhost/s".into(),
            detail_url: "http://localhost/e/{id}".into(),
            candidate_row: ".row".into(),
            candidate_label: ".label".into(),
            candidate_link: "a".into(),
            meaning: ".meaning".into(),
            example: ".example".into(),
            sub_entry: ".derived a".into(),
            fields: Default::default(),
        };
        assert!(HtmlSource::new(&config, Duration::from_secs(1)).is_err());
    }
}
