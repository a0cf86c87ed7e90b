use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tracing::{debug, warn};

use ai_client::truncate_chars;
use factcheck_common::{FetchStatus, ScrapedSource, SearchResult};

use crate::settings::PipelineSettings;
use crate::traits::PageFetcher;

static NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<noscript\b[^>]*>.*?</noscript\s*>|<!--.*?-->",
    )
    .expect("valid regex")
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static MD_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
static MD_LINE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:#{1,6}|[-*+]|>|\d+\.)[ \t]+").expect("valid regex"));
static MD_EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)\*{1,3}|`+|^-{3,}$").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Fetches one candidate and reduces it to plain text, classifying every
/// way that can go wrong. Never fails: a bad page becomes a non-ok status.
pub struct Scraper {
    fetcher: Arc<dyn PageFetcher>,
    timeout: Duration,
    max_chars: usize,
}

impl Scraper {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: &PipelineSettings) -> Self {
        Self {
            fetcher,
            timeout: settings.scrape_timeout,
            max_chars: settings.max_source_chars,
        }
    }

    pub async fn scrape(&self, result: SearchResult) -> ScrapedSource {
        let url = result.url.as_str();

        let page = match tokio::time::timeout(self.timeout, self.fetcher.fetch(url)).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                let status = if is_timeout(&e) {
                    FetchStatus::Timeout
                } else {
                    FetchStatus::HttpError
                };
                warn!(url, stage = "scrape", fetcher = self.fetcher.name(), error = %e, %status, "Fetch failed");
                return ScrapedSource::failed(result, status);
            }
            Err(_) => {
                warn!(url, stage = "scrape", error = "timeout", timeout_secs = self.timeout.as_secs_f64(), "Fetch timed out");
                return ScrapedSource::failed(result, FetchStatus::Timeout);
            }
        };

        if !page.is_success() {
            warn!(url, stage = "scrape", status = page.status, "Non-success response");
            return ScrapedSource::failed(result, FetchStatus::HttpError);
        }

        let content_type = page.content_type.as_deref();
        if !is_text_content_type(content_type) {
            debug!(url, content_type = ?content_type, "Skipping non-text content");
            return ScrapedSource::failed(result, FetchStatus::NonText);
        }

        let text = if is_plain_text(content_type) {
            collapse_whitespace(&page.body)
        } else {
            html_to_text(url, &page.body)
        };

        if text.is_empty() {
            warn!(url, stage = "scrape", "Empty content after extraction");
            return ScrapedSource::failed(result, FetchStatus::Empty);
        }

        let text = truncate_chars(&text, self.max_chars).to_string();
        debug!(url, chars = text.chars().count(), "Scraped source");
        ScrapedSource::ok(result, text)
    }
}

/// Whether a `Content-Type` header denotes something we can read as text.
/// A missing header is given the benefit of the doubt.
pub fn is_text_content_type(content_type: Option<&str>) -> bool {
    let mime = match content_type.map(mime_type) {
        None => return true,
        Some(mime) if mime.is_empty() => return true,
        Some(mime) => mime,
    };
    matches!(
        mime.as_str(),
        "text/html" | "application/xhtml+xml" | "text/plain"
    )
}

fn is_plain_text(content_type: Option<&str>) -> bool {
    content_type.map(mime_type).as_deref() == Some("text/plain")
}

fn mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_timeout(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .is_some_and(reqwest::Error::is_timeout)
    })
}

/// Readable text of an HTML document. Readability extraction first; if it
/// finds nothing, every tag is stripped instead.
pub fn html_to_text(url: &str, html: &str) -> String {
    let cleaned = NOISE.replace_all(html, " ");

    let parsed_url = url::Url::parse(url).ok();
    let config = TransformConfig {
        readability: true,
        main_content: true,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: cleaned.as_bytes(),
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };

    let extracted = collapse_whitespace(&markdown_to_text(&transform_content_input(input, &config)));
    if !extracted.is_empty() {
        return extracted;
    }

    debug!(url, "Readability found nothing, stripping tags");
    collapse_whitespace(&strip_tags(&cleaned))
}

/// Drop markdown syntax, keeping link text.
fn markdown_to_text(markdown: &str) -> String {
    let text = MD_LINK.replace_all(markdown, "$1");
    let text = MD_LINE_MARKER.replace_all(&text, "");
    MD_EMPHASIS.replace_all(&text, "").into_owned()
}

/// Remove markup and decode the handful of entities that matter for prose.
pub fn strip_tags(html: &str) -> String {
    let text = NOISE.replace_all(html, " ");
    let text = TAG.replace_all(&text, " ");
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{article, MockFetcher};
    use crate::traits::FetchedPage;

    const PARAGRAPH: &str = "The Eiffel Tower is a wrought-iron lattice tower on the Champ de Mars in Paris, France. \
        It is named after the engineer Gustave Eiffel, whose company designed and built the tower between 1887 and 1889.";

    fn result(url: &str) -> SearchResult {
        SearchResult {
            title: "Eiffel Tower".to_string(),
            url: url.to_string(),
            rank: 0,
        }
    }

    fn scraper(fetcher: MockFetcher, settings: PipelineSettings) -> Scraper {
        Scraper::new(Arc::new(fetcher), &settings)
    }

    fn settings() -> PipelineSettings {
        PipelineSettings::builder()
            .scrape_timeout(Duration::from_millis(100))
            .build()
    }

    #[test]
    fn content_type_classification() {
        assert!(is_text_content_type(None));
        assert!(is_text_content_type(Some("")));
        assert!(is_text_content_type(Some("text/html; charset=UTF-8")));
        assert!(is_text_content_type(Some("application/xhtml+xml")));
        assert!(is_text_content_type(Some("TEXT/PLAIN")));
        assert!(!is_text_content_type(Some("application/pdf")));
        assert!(!is_text_content_type(Some("image/png")));
        assert!(!is_text_content_type(Some("application/json")));
    }

    #[test]
    fn strip_tags_removes_markup_and_scripts() {
        let html = "<div><script>alert('x')</script><style>p { color: red }</style>\
                    <!-- hidden --><p>Fish &amp; chips</p><p>&quot;quoted&quot;</p></div>";
        let text = collapse_whitespace(&strip_tags(html));
        assert_eq!(text, "Fish & chips \"quoted\"");
    }

    #[test]
    fn collapse_whitespace_normalizes_runs() {
        assert_eq!(collapse_whitespace("  a\n\n b\t\tc  "), "a b c");
        assert_eq!(collapse_whitespace(" \n\t "), "");
    }

    #[test]
    fn markdown_syntax_is_dropped() {
        let text = collapse_whitespace(&markdown_to_text(
            "# Heading\n\n- **bold** item\n- [link text](https://example.org)\n> quote",
        ));
        assert_eq!(text, "Heading bold item link text quote");
    }

    #[test]
    fn html_to_text_drops_scripts_and_keeps_prose() {
        let text = html_to_text("https://example.org/eiffel", &article("Eiffel Tower", PARAGRAPH));
        assert!(text.contains("Champ de Mars"), "got: {text}");
        assert!(!text.contains("var tracking"));
        assert!(!text.contains('<'));
        assert!(!text.contains("  "));
    }

    #[tokio::test]
    async fn ok_page_is_extracted() {
        let url = "https://example.org/eiffel";
        let fetcher = MockFetcher::new().on_page(url, &article("Eiffel Tower", PARAGRAPH));

        let scraped = scraper(fetcher, settings()).scrape(result(url)).await;
        assert_eq!(scraped.fetch_status, FetchStatus::Ok);
        assert!(scraped.raw_text.contains("Gustave Eiffel"));
    }

    #[tokio::test]
    async fn plain_text_is_passed_through() {
        let url = "https://example.org/notes.txt";
        let fetcher = MockFetcher::new().on_response(
            url,
            FetchedPage {
                status: 200,
                content_type: Some("text/plain".into()),
                body: "line one\n\nline <two>".into(),
            },
        );

        let scraped = scraper(fetcher, settings()).scrape(result(url)).await;
        assert_eq!(scraped.fetch_status, FetchStatus::Ok);
        assert_eq!(scraped.raw_text, "line one line <two>");
    }

    #[tokio::test]
    async fn text_is_truncated_to_budget() {
        let url = "https://example.org/long.txt";
        let body = "é".repeat(50);
        let fetcher = MockFetcher::new().on_response(
            url,
            FetchedPage {
                status: 200,
                content_type: Some("text/plain".into()),
                body,
            },
        );
        let settings = PipelineSettings::builder().max_source_chars(10).build();

        let scraped = scraper(fetcher, settings).scrape(result(url)).await;
        assert_eq!(scraped.raw_text.chars().count(), 10);
    }

    #[tokio::test]
    async fn failures_are_classified() {
        let fetcher = MockFetcher::new()
            .on_hang("https://slow.example/")
            .on_error("https://down.example/", "connection refused")
            .on_response(
                "https://missing.example/",
                FetchedPage {
                    status: 404,
                    content_type: Some("text/html".into()),
                    body: "<p>Not found</p>".into(),
                },
            )
            .on_response(
                "https://pdf.example/",
                FetchedPage {
                    status: 200,
                    content_type: Some("application/pdf".into()),
                    body: String::new(),
                },
            )
            .on_page("https://blank.example/", "<html><body>  <script>x()</script> </body></html>");
        let scraper = scraper(fetcher, settings());

        let cases = [
            ("https://slow.example/", FetchStatus::Timeout),
            ("https://down.example/", FetchStatus::HttpError),
            ("https://missing.example/", FetchStatus::HttpError),
            ("https://pdf.example/", FetchStatus::NonText),
            ("https://blank.example/", FetchStatus::Empty),
        ];
        for (url, expected) in cases {
            let scraped = scraper.scrape(result(url)).await;
            assert_eq!(scraped.fetch_status, expected, "{url}");
            assert!(scraped.raw_text.is_empty());
        }
    }
}
