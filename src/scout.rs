// src/scout.rs
// The Scout: fetches live news text used as experimental context.
// Searches the DuckDuckGo HTML endpoint and scrapes title/snippet pairs;
// no API key required.

use std::time::Duration;

use scraper::{Html, Selector};

use crate::error::SurveyError;

/// Seam for the news source so batches can run against canned context in
/// tests.
pub trait ContextProvider {
    /// Returns the aggregated news text for a topic, or a typed failure.
    /// Never returns error text disguised as context.
    fn fetch_context(&self, topic: &str) -> Result<String, SurveyError>;
}

pub struct NewsScout {
    agent: ureq::Agent,
}

const SEARCH_URL: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; surveyor_core/0.1)";

impl NewsScout {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(20))
            .user_agent(USER_AGENT)
            .build();
        Self { agent }
    }
}

impl Default for NewsScout {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextProvider for NewsScout {
    fn fetch_context(&self, topic: &str) -> Result<String, SurveyError> {
        let query = format!("{topic} news");
        let url = format!("{SEARCH_URL}?q={}", urlencoding::encode(&query));

        let body = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| SurveyError::ContextFetch {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?
            .into_string()
            .map_err(|e| SurveyError::ContextFetch {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;

        let news_text = render_articles(&parse_results(&body));
        if news_text.is_empty() {
            return Err(SurveyError::ContextFetch {
                topic: topic.to_string(),
                reason: "search returned no parseable articles".to_string(),
            });
        }
        Ok(news_text)
    }
}

/// Pulls (title, description) pairs out of a DuckDuckGo HTML results page.
fn parse_results(body: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(body);
    let result_selector = Selector::parse("div.result").unwrap();
    let title_selector = Selector::parse("a.result__a").unwrap();
    let snippet_selector = Selector::parse("a.result__snippet").unwrap();

    let mut articles = Vec::new();
    for result in document.select(&result_selector) {
        let title = result
            .select(&title_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        if title.is_empty() {
            continue;
        }
        let description = result
            .select(&snippet_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        articles.push((title, description));
    }
    articles
}

/// Formats scraped articles the way the result tables expect them:
/// one `Title:`/`Description:` block per article.
fn render_articles(articles: &[(String, String)]) -> String {
    let mut news_text = String::new();
    for (title, description) in articles {
        news_text.push_str(&format!("Title: {title}\nDescription: {description}\n\n"));
    }
    news_text
}
