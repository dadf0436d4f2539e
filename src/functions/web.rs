//! Network-backed functions: search, scrape and generic API calls.
//!
//! Each behavior POSTs a JSON body to its configured service endpoint.
//! Scraping runs a concurrent first pass over every URL, then retries only
//! the failures sequentially with exponential backoff.

use std::time::Duration;

use base64::Engine as _;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    InferenceConfig, Result, StageflowError,
    common::Vars,
    functions::{FunctionOutcome, strings},
};

const SCRAPE_ATTEMPTS: u32 = 3;
const RETRY_BASE: Duration = Duration::from_secs(1);
const RETRY_CAP: Duration = Duration::from_secs(5);
const SECTION_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct ProxyRequest {
    url: String,
    method: String,
    headers: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
}

#[derive(Deserialize)]
struct ProxyResponse {
    status: u16,
    #[serde(default)]
    status_text: String,
    #[serde(default)]
    data: Value,
}

pub(crate) async fn web_search(
    client: &reqwest::Client,
    inference: &InferenceConfig,
    input: &str,
) -> Result<FunctionOutcome> {
    let query = input.trim();
    if query.is_empty() {
        return Err(StageflowError::Function("web_search requires a non-empty query".to_string()));
    }

    let response: SearchResponse = post_json(client, inference, &inference.search_url, &json!({ "query": query })).await?;
    if response.results.is_empty() {
        return Ok(FunctionOutcome::text(format!("No results for '{query}'")));
    }

    let sections: Vec<String> = response
        .results
        .iter()
        .map(|r| format!("{}\n{}\n{}", r.title, r.url, r.snippet))
        .collect();
    Ok(FunctionOutcome::text(sections.join(SECTION_SEPARATOR)))
}

pub(crate) async fn web_scrape(
    client: &reqwest::Client,
    inference: &InferenceConfig,
    input: &str,
) -> Result<FunctionOutcome> {
    let urls = strings::extract_urls(input);
    if urls.is_empty() {
        return Err(StageflowError::Function("web_scrape found no urls in input".to_string()));
    }

    // first pass: all urls at once
    let first_pass = join_all(urls.iter().map(|url| scrape_one(client, inference, url))).await;

    let mut sections: Vec<Option<String>> = Vec::with_capacity(urls.len());
    let mut failures: Vec<usize> = Vec::new();
    for (idx, result) in first_pass.into_iter().enumerate() {
        match result {
            Ok(section) => sections.push(Some(section)),
            Err(err) => {
                debug!("scrape of {} failed, queued for retry: {}", urls[idx], err);
                sections.push(None);
                failures.push(idx);
            }
        }
    }

    // second pass: failures one at a time, backing off between attempts
    for idx in failures {
        let url = &urls[idx];
        let mut last_err = None;
        for attempt in 1..SCRAPE_ATTEMPTS {
            tokio::time::sleep(backoff(attempt)).await;
            match scrape_one(client, inference, url).await {
                Ok(section) => {
                    sections[idx] = Some(section);
                    last_err = None;
                    break;
                }
                Err(err) => last_err = Some(err),
            }
        }
        if let Some(err) = last_err {
            sections[idx] = Some(format!("{url}\nFailed to scrape: {err}"));
        }
    }

    let joined = sections.into_iter().flatten().collect::<Vec<_>>().join(SECTION_SEPARATOR);
    Ok(FunctionOutcome::text(joined))
}

async fn scrape_one(
    client: &reqwest::Client,
    inference: &InferenceConfig,
    url: &str,
) -> Result<String> {
    let response: ScrapeResponse = post_json(client, inference, &inference.scrape_url, &json!({ "url": url })).await?;
    Ok(format!("{}\n{}", response.title, response.content))
}

fn backoff(attempt: u32) -> Duration {
    RETRY_BASE.saturating_mul(2u32.saturating_pow(attempt - 1)).min(RETRY_CAP)
}

/// Forward a request through the configured API proxy.
///
/// Config keys: `url` (required), `method` (default GET), `headers` (object),
/// `body` (any JSON), and optional `username`/`password` for basic auth.
pub(crate) async fn api_call(
    client: &reqwest::Client,
    inference: &InferenceConfig,
    config: &Vars,
    input: &str,
) -> Result<FunctionOutcome> {
    let url = config.get_str("url").ok_or(StageflowError::Function("api_call requires 'url' in config".to_string()))?;
    let method = config.get_str("method").unwrap_or("GET".to_string()).to_uppercase();

    let mut headers = config.get::<Value>("headers").unwrap_or(json!({}));
    if let (Some(user), Some(pass)) = (config.get_str("username"), config.get_str("password")) {
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"));
        if let Some(map) = headers.as_object_mut() {
            map.insert("Authorization".to_string(), json!(format!("Basic {token}")));
        }
    }

    let body = match config.get::<Value>("body") {
        Some(body) => Some(body),
        // non-GET requests without an explicit body forward the node input
        None if method != "GET" && !input.is_empty() => Some(json!(input)),
        None => None,
    };

    let request = ProxyRequest {
        url,
        method,
        headers,
        body,
    };
    let response: ProxyResponse = post_json(client, inference, &inference.api_proxy_url, &request).await?;

    if !(200..300).contains(&response.status) {
        return Err(StageflowError::Function(format!(
            "api_call failed with status {} {}",
            response.status, response.status_text
        )));
    }

    let text = match response.data {
        Value::String(text) => text,
        other => serde_json::to_string_pretty(&other)?,
    };
    Ok(FunctionOutcome::text(text))
}

async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
    client: &reqwest::Client,
    inference: &InferenceConfig,
    url: &str,
    body: &B,
) -> Result<R> {
    if url.is_empty() {
        return Err(StageflowError::Function("service endpoint is not configured".to_string()));
    }
    let mut request = client
        .post(url)
        .timeout(Duration::from_millis(inference.timeout))
        .json(body);
    if let Some(key) = &inference.api_key {
        request = request.bearer_auth(key);
    }
    let response = request
        .send()
        .await
        .map_err(|err| StageflowError::Function(format!("request to {url} failed: {err}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(StageflowError::Function(format!("{url} returned {status}")));
    }
    response
        .json::<R>()
        .await
        .map_err(|err| StageflowError::Function(format!("bad response from {url}: {err}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(backoff(1), Duration::from_secs(1));
        assert_eq!(backoff(2), Duration::from_secs(2));
        assert_eq!(backoff(3), Duration::from_secs(4));
        assert_eq!(backoff(5), RETRY_CAP);
    }

    #[tokio::test]
    async fn test_web_search_rejects_empty_query() {
        let client = reqwest::Client::new();
        assert!(web_search(&client, &InferenceConfig::default(), "   ").await.is_err());
    }

    #[tokio::test]
    async fn test_web_scrape_requires_urls() {
        let client = reqwest::Client::new();
        let err = web_scrape(&client, &InferenceConfig::default(), "no links here").await.unwrap_err();
        assert!(err.to_string().contains("no urls"));
    }

    #[tokio::test]
    async fn test_api_call_requires_url() {
        let client = reqwest::Client::new();
        let config = Vars::from(json!({"method": "POST"}));
        assert!(api_call(&client, &InferenceConfig::default(), &config, "body").await.is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_endpoint_is_an_error() {
        let client = reqwest::Client::new();
        let inference = InferenceConfig {
            api_proxy_url: String::new(),
            ..InferenceConfig::default()
        };
        let config = Vars::from(json!({"url": "https://api.example.com/v1"}));
        let err = api_call(&client, &inference, &config, "").await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }
}
