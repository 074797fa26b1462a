//! A model served by an Ollama instance (`POST {base_url}/api/generate`).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use verity_core::assessment::Label;

use crate::{Error, Evaluate, Request, Result, Verdict};

pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
You are assessing whether a text is relevant to a research topic.

Topic definition:
{topic}

Text:
{text}

Reply with one JSON object and nothing else:
{\"label\": \"relevant\" | \"not_relevant\" | \"unsure\", \"confidence\": <number from 0 to 1>, \"rationale\": \"<one sentence>\"}";

#[derive(Debug, Clone)]
pub struct OllamaJudge {
  client:   reqwest::Client,
  endpoint: String,
  model:    String,
  template: String,
  timeout:  Duration,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
  model:  &'a str,
  prompt: &'a str,
  stream: bool,
}

#[derive(Deserialize)]
struct RawVerdict {
  label:      String,
  #[serde(default)]
  confidence: Option<f64>,
  #[serde(default)]
  rationale:  Option<String>,
}

impl OllamaJudge {
  pub fn new(
    client: reqwest::Client,
    base_url: &str,
    model: &str,
    timeout: Duration,
    prompt_template: Option<&str>,
  ) -> Self {
    Self {
      client,
      endpoint: format!("{}/api/generate", base_url.trim_end_matches('/')),
      model: model.to_owned(),
      template: prompt_template.unwrap_or(DEFAULT_PROMPT_TEMPLATE).to_owned(),
      timeout,
    }
  }

  /// Fill `{topic}` and `{text}` in the template.
  pub fn prompt(&self, request: &Request<'_>) -> String {
    self
      .template
      .replace("{topic}", request.topic_definition)
      .replace("{text}", request.text)
  }

  fn http_error(&self, e: reqwest::Error) -> Error {
    if e.is_timeout() {
      Error::Timeout(self.timeout.as_millis() as u64)
    } else {
      Error::Http(e)
    }
  }
}

/// Pull the verdict object out of the model's free text.
pub fn parse_verdict(text: &str) -> Result<Verdict> {
  let object = match (text.find('{'), text.rfind('}')) {
    (Some(start), Some(end)) if start < end => &text[start..=end],
    _ => return Err(Error::Invocation(format!("no verdict object in model output: {text:?}"))),
  };
  let raw: RawVerdict = serde_json::from_str(object)
    .map_err(|e| Error::Invocation(format!("unparsable verdict: {e}")))?;
  let label = Label::parse(&raw.label).map_err(|e| Error::Invocation(e.to_string()))?;
  Ok(Verdict { label, confidence: raw.confidence, rationale: raw.rationale })
}

impl Evaluate for OllamaJudge {
  async fn evaluate<'a>(&'a self, request: Request<'a>) -> Result<Verdict> {
    let prompt = self.prompt(&request);
    debug!(model = %self.model, endpoint = %self.endpoint, "invoking ollama");

    let response = self
      .client
      .post(&self.endpoint)
      .timeout(self.timeout)
      .json(&GenerateRequest { model: &self.model, prompt: &prompt, stream: false })
      .send()
      .await
      .map_err(|e| self.http_error(e))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(Error::Invocation(format!("ollama returned {status}: {body}")));
    }

    let body: Value = response
      .json()
      .await
      .map_err(|e| Error::Invocation(format!("invalid JSON response from ollama: {e}")))?;
    let text = body
      .get("response")
      .and_then(Value::as_str)
      .ok_or_else(|| Error::Invocation("missing 'response' field in ollama response".into()))?;
    parse_verdict(text)
  }
}

#[cfg(test)]
mod tests {
  use axum::{Json, Router, http::StatusCode, routing::post};
  use serde_json::json;
  use verity_core::article::ArticleContext;

  use super::*;

  async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{addr}")
  }

  fn judge(base_url: &str, timeout: Duration) -> OllamaJudge {
    OllamaJudge::new(reqwest::Client::new(), base_url, "llama3", timeout, None)
  }

  fn request(context: &ArticleContext) -> Request<'_> {
    Request { topic_definition: "Elections", text: "Turnout rose.", context }
  }

  #[test]
  fn verdict_is_extracted_from_surrounding_text() {
    let v = parse_verdict(
      "Sure! {\"label\": \"Relevant\", \"confidence\": 0.7, \"rationale\": \"mentions turnout\"} Done.",
    )
    .unwrap();
    assert_eq!(v.label, Label::Relevant);
    assert_eq!(v.confidence, Some(0.7));
    assert_eq!(v.rationale.as_deref(), Some("mentions turnout"));
  }

  #[test]
  fn garbage_output_is_an_invocation_failure() {
    assert!(matches!(parse_verdict("I cannot answer"), Err(Error::Invocation(_))));
    assert!(matches!(parse_verdict("{\"label\": \"maybe\"}"), Err(Error::Invocation(_))));
  }

  #[test]
  fn prompt_fills_placeholders() {
    let j = judge("http://localhost:11434/", Duration::from_secs(1));
    let context = ArticleContext::default();
    let prompt = j.prompt(&request(&context));
    assert!(prompt.contains("Elections"));
    assert!(prompt.contains("Turnout rose."));
    assert_eq!(j.endpoint, "http://localhost:11434/api/generate");
  }

  #[tokio::test]
  async fn generate_round_trip() {
    let router = Router::new().route(
      "/api/generate",
      post(|Json(body): Json<Value>| async move {
        assert_eq!(body["stream"], json!(false));
        assert_eq!(body["model"], json!("llama3"));
        Json(json!({"response": "{\"label\": \"not_relevant\", \"confidence\": 0.4}"}))
      }),
    );
    let base = serve(router).await;
    let context = ArticleContext::default();
    let v = judge(&base, Duration::from_secs(5)).evaluate(request(&context)).await.unwrap();
    assert_eq!(v.label, Label::NotRelevant);
    assert_eq!(v.confidence, Some(0.4));
  }

  #[tokio::test]
  async fn non_success_status_fails() {
    let router = Router::new().route(
      "/api/generate",
      post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model not loaded") }),
    );
    let base = serve(router).await;
    let context = ArticleContext::default();
    let err = judge(&base, Duration::from_secs(5)).evaluate(request(&context)).await.unwrap_err();
    assert!(matches!(err, Error::Invocation(msg) if msg.contains("500")));
  }

  #[tokio::test]
  async fn missing_response_field_fails() {
    let router =
      Router::new().route("/api/generate", post(|| async { Json(json!({"done": true})) }));
    let base = serve(router).await;
    let context = ArticleContext::default();
    let err = judge(&base, Duration::from_secs(5)).evaluate(request(&context)).await.unwrap_err();
    assert!(matches!(err, Error::Invocation(msg) if msg.contains("response")));
  }

  #[tokio::test]
  async fn slow_server_times_out() {
    let router = Router::new().route(
      "/api/generate",
      post(|| async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Json(json!({"response": "{}"}))
      }),
    );
    let base = serve(router).await;
    let context = ArticleContext::default();
    let err = judge(&base, Duration::from_millis(100))
      .evaluate(request(&context))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Timeout(100)));
  }
}
