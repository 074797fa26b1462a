//! Router tests against an in-memory `SqliteStore`.

use std::{sync::Arc, time::Duration};

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use chrono::{TimeDelta, TimeZone, Utc};
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;
use verity_core::{
  article::{ArticleContent, ArticleContext, ArticleStatus, NewArticle},
  assessment::{AssessmentKey, Label, NewAssessment},
  audit::Actor,
  store::RelevanceStore,
};
use verity_judge::Engines;
use verity_store_sqlite::SqliteStore;

use super::*;

struct TestApp {
  router: Router,
  store:  Arc<SqliteStore>,
}

async fn app() -> TestApp {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let settings = ApiSettings { judge_timeout: Duration::from_secs(5), ..Default::default() };
  let state = ApiState::new(store.clone(), Arc::new(Engines::default()), settings);
  TestApp { router: api_router(state), store }
}

impl TestApp {
  async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
    let resp = self.router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
  }

  async fn get(&self, uri: &str) -> (StatusCode, Value) {
    self
      .send(Request::builder().uri(uri).body(Body::empty()).unwrap())
      .await
  }

  async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
      .method("POST")
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap();
    self.send(req).await
  }

  /// Upserts a topic; returns its id.
  async fn topic(&self, key: &str, status: &str) -> String {
    let (code, body) = self
      .post(
        "/v1/topics",
        json!({
          "key": key,
          "name": key,
          "definition": format!("Articles about {key}."),
          "status": status,
        }),
      )
      .await;
    assert_eq!(code, StatusCode::CREATED, "{body}");
    body["topic"]["topic_id"].as_str().unwrap().to_owned()
  }

  /// A fixed automated judge; returns its id.
  async fn fixed_judge(&self, impl_key: &str, label: &str) -> String {
    let (code, body) = self
      .post(
        "/v1/judges",
        json!({
          "display_name": impl_key,
          "profile": {
            "kind": "automated",
            "automation_type": "rule",
            "impl_key": impl_key,
            "version": "1.0.0",
            "config": {
              "provider": "fixed",
              "label": label,
              "confidence": 0.8,
              "rationale": "fixed",
            },
          },
        }),
      )
      .await;
    assert_eq!(code, StatusCode::CREATED, "{body}");
    body["judge_id"].as_str().unwrap().to_owned()
  }

  async fn judge_article(
    &self,
    topic_id: &str,
    impl_key: &str,
    text: &str,
    options: Value,
  ) -> (StatusCode, Value) {
    self
      .post(
        "/v1/relevance/judge",
        json!({
          "topic_id": topic_id,
          "article": { "text": text, "context": { "source_type": "manual" }, "language": "en" },
          "judge": { "type": "automated", "impl_key": impl_key },
          "options": options,
        }),
      )
      .await
  }

  async fn wait_for_import(&self, import_id: &str) -> Value {
    for _ in 0..100 {
      let (code, body) = self.get(&format!("/v1/import/{import_id}")).await;
      assert_eq!(code, StatusCode::OK);
      if body["status"] != "processing" {
        return body;
      }
      tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("import {import_id} never finished");
  }
}

const BOUNDARY: &str = "verity-test-boundary";

fn multipart(fields: &[(&str, &str)]) -> Request<Body> {
  let mut body = String::new();
  for (name, value) in fields {
    let disposition = if *name == "file" {
      format!("form-data; name=\"{name}\"; filename=\"upload.csv\"\r\nContent-Type: text/csv")
    } else {
      format!("form-data; name=\"{name}\"")
    };
    body.push_str(&format!(
      "--{BOUNDARY}\r\nContent-Disposition: {disposition}\r\n\r\n{value}\r\n"
    ));
  }
  body.push_str(&format!("--{BOUNDARY}--\r\n"));
  Request::builder()
    .method("POST")
    .uri("/v1/import/csv")
    .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
    .body(Body::from(body))
    .unwrap()
}

/// The article a CSV row with only `text` resolves to.
fn csv_row_article(text: &str) -> NewArticle {
  NewArticle::new(ArticleContent {
    text:     text.into(),
    context:  ArticleContext::Csv { source: None, published_at: None },
    language: String::new(),
  })
}

// ─── Health ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn healthz_returns_ok() {
  let app = app().await;
  let (code, body) = app.get("/healthz").await;
  assert_eq!(code, StatusCode::OK);
  assert_eq!(body["status"], "ok");
}

// ─── Judging ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn judge_persists_and_rejudging_supersedes() {
  let app = app().await;
  let topic_id = app.topic("elections", "active").await;
  let judge_id = app.fixed_judge("always-relevant", "relevant").await;

  let (code, first) = app
    .judge_article(&topic_id, "always-relevant", "Turnout rose sharply.", json!({}))
    .await;
  assert_eq!(code, StatusCode::OK, "{first}");
  assert_eq!(first["label"], "relevant");
  assert_eq!(first["confidence"], 0.8);
  assert_eq!(first["rationale"], "fixed");
  assert_eq!(first["judge_id"], judge_id.as_str());
  assert!(first["assessment_id"].is_string());

  let (_, second) = app
    .judge_article(&topic_id, "always-relevant", "Turnout rose sharply.", json!({}))
    .await;
  assert_eq!(second["article_version_id"], first["article_version_id"]);
  assert_ne!(second["assessment_id"], first["assessment_id"]);

  let (code, page) = app.get(&format!("/v1/assessments?judge_id={judge_id}")).await;
  assert_eq!(code, StatusCode::OK);
  assert_eq!(page["total"], 2);

  let (_, latest) = app
    .get(&format!("/v1/assessments?judge_id={judge_id}&latest_only=true"))
    .await;
  assert_eq!(latest["total"], 1);
  assert_eq!(latest["items"][0]["version"], 2);
  assert_eq!(latest["items"][0]["supersedes_id"], first["assessment_id"]);
}

#[tokio::test]
async fn dry_run_persists_nothing() {
  let app = app().await;
  let topic_id = app.topic("elections", "active").await;
  app.fixed_judge("always-relevant", "relevant").await;

  let (code, body) = app
    .judge_article(&topic_id, "always-relevant", "Ballots.", json!({"persist_article": false}))
    .await;
  assert_eq!(code, StatusCode::OK, "{body}");
  assert!(body["assessment_id"].is_null());
  assert!(body["article_version_id"].is_null());
  assert_eq!(body["label"], "relevant");

  let (_, page) = app.get("/v1/assessments").await;
  assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn withheld_rationale_is_still_stored() {
  let app = app().await;
  let topic_id = app.topic("elections", "active").await;
  app.fixed_judge("always-relevant", "relevant").await;

  let (_, body) = app
    .judge_article(&topic_id, "always-relevant", "Ballots.", json!({"return_rationale": false}))
    .await;
  assert!(body["rationale"].is_null());

  let id = body["assessment_id"].as_str().unwrap();
  let (code, stored) = app.get(&format!("/v1/assessments/{id}")).await;
  assert_eq!(code, StatusCode::OK);
  assert_eq!(stored["rationale"], "fixed");
}

#[tokio::test]
async fn unknown_judge_is_404_with_error_body() {
  let app = app().await;
  let topic_id = app.topic("elections", "active").await;

  let (code, body) = app.judge_article(&topic_id, "nobody", "text", json!({})).await;
  assert_eq!(code, StatusCode::NOT_FOUND);
  assert_eq!(body["error"]["code"], "JUDGE_NOT_FOUND");
  assert!(body["error"]["message"].is_string());
  assert!(body["error"].get("details").is_some());
}

#[tokio::test]
async fn draft_topic_cannot_be_judged() {
  let app = app().await;
  let topic_id = app.topic("drafts", "draft").await;
  app.fixed_judge("always-relevant", "relevant").await;

  let (code, body) = app.judge_article(&topic_id, "always-relevant", "text", json!({})).await;
  assert_eq!(code, StatusCode::CONFLICT);
  assert_eq!(body["error"]["code"], "TOPIC_NOT_ACTIVE");

  let (code, _) = app
    .post(&format!("/v1/topics/{topic_id}/status"), json!({"status": "active"}))
    .await;
  assert_eq!(code, StatusCode::OK);
  let (code, _) = app.judge_article(&topic_id, "always-relevant", "text", json!({})).await;
  assert_eq!(code, StatusCode::OK);
}

#[tokio::test]
async fn inactive_judge_is_409() {
  let app = app().await;
  let topic_id = app.topic("elections", "active").await;
  let judge_id = app.fixed_judge("retired", "unsure").await;

  let (code, body) = app
    .post(&format!("/v1/judges/{judge_id}/status"), json!({"status": "inactive"}))
    .await;
  assert_eq!(code, StatusCode::OK);
  assert_eq!(body["status"], "inactive");

  let (code, body) = app.judge_article(&topic_id, "retired", "text", json!({})).await;
  assert_eq!(code, StatusCode::CONFLICT);
  assert_eq!(body["error"]["code"], "JUDGE_INACTIVE");
}

#[tokio::test]
async fn human_judges_are_not_invocable() {
  let app = app().await;
  let topic_id = app.topic("elections", "active").await;
  let (code, _) = app
    .post(
      "/v1/judges",
      json!({
        "display_name": "Alice",
        "profile": { "kind": "human", "user_id": "alice", "role": "annotator" },
      }),
    )
    .await;
  assert_eq!(code, StatusCode::CREATED);

  let (code, body) = app
    .post(
      "/v1/relevance/judge",
      json!({
        "topic_id": topic_id,
        "article": { "text": "text" },
        "judge": { "type": "human", "user_id": "alice" },
      }),
    )
    .await;
  assert_eq!(code, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn malformed_bodies_are_rejected() {
  let app = app().await;
  let req = Request::builder()
    .method("POST")
    .uri("/v1/relevance/judge")
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from("{not json"))
    .unwrap();
  let (code, body) = app.send(req).await;
  assert_eq!(code, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"]["code"], "BAD_REQUEST");

  let (code, body) = app.post("/v1/relevance/judge", json!({"topic_id": "x"})).await;
  assert_eq!(code, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn topic_upsert_reuses_identical_definitions() {
  let app = app().await;
  let topic_id = app.topic("energy", "active").await;

  let same = json!({"key": "energy", "name": "energy", "definition": "Articles   about energy."});
  let (code, body) = app.post("/v1/topics", same).await;
  assert_eq!(code, StatusCode::OK);
  assert_eq!(body["was_created"], false);

  let changed = json!({"key": "energy", "name": "energy", "definition": "Grid storage."});
  let (code, body) = app.post("/v1/topics", changed).await;
  assert_eq!(code, StatusCode::CREATED);

  let (_, detail) = app.get(&format!("/v1/topics/{topic_id}")).await;
  assert_eq!(detail["latest_version"]["version_id"], body["version"]["version_id"]);
  assert_eq!(detail["latest_version"]["definition"], "Grid storage.");
}

#[tokio::test]
async fn duplicate_judge_is_409_and_audited() {
  let app = app().await;
  let judge_id = app.fixed_judge("dup", "relevant").await;

  let (code, body) = app
    .post(
      "/v1/judges",
      json!({
        "display_name": "dup again",
        "profile": {
          "kind": "automated",
          "automation_type": "rule",
          "impl_key": "dup",
          "version": "1.0.0",
          "config": { "provider": "keyword" },
        },
      }),
    )
    .await;
  assert_eq!(code, StatusCode::CONFLICT);
  assert_eq!(body["error"]["code"], "DUPLICATE_JUDGE");

  let (code, trail) = app
    .get(&format!("/v1/audit?entity_type=judge&entity_id={judge_id}"))
    .await;
  assert_eq!(code, StatusCode::OK);
  assert!(!trail.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn missing_entities_are_404() {
  let app = app().await;
  let id = uuid::Uuid::new_v4();
  for (uri, code) in [
    (format!("/v1/topics/{id}"), "TOPIC_NOT_FOUND"),
    (format!("/v1/judges/{id}"), "JUDGE_NOT_FOUND"),
    (format!("/v1/datasets/{id}"), "DATASET_NOT_FOUND"),
    (format!("/v1/dataset-versions/{id}/entries"), "DATASET_VERSION_NOT_FOUND"),
    (format!("/v1/import/{id}"), "IMPORT_NOT_FOUND"),
    (format!("/v1/assessments/{id}"), "ASSESSMENT_NOT_FOUND"),
  ] {
    let (status, body) = app.get(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    assert_eq!(body["error"]["code"], code, "{uri}");
  }
}

// ─── Datasets ────────────────────────────────────────────────────────────────

async fn seed_january(store: &SqliteStore, n: u32) {
  for day in 1..=n {
    let published_at = Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).unwrap();
    let article = NewArticle::new(ArticleContent {
      text:     format!("Report {day} on the grid."),
      context:  ArticleContext::Csv { source: None, published_at: Some(published_at) },
      language: "en".into(),
    });
    store.upsert_article(article, Actor::system()).await.unwrap();
  }
}

fn january_slice() -> Value {
  json!({"type": "time_slice", "from": "2025-01-01T00:00:00Z", "to": "2025-02-01T00:00:00Z"})
}

#[tokio::test]
async fn dataset_create_read_and_freeze() {
  let app = app().await;
  seed_january(&app.store, 3).await;

  let (code, created) = app
    .post(
      "/v1/datasets",
      json!({"name": "january", "purpose": "corpus", "spec": january_slice()}),
    )
    .await;
  assert_eq!(code, StatusCode::CREATED, "{created}");
  assert_eq!(created["entry_count"], 3);
  assert_eq!(created["version_number"], 1);
  let dataset_id = created["dataset_id"].as_str().unwrap().to_owned();
  let version_id = created["dataset_version_id"].as_str().unwrap().to_owned();

  let (_, entries) = app.get(&format!("/v1/dataset-versions/{version_id}/entries")).await;
  assert_eq!(entries.as_array().unwrap().len(), 3);

  let (code, appended) = app
    .post(
      "/v1/datasets",
      json!({"dataset_id": dataset_id, "spec": {
        "type": "subset",
        "parent_dataset_version_id": version_id,
        "sample": {"method": "random", "size": 2, "seed": 7},
      }}),
    )
    .await;
  assert_eq!(code, StatusCode::CREATED, "{appended}");
  assert_eq!(appended["version_number"], 2);
  assert_eq!(appended["entry_count"], 2);

  let (code, frozen) = app.post(&format!("/v1/datasets/{dataset_id}/freeze"), json!({})).await;
  assert_eq!(code, StatusCode::OK);
  assert_eq!(frozen["status"], "frozen");
  assert_eq!(frozen["dataset_version_id"], appended["dataset_version_id"]);
  assert!(frozen["frozen_at"].is_string());

  let (_, again) = app.post(&format!("/v1/datasets/{dataset_id}/freeze"), json!({})).await;
  assert_eq!(again["frozen_at"], frozen["frozen_at"]);

  let (code, body) = app
    .post("/v1/datasets", json!({"dataset_id": dataset_id, "spec": january_slice()}))
    .await;
  assert_eq!(code, StatusCode::CONFLICT);
  assert_eq!(body["error"]["code"], "DATASET_NOT_ACTIVE");

  let (_, detail) = app.get(&format!("/v1/datasets/{dataset_id}")).await;
  assert_eq!(detail["name"], "january");
  assert_eq!(detail["versions"].as_array().unwrap().len(), 2);
}

/// 100 articles across Q1 2025, each judged by one fixed judge: the first 40
/// relevant, the rest not relevant. Returns the relevant article versions.
async fn seed_judged_quarter(app: &TestApp) -> Vec<Uuid> {
  let topic_id: Uuid = app.topic("grid", "active").await.parse().unwrap();
  let judge_id: Uuid = app.fixed_judge("curator", "relevant").await.parse().unwrap();
  let topic = app.store.get_topic(topic_id).await.unwrap().unwrap();
  let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

  let mut relevant = Vec::new();
  for i in 0..100 {
    let article = NewArticle::new(ArticleContent {
      text:     format!("Grid bulletin {i}."),
      context:  ArticleContext::Csv {
        source:       None,
        published_at: Some(start + TimeDelta::hours(20 * i)),
      },
      language: "en".into(),
    });
    let version = app.store.upsert_article(article, Actor::system()).await.unwrap().value;
    let label = if i < 40 { Label::Relevant } else { Label::NotRelevant };
    let key = AssessmentKey {
      judge_id,
      topic_version_id:   topic.latest_version_id,
      article_version_id: version.version_id,
    };
    app
      .store
      .record_assessment(NewAssessment::new(key, label), Actor::system())
      .await
      .unwrap();
    if label == Label::Relevant {
      relevant.push(version.version_id);
    }
  }
  relevant
}

#[tokio::test]
async fn quarter_slice_then_stratified_relevant_subset() {
  let app = app().await;
  let relevant = seed_judged_quarter(&app).await;

  let slice = json!({
    "type": "time_slice",
    "from": "2025-01-01T00:00:00Z",
    "to": "2025-04-01T00:00:00Z",
  });
  let (code, base) = app
    .post("/v1/datasets", json!({"name": "q1", "purpose": "evaluation", "spec": slice}))
    .await;
  assert_eq!(code, StatusCode::CREATED, "{base}");
  assert_eq!(base["entry_count"], 100);

  let (code, derived) = app
    .post(
      "/v1/datasets",
      json!({"dataset_id": base["dataset_id"], "spec": {
        "type": "subset",
        "parent_dataset_version_id": base["dataset_version_id"],
        "filters": {"labels": ["relevant"]},
        "sample": {"method": "stratified", "size": 10, "seed": 42},
      }}),
    )
    .await;
  assert_eq!(code, StatusCode::CREATED, "{derived}");
  assert_eq!(derived["entry_count"], 10);

  let version_id = derived["dataset_version_id"].as_str().unwrap();
  let (_, entries) = app.get(&format!("/v1/dataset-versions/{version_id}/entries")).await;
  let entries = entries.as_array().unwrap();
  assert_eq!(entries.len(), 10);
  for entry in entries {
    let id: Uuid = entry["article_version_id"].as_str().unwrap().parse().unwrap();
    assert!(relevant.contains(&id));
  }
}

#[tokio::test]
async fn dataset_status_route_enforces_transitions() {
  let app = app().await;
  seed_january(&app.store, 2).await;
  let (_, created) = app
    .post("/v1/datasets", json!({"name": "jan", "purpose": "corpus", "spec": january_slice()}))
    .await;
  let dataset_id = created["dataset_id"].as_str().unwrap().to_owned();

  let (code, frozen) = app.post(&format!("/v1/datasets/{dataset_id}/freeze"), json!({})).await;
  assert_eq!(code, StatusCode::OK);
  assert_eq!(frozen["status"], "frozen");

  let (code, reopened) = app
    .post(&format!("/v1/datasets/{dataset_id}/status"), json!({"status": "active"}))
    .await;
  assert_eq!(code, StatusCode::OK, "{reopened}");
  assert_eq!(reopened["status"], "active");

  let (code, refrozen) = app.post(&format!("/v1/datasets/{dataset_id}/freeze"), json!({})).await;
  assert_eq!(code, StatusCode::OK);
  assert_eq!(refrozen["status"], "frozen");
  assert_eq!(refrozen["frozen_at"], frozen["frozen_at"]);

  let (code, _) = app
    .post(&format!("/v1/datasets/{dataset_id}/status"), json!({"status": "archived"}))
    .await;
  assert_eq!(code, StatusCode::OK);
  let (code, body) = app
    .post(&format!("/v1/datasets/{dataset_id}/status"), json!({"status": "active"}))
    .await;
  assert_eq!(code, StatusCode::CONFLICT);
  assert_eq!(body["error"]["code"], "INVALID_STATE_TRANSITION");

  let (_, trail) = app
    .get(&format!("/v1/audit?entity_type=dataset&entity_id={dataset_id}"))
    .await;
  let actions: Vec<&str> = trail
    .as_array()
    .unwrap()
    .iter()
    .map(|e| e["action"].as_str().unwrap())
    .collect();
  assert_eq!(actions[0], "created");
  assert_eq!(actions[1..], ["status_changed"; 4]);
}

#[tokio::test]
async fn new_dataset_requires_name_and_purpose() {
  let app = app().await;
  let (code, body) = app.post("/v1/datasets", json!({"spec": january_slice()})).await;
  assert_eq!(code, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn empty_time_slice_is_invalid_spec() {
  let app = app().await;
  let spec = json!({
    "type": "time_slice",
    "from": "2025-02-01T00:00:00Z",
    "to": "2025-01-01T00:00:00Z",
  });
  let (code, body) = app
    .post("/v1/datasets", json!({"name": "backwards", "purpose": "analysis", "spec": spec}))
    .await;
  assert_eq!(code, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["error"]["code"], "INVALID_SPEC");
}

// ─── Ingestion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn csv_with_bad_label_fails_entirely() {
  let app = app().await;
  let topic_id = app.topic("elections", "active").await;
  let judge_id = app.fixed_judge("csv-source", "relevant").await;

  let csv = "text,label\nFirst row,relevant\nSecond row,maybe\nThird row,unsure\n";
  let (code, job) = app
    .send(multipart(&[
      ("file", csv),
      ("topic_id", topic_id.as_str()),
      ("judge_id", judge_id.as_str()),
    ]))
    .await;
  assert_eq!(code, StatusCode::ACCEPTED, "{job}");
  assert_eq!(job["status"], "processing");
  assert_eq!(job["total_rows"], 3);
  assert_eq!(job["processed_rows"], 0);
  assert_eq!(job["errors"], json!([]));

  let done = app.wait_for_import(job["import_id"].as_str().unwrap()).await;
  assert_eq!(done["status"], "failed");
  assert_eq!(done["processed_rows"], 0);
  assert_eq!(done["errors"], json!([{"row": 2, "error": "Invalid label value: 'maybe'"}]));

  let (_, page) = app.get("/v1/assessments").await;
  assert_eq!(page["total"], 0);
  for text in ["First row", "Second row", "Third row"] {
    let article = csv_row_article(text);
    let found = app
      .store
      .find_article(article.source_type(), article.resolved_key().unwrap())
      .await
      .unwrap();
    assert!(found.is_none(), "{text} was persisted");
  }
}

#[tokio::test]
async fn csv_apply_failure_names_the_row() {
  let app = app().await;
  let topic_id = app.topic("elections", "active").await;
  let judge_id = app.fixed_judge("csv-source", "relevant").await;
  let upload = |csv: &'static str| {
    multipart(&[("file", csv), ("topic_id", topic_id.as_str()), ("judge_id", judge_id.as_str())])
  };

  let (_, job) = app.send(upload("text,label
k1,relevant
")).await;
  let done = app.wait_for_import(job["import_id"].as_str().unwrap()).await;
  assert_eq!(done["status"], "completed", "{done}");
  let k1 = csv_row_article("k1");
  let article = app
    .store
    .find_article(k1.source_type(), k1.resolved_key().unwrap())
    .await
    .unwrap()
    .unwrap();
  app
    .store
    .set_article_status(article.article_id, ArticleStatus::Deleted, Actor::system())
    .await
    .unwrap();

  let (_, job) = app.send(upload("text,label
k2,relevant
k1,relevant
k3,relevant
")).await;
  let failed = app.wait_for_import(job["import_id"].as_str().unwrap()).await;
  assert_eq!(failed["status"], "failed", "{failed}");
  assert_eq!(failed["processed_rows"], 0);
  assert_eq!(
    failed["errors"],
    json!([{"row": 2, "error": format!("article {} is deleted", article.article_id)}])
  );

  let (_, page) = app.get("/v1/assessments").await;
  assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn csv_import_applies_once() {
  let app = app().await;
  let topic_id = app.topic("elections", "active").await;
  let judge_id = app.fixed_judge("csv-source", "relevant").await;

  let csv = "body,verdict,score\nTurnout rose,Relevant,0.9\nRecipe,not_relevant,\n";
  let mapping = r#"{"text": "body", "label": "verdict", "confidence": "score"}"#;
  let fields = [
    ("file", csv),
    ("mapping", mapping),
    ("topic_id", topic_id.as_str()),
    ("judge_id", judge_id.as_str()),
  ];

  let (_, job) = app.send(multipart(&fields)).await;
  let done = app.wait_for_import(job["import_id"].as_str().unwrap()).await;
  assert_eq!(done["status"], "completed", "{done}");
  assert_eq!(done["processed_rows"], 2);

  let (_, job) = app.send(multipart(&fields)).await;
  let again = app.wait_for_import(job["import_id"].as_str().unwrap()).await;
  assert_eq!(again["status"], "duplicate");

  let (_, page) = app.get(&format!("/v1/assessments?judge_id={judge_id}")).await;
  assert_eq!(page["total"], 2);
  let (_, relevant) = app.get("/v1/assessments?label=relevant").await;
  assert_eq!(relevant["total"], 1);
}

#[tokio::test]
async fn csv_missing_column_is_rejected_up_front() {
  let app = app().await;
  let topic_id = app.topic("elections", "active").await;
  let judge_id = app.fixed_judge("csv-source", "relevant").await;

  let (code, body) = app
    .send(multipart(&[
      ("file", "headline,label\nx,relevant\n"),
      ("topic_id", topic_id.as_str()),
      ("judge_id", judge_id.as_str()),
    ]))
    .await;
  assert_eq!(code, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

  let (code, _) = app
    .send(multipart(&[("file", "text,label\n"), ("topic_id", topic_id.as_str())]))
    .await;
  assert_eq!(code, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn webhook_redelivery_is_duplicate() {
  let app = app().await;
  let topic_id = app.topic("elections", "active").await;
  let judge_id = app.fixed_judge("external", "relevant").await;

  let event = json!({
    "event_id": "evt-1",
    "topic_id": topic_id,
    "judge_id": judge_id,
    "article": {
      "text": "Polls closed early.",
      "context": { "source_type": "news", "url": "https://example.org/a" },
    },
    "label": "relevant",
    "confidence": 0.7,
  });
  let (code, body) = app.post("/v1/webhooks/assessments", event.clone()).await;
  assert_eq!(code, StatusCode::ACCEPTED);
  assert_eq!(body["status"], "accepted");
  assert!(body["assessment_id"].is_string());

  let (code, body) = app.post("/v1/webhooks/assessments", event).await;
  assert_eq!(code, StatusCode::OK);
  assert_eq!(body["status"], "duplicate");

  let (_, page) = app.get("/v1/assessments").await;
  assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn webhook_without_event_id_is_rejected() {
  let app = app().await;
  let topic_id = app.topic("elections", "active").await;
  let judge_id = app.fixed_judge("external", "relevant").await;

  for (event_id, url) in [("", "https://example.org/a"), ("  ", "https://example.org/b")] {
    let event = json!({
      "event_id": event_id,
      "topic_id": topic_id,
      "judge_id": judge_id,
      "article": {
        "text": format!("Story at {url}"),
        "context": { "source_type": "news", "url": url },
      },
      "label": "relevant",
    });
    let (code, body) = app.post("/v1/webhooks/assessments", event).await;
    assert_eq!(code, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
  }

  let (_, page) = app.get("/v1/assessments").await;
  assert_eq!(page["total"], 0);
}
