//! Factory from judge configuration to executable engine, plus a per-judge
//! cache.

use std::{
  collections::HashMap,
  sync::{Arc, PoisonError, RwLock},
  time::Duration,
};

use tracing::{debug, warn};
use uuid::Uuid;
use verity_core::judge::{ExecutionConfig, Judge, JudgeProfile};

use crate::{
  Error, Evaluate, Request, Result, Verdict, fixed::FixedJudge, keyword::KeywordJudge,
  ollama::OllamaJudge,
};

/// One executable automated judge.
#[derive(Debug, Clone)]
pub enum JudgeEngine {
  Keyword(KeywordJudge),
  Fixed(FixedJudge),
  Ollama(OllamaJudge),
}

impl JudgeEngine {
  pub fn from_config(config: &ExecutionConfig, client: &reqwest::Client) -> Result<Self> {
    config.validate()?;
    Ok(match config {
      ExecutionConfig::Keyword { keywords, high_match_threshold, high_density_threshold } => {
        Self::Keyword(KeywordJudge::new(
          keywords,
          *high_match_threshold,
          *high_density_threshold,
        )?)
      }
      ExecutionConfig::Fixed { label, confidence, rationale } => Self::Fixed(FixedJudge::new(
        Verdict { label: *label, confidence: *confidence, rationale: rationale.clone() },
      )),
      ExecutionConfig::Ollama { base_url, model, timeout_secs, prompt_template } => {
        Self::Ollama(OllamaJudge::new(
          client.clone(),
          base_url,
          model,
          Duration::from_secs(*timeout_secs),
          prompt_template.as_deref(),
        ))
      }
    })
  }

  /// Evaluate `request`, bounded by `timeout`. The verdict is validated before
  /// it is returned.
  pub async fn invoke(&self, request: Request<'_>, timeout: Duration) -> Result<Verdict> {
    match tokio::time::timeout(timeout, self.evaluate(request)).await {
      Ok(verdict) => verdict?.validate(),
      Err(_) => Err(Error::Timeout(timeout.as_millis() as u64)),
    }
  }
}

impl Evaluate for JudgeEngine {
  async fn evaluate<'a>(&'a self, request: Request<'a>) -> Result<Verdict> {
    match self {
      Self::Keyword(j) => j.evaluate(request).await,
      Self::Fixed(j) => j.evaluate(request).await,
      Self::Ollama(j) => j.evaluate(request).await,
    }
  }
}

// ─── Cache ───────────────────────────────────────────────────────────────────

/// Engines keyed by judge id. A registered judge's profile never changes, so
/// an entry stays valid for the judge's lifetime.
#[derive(Debug, Default)]
pub struct Engines {
  client: reqwest::Client,
  cache:  RwLock<HashMap<Uuid, Arc<JudgeEngine>>>,
}

impl Engines {
  pub fn new(client: reqwest::Client) -> Self { Self { client, cache: RwLock::default() } }

  pub fn engine_for(&self, judge: &Judge) -> Result<Arc<JudgeEngine>> {
    let cached = self
      .cache
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(&judge.judge_id)
      .cloned();
    if let Some(engine) = cached {
      return Ok(engine);
    }

    let JudgeProfile::Automated { config, impl_key, version, .. } = &judge.profile else {
      return Err(Error::NotInvocable(judge.judge_id));
    };
    debug!(
      judge_id = %judge.judge_id,
      %impl_key,
      %version,
      provider = config.provider(),
      "building judge engine"
    );
    let engine = Arc::new(JudgeEngine::from_config(config, &self.client)?);
    self
      .cache
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(judge.judge_id, engine.clone());
    Ok(engine)
  }

  /// Resolve the judge's engine and evaluate `request` within `timeout`.
  pub async fn invoke(
    &self,
    judge: &Judge,
    request: Request<'_>,
    timeout: Duration,
  ) -> Result<Verdict> {
    let engine = self.engine_for(judge)?;
    let result = engine.invoke(request, timeout).await;
    if let Err(error) = &result {
      warn!(judge_id = %judge.judge_id, %error, "judge invocation failed");
    }
    result
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use serde_json::json;
  use verity_core::{
    article::ArticleContext,
    assessment::Label,
    judge::{AutomationType, HumanRole, JudgeStatus},
  };

  use super::*;

  fn judge(profile: JudgeProfile) -> Judge {
    Judge {
      judge_id:     Uuid::new_v4(),
      display_name: "test".into(),
      status:       JudgeStatus::Active,
      metadata:     json!({}),
      profile,
      created_at:   Utc::now(),
    }
  }

  fn automated(config: ExecutionConfig) -> Judge {
    judge(JudgeProfile::Automated {
      automation_type: AutomationType::Rule,
      impl_key:        config.provider().into(),
      version:         "1.0.0".into(),
      config,
    })
  }

  fn request(context: &ArticleContext) -> Request<'_> {
    Request { topic_definition: "Elections", text: "The election campaign", context }
  }

  #[tokio::test]
  async fn fixed_judge_returns_configured_verdict() {
    let engines = Engines::default();
    let j = automated(ExecutionConfig::Fixed {
      label:      Label::Unsure,
      confidence: Some(0.5),
      rationale:  Some("smoke".into()),
    });
    let context = ArticleContext::default();
    let v = engines.invoke(&j, request(&context), Duration::from_secs(1)).await.unwrap();
    assert_eq!(v.label, Label::Unsure);
    assert_eq!(v.rationale.as_deref(), Some("smoke"));
  }

  #[tokio::test]
  async fn keyword_engine_is_cached() {
    let engines = Engines::default();
    let j = automated(ExecutionConfig::Keyword {
      keywords:               Vec::new(),
      high_match_threshold:   None,
      high_density_threshold: None,
    });
    let first = engines.engine_for(&j).unwrap();
    let second = engines.engine_for(&j).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let context = ArticleContext::default();
    let v = engines.invoke(&j, request(&context), Duration::from_secs(1)).await.unwrap();
    assert_eq!(v.label, Label::Relevant);
  }

  #[test]
  fn human_judges_cannot_be_invoked() {
    let engines = Engines::default();
    let j = judge(JudgeProfile::Human { user_id: "alice".into(), role: HumanRole::Reviewer });
    assert!(matches!(engines.engine_for(&j), Err(Error::NotInvocable(_))));
  }

  #[test]
  fn invalid_config_is_rejected() {
    let config = ExecutionConfig::Fixed {
      label:      Label::Relevant,
      confidence: Some(2.0),
      rationale:  None,
    };
    let err = JudgeEngine::from_config(&config, &reqwest::Client::new()).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
  }
}
