//! Articles (logical identities for source texts) and their immutable
//! versions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::{
  Error, Result,
  content::{ContentHash, ContentHasher, normalize_language, normalize_text, to_canonical_json},
};

const ARTICLE_HASH_DOMAIN: &str = "verity.article.v1";

// ─── Source context ──────────────────────────────────────────────────────────

/// Discriminant of [`ArticleContext`]; stored alongside the article identity.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceType {
  News,
  Social,
  Csv,
  Manual,
}

/// Source-specific metadata attached to an article version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source_type", rename_all = "snake_case")]
pub enum ArticleContext {
  News {
    url:          String,
    #[serde(default)]
    outlet:       Option<String>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
  },
  Social {
    platform:     String,
    post_id:      String,
    #[serde(default)]
    author:       Option<String>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
  },
  /// A row of a CSV batch import.
  Csv {
    #[serde(default)]
    source:       Option<String>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
  },
  Manual {
    #[serde(default)]
    note: Option<String>,
  },
}

impl Default for ArticleContext {
  fn default() -> Self { Self::Manual { note: None } }
}

impl ArticleContext {
  pub fn source_type(&self) -> SourceType {
    match self {
      Self::News { .. } => SourceType::News,
      Self::Social { .. } => SourceType::Social,
      Self::Csv { .. } => SourceType::Csv,
      Self::Manual { .. } => SourceType::Manual,
    }
  }

  /// The source's own identifier for the article, if it has one.
  pub fn natural_key(&self) -> Option<String> {
    match self {
      Self::News { url, .. } => Some(url.trim().to_owned()),
      Self::Social { platform, post_id, .. } => {
        Some(format!("{}:{}", platform.trim(), post_id.trim()))
      }
      Self::Csv { .. } | Self::Manual { .. } => None,
    }
  }

  pub fn published_at(&self) -> Option<DateTime<Utc>> {
    match self {
      Self::News { published_at, .. }
      | Self::Social { published_at, .. }
      | Self::Csv { published_at, .. } => *published_at,
      Self::Manual { .. } => None,
    }
  }
}

// ─── Content ─────────────────────────────────────────────────────────────────

/// The hashed content of an article version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleContent {
  pub text:     String,
  #[serde(default)]
  pub context:  ArticleContext,
  #[serde(default)]
  pub language: String,
}

impl ArticleContent {
  /// Reject content that cannot form a version.
  pub fn validate(&self) -> Result<()> {
    if normalize_text(&self.text).is_empty() {
      return Err(Error::Validation("article text is empty".into()));
    }
    if let ArticleContext::News { url, .. } = &self.context
      && url.trim().is_empty()
    {
      return Err(Error::Validation("news context requires a url".into()));
    }
    Ok(())
  }

  /// SHA-256 over normalized text, normalized language and canonical context.
  pub fn content_hash(&self) -> Result<ContentHash> {
    Ok(
      ContentHasher::new(ARTICLE_HASH_DOMAIN)
        .field(normalize_text(&self.text))
        .field(normalize_language(&self.language))
        .field(to_canonical_json(&self.context)?)
        .finish(),
    )
  }

  /// When the article was observed in the world: the source's publication time
  /// if known, else `fallback` (the version's creation time).
  pub fn observed_at(&self, fallback: DateTime<Utc>) -> DateTime<Utc> {
    self.context.published_at().unwrap_or(fallback)
  }
}

/// Input to [`RelevanceStore::upsert_article`](crate::store::RelevanceStore::upsert_article).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArticle {
  /// Explicit external key. When absent, the context's natural key is used,
  /// then the content hash.
  #[serde(default)]
  pub external_key: Option<String>,
  #[serde(flatten)]
  pub content:      ArticleContent,
}

impl NewArticle {
  pub fn new(content: ArticleContent) -> Self { Self { external_key: None, content } }

  pub fn source_type(&self) -> SourceType { self.content.context.source_type() }

  /// The `(source_type, external_key)` identity this article resolves to.
  pub fn resolved_key(&self) -> Result<String> {
    let explicit = self
      .external_key
      .as_deref()
      .map(str::trim)
      .filter(|k| !k.is_empty())
      .map(str::to_owned);
    match explicit.or_else(|| self.content.context.natural_key()) {
      Some(key) => Ok(key),
      None => Ok(self.content.content_hash()?.to_hex()),
    }
  }
}

// ─── Identity & versions ─────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArticleStatus {
  #[default]
  Active,
  Deleted,
}

/// Logical identity of a source text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
  pub article_id:        Uuid,
  pub source_type:       SourceType,
  pub external_key:      String,
  pub latest_version_id: Uuid,
  pub status:            ArticleStatus,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
}

/// An immutable snapshot of an article's content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleVersion {
  pub version_id:   Uuid,
  pub article_id:   Uuid,
  pub text:         String,
  pub context:      ArticleContext,
  pub language:     String,
  pub content_hash: ContentHash,
  pub observed_at:  DateTime<Utc>,
  pub created_at:   DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn content(text: &str, context: ArticleContext) -> ArticleContent {
    ArticleContent { text: text.into(), context, language: "en".into() }
  }

  #[test]
  fn context_round_trips_with_source_type_tag() {
    let ctx = ArticleContext::Social {
      platform:     "mastodon".into(),
      post_id:      "42".into(),
      author:       None,
      published_at: None,
    };
    let json = serde_json::to_value(&ctx).unwrap();
    assert_eq!(json["source_type"], "social");
    let back: ArticleContext = serde_json::from_value(json).unwrap();
    assert_eq!(back, ctx);
  }

  #[test]
  fn unknown_source_type_is_rejected_at_the_boundary() {
    let raw = serde_json::json!({"source_type": "fax", "number": "1"});
    assert!(serde_json::from_value::<ArticleContext>(raw).is_err());
  }

  #[test]
  fn resolved_key_prefers_explicit_then_natural_then_hash() {
    let ctx = ArticleContext::News {
      url:          "https://example.org/a".into(),
      outlet:       None,
      published_at: None,
    };
    let mut article = NewArticle::new(content("Body", ctx));
    assert_eq!(article.resolved_key().unwrap(), "https://example.org/a");

    article.external_key = Some("  custom-1 ".into());
    assert_eq!(article.resolved_key().unwrap(), "custom-1");

    let manual = NewArticle::new(content("Body", ArticleContext::default()));
    let key = manual.resolved_key().unwrap();
    assert_eq!(key, manual.content.content_hash().unwrap().to_hex());
  }

  #[test]
  fn hash_ignores_whitespace_but_not_language_or_context() {
    let a = content("Some  text", ArticleContext::default());
    let b = content(" Some text\n", ArticleContext::default());
    assert_eq!(a.content_hash().unwrap(), b.content_hash().unwrap());

    let mut c = a.clone();
    c.language = "de".into();
    assert_ne!(a.content_hash().unwrap(), c.content_hash().unwrap());

    let d = content("Some text", ArticleContext::Manual { note: Some("x".into()) });
    assert_ne!(a.content_hash().unwrap(), d.content_hash().unwrap());
  }

  #[test]
  fn observed_at_prefers_publication_time() {
    let published = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let fallback = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let c = content("x", ArticleContext::Csv { source: None, published_at: Some(published) });
    assert_eq!(c.observed_at(fallback), published);
    let m = content("x", ArticleContext::default());
    assert_eq!(m.observed_at(fallback), fallback);
  }

  #[test]
  fn empty_text_fails_validation() {
    assert!(content("  \n ", ArticleContext::default()).validate().is_err());
  }
}
