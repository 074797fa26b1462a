//! Keyword-density heuristic.

use regex::{Regex, RegexBuilder};
use verity_core::assessment::Label;

use crate::{Evaluate, Request, Result, Verdict};

/// Vocabulary used when a judge configures no keywords of its own.
pub const DEFAULT_KEYWORDS: &[&str] = &[
  "politics", "political", "government", "election", "voting", "democracy", "policy",
  "politician", "parliament", "congress", "senate", "minister", "campaign", "candidate",
  "ballot", "referendum", "party", "coalition", "legislation", "law", "regulation", "public",
  "citizen", "civic", "administration", "authority", "official", "state", "federal", "local",
  "disinformation", "misinformation", "fake news", "propaganda", "bias", "conspiracy", "rumor",
  "false", "misleading", "fact-check", "verify", "social media", "facebook", "twitter",
  "instagram", "tiktok", "youtube", "news", "media", "journalism", "reporter", "broadcast",
  "press",
];

pub const DEFAULT_HIGH_MATCH_THRESHOLD: usize = 3;
pub const DEFAULT_HIGH_DENSITY_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct KeywordJudge {
  pattern:                Regex,
  high_match_threshold:   usize,
  high_density_threshold: f64,
}

impl KeywordJudge {
  pub fn new(
    keywords: &[String],
    high_match_threshold: Option<usize>,
    high_density_threshold: Option<f64>,
  ) -> Result<Self> {
    let mut vocabulary: Vec<String> = if keywords.iter().all(|k| k.trim().is_empty()) {
      DEFAULT_KEYWORDS.iter().map(|k| (*k).to_owned()).collect()
    } else {
      keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
    };
    // Longest first, so "fake news" wins over "news".
    vocabulary.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    vocabulary.dedup();

    let alternation = vocabulary
      .iter()
      .map(|k| regex::escape(k))
      .collect::<Vec<_>>()
      .join("|");
    let pattern = RegexBuilder::new(&format!(r"\b(?:{alternation})\b"))
      .case_insensitive(true)
      .build()?;

    Ok(Self {
      pattern,
      high_match_threshold: high_match_threshold.unwrap_or(DEFAULT_HIGH_MATCH_THRESHOLD),
      high_density_threshold: high_density_threshold.unwrap_or(DEFAULT_HIGH_DENSITY_THRESHOLD),
    })
  }

  pub fn with_defaults() -> Result<Self> { Self::new(&[], None, None) }

  pub fn classify(&self, text: &str) -> Verdict {
    if text.is_empty() {
      return Verdict::new(Label::NotRelevant, 0.1).with_rationale("no text to analyze");
    }

    // Whitespace-only text is not empty: it lands here with zero matches.
    let matches = self.pattern.find_iter(text).count();
    if matches == 0 {
      return Verdict::new(Label::NotRelevant, 0.2).with_rationale("no keyword matches");
    }

    let words = text.split_whitespace().count();
    let density = matches as f64 / words as f64;
    let confidence = if matches >= self.high_match_threshold
      || density >= self.high_density_threshold
    {
      (0.6 + density * 2.0).min(0.9)
    } else {
      (0.4 + density * 3.0).min(0.8)
    };
    Verdict::new(Label::Relevant, confidence)
      .with_rationale(format!("{matches} keyword matches in {words} words"))
  }
}

impl Evaluate for KeywordJudge {
  async fn evaluate<'a>(&'a self, request: Request<'a>) -> Result<Verdict> {
    Ok(self.classify(request.text))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn judge() -> KeywordJudge { KeywordJudge::with_defaults().unwrap() }

  #[test]
  fn empty_text_is_not_relevant() {
    let v = judge().classify("");
    assert_eq!(v.label, Label::NotRelevant);
    assert_eq!(v.confidence, Some(0.1));
  }

  #[test]
  fn whitespace_only_text_counts_as_no_matches() {
    let v = judge().classify(" \t\n ");
    assert_eq!(v.label, Label::NotRelevant);
    assert_eq!(v.confidence, Some(0.2));
  }

  #[test]
  fn no_matches_is_not_relevant() {
    let v = judge().classify("The recipe needs two cups of flour");
    assert_eq!(v.label, Label::NotRelevant);
    assert_eq!(v.confidence, Some(0.2));
  }

  #[test]
  fn many_matches_give_high_confidence() {
    // 3 matches in 8 words: density 0.375, capped at 0.9.
    let v = judge().classify("Election officials fight misinformation about the ballot count");
    assert_eq!(v.label, Label::Relevant);
    assert_eq!(v.confidence, Some(0.9));
  }

  #[test]
  fn sparse_match_gives_medium_confidence() {
    // 1 match in 20 words: density 0.05, below both thresholds.
    let text = "one two three four five six seven eight nine ten \
                eleven twelve thirteen fourteen fifteen sixteen seventeen eighteen nineteen election";
    let v = judge().classify(text);
    assert_eq!(v.label, Label::Relevant);
    let confidence = v.confidence.unwrap();
    assert!((confidence - 0.55).abs() < 1e-9);
  }

  #[test]
  fn matches_whole_words_only() {
    let v = judge().classify("Lawn care and statement pieces");
    assert_eq!(v.label, Label::NotRelevant);
  }

  #[test]
  fn topic_keywords_replace_default_vocabulary() {
    let j = KeywordJudge::new(&["solar".into(), "grid".into()], None, None).unwrap();
    assert_eq!(j.classify("Solar and grid news").label, Label::Relevant);
    assert_eq!(j.classify("Election results").label, Label::NotRelevant);
  }
}
