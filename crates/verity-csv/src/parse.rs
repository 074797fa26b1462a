//! Header resolution and per-row validation.
//!
//! Pipeline:
//!   raw bytes
//!     └─ csv::Reader            → header + records
//!          └─ Columns::resolve() → column indices
//!               └─ parse_row()   → ImportRow | RowError

use chrono::{DateTime, NaiveDate, Utc};
use csv::StringRecord;
use verity_core::{
  article::{ArticleContent, ArticleContext, NewArticle},
  assessment::Label,
  import::{ImportRow, RowError},
};

use crate::{
  ColumnMapping, Parsed,
  error::{Error, Result},
};

// ─── Columns ─────────────────────────────────────────────────────────────────

/// Positions of the mapped columns in the header row.
struct Columns {
  text:         usize,
  label:        usize,
  external_key: Option<usize>,
  source:       Option<usize>,
  language:     Option<usize>,
  confidence:   Option<usize>,
  rationale:    Option<usize>,
  published_at: Option<usize>,
}

impl Columns {
  fn resolve(header: &StringRecord, mapping: &ColumnMapping) -> Result<Self> {
    let find = |name: &str| header.iter().position(|h| h.trim() == name.trim());
    let required = |field: &'static str, name: &str| {
      find(name).ok_or_else(|| Error::MissingColumn { field, column: name.to_owned() })
    };
    Ok(Self {
      text:         required("text", &mapping.text)?,
      label:        required("label", &mapping.label)?,
      external_key: find(&mapping.external_key),
      source:       find(&mapping.source),
      language:     find(&mapping.language),
      confidence:   find(&mapping.confidence),
      rationale:    find(&mapping.rationale),
      published_at: find(&mapping.published_at),
    })
  }
}

/// A trimmed, non-empty cell. Empty cells are absent values.
fn cell(record: &StringRecord, column: Option<usize>) -> Option<&str> {
  column
    .and_then(|i| record.get(i))
    .map(str::trim)
    .filter(|v| !v.is_empty())
}

// ─── Field parsers ───────────────────────────────────────────────────────────

fn parse_confidence(raw: &str) -> Result<f64, String> {
  raw
    .parse::<f64>()
    .ok()
    .filter(|c| (0.0..=1.0).contains(c))
    .ok_or_else(|| format!("Invalid confidence value: '{raw}'"))
}

/// RFC 3339 timestamps, or bare `YYYY-MM-DD` dates at midnight UTC.
fn parse_published_at(raw: &str) -> Result<DateTime<Utc>, String> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Ok(dt.with_timezone(&Utc));
  }
  NaiveDate::parse_from_str(raw, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .map(|dt| dt.and_utc())
    .ok_or_else(|| format!("Invalid published_at value: '{raw}'"))
}

fn parse_row(record: &StringRecord, columns: &Columns) -> Result<ImportRow, String> {
  let text = cell(record, Some(columns.text)).ok_or("Missing text")?;

  let raw_label = record.get(columns.label).unwrap_or_default();
  let label = Label::parse(raw_label).map_err(|e| e.to_string())?;

  let confidence = cell(record, columns.confidence).map(parse_confidence).transpose()?;
  let published_at = cell(record, columns.published_at)
    .map(parse_published_at)
    .transpose()?;

  let content = ArticleContent {
    text:     text.to_owned(),
    context:  ArticleContext::Csv {
      source: cell(record, columns.source).map(str::to_owned),
      published_at,
    },
    language: cell(record, columns.language).unwrap_or_default().to_owned(),
  };

  Ok(ImportRow {
    article: NewArticle {
      external_key: cell(record, columns.external_key).map(str::to_owned),
      content,
    },
    label,
    confidence,
    rationale: cell(record, columns.rationale).map(str::to_owned),
  })
}

// ─── File ────────────────────────────────────────────────────────────────────

pub(crate) fn parse_file(input: &[u8], mapping: &ColumnMapping) -> Result<Parsed> {
  let mut reader = csv::ReaderBuilder::new()
    .has_headers(true)
    .flexible(true)
    .from_reader(input);

  let header = reader.headers()?.clone();
  if header.iter().all(|h| h.trim().is_empty()) {
    return Err(Error::MissingHeader);
  }
  let columns = Columns::resolve(&header, mapping)?;

  let mut parsed = Parsed { total_rows: 0, rows: Vec::new(), errors: Vec::new() };
  for (index, record) in reader.records().enumerate() {
    let row = index + 1;
    parsed.total_rows = row;
    let result = match record {
      Ok(record) => parse_row(&record, &columns),
      Err(e) => Err(format!("Malformed row: {e}")),
    };
    match result {
      Ok(import_row) => parsed.rows.push(import_row),
      Err(error) => parsed.errors.push(RowError { row, error }),
    }
  }
  Ok(parsed)
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn default_mapping() -> ColumnMapping { ColumnMapping::default() }

  #[test]
  fn parses_rows_with_defaults() {
    let input = b"text,label,confidence,source\n\
                  Solar output rose,relevant,0.9,wire\n\
                  Football results,NOT_RELEVANT,,\n";
    let parsed = parse_file(input, &default_mapping()).unwrap();
    assert!(parsed.is_valid());
    assert_eq!(parsed.total_rows, 2);

    let first = &parsed.rows[0];
    assert_eq!(first.label, Label::Relevant);
    assert_eq!(first.confidence, Some(0.9));
    assert_eq!(
      first.article.content.context,
      ArticleContext::Csv { source: Some("wire".into()), published_at: None }
    );
    assert_eq!(first.article.content.language, "");

    let second = &parsed.rows[1];
    assert_eq!(second.label, Label::NotRelevant);
    assert_eq!(second.confidence, None);
  }

  #[test]
  fn invalid_label_is_reported_with_row_number() {
    let input = b"text,label\na,relevant\nb,maybe\nc,unsure\n";
    let parsed = parse_file(input, &default_mapping()).unwrap();
    assert_eq!(parsed.total_rows, 3);
    assert_eq!(parsed.rows.len(), 2);
    assert_eq!(
      parsed.errors,
      vec![RowError { row: 2, error: "Invalid label value: 'maybe'".into() }]
    );
  }

  #[test]
  fn bad_confidence_and_missing_text() {
    let input = b"text,label,confidence\n,relevant,\nok,relevant,1.5\nok,relevant,high\n";
    let parsed = parse_file(input, &default_mapping()).unwrap();
    let messages: Vec<&str> = parsed.errors.iter().map(|e| e.error.as_str()).collect();
    assert_eq!(
      messages,
      vec![
        "Missing text",
        "Invalid confidence value: '1.5'",
        "Invalid confidence value: 'high'",
      ]
    );
    assert!(parsed.rows.is_empty());
  }

  #[test]
  fn custom_mapping_and_dates() {
    let input = b"body,verdict,when,key\n\
                  Grid storage,Relevant,2025-02-03,row-1\n\
                  Heat pumps,unsure,2025-02-04T10:00:00Z,\n";
    let mapping = ColumnMapping {
      text:         "body".into(),
      label:        "verdict".into(),
      published_at: "when".into(),
      external_key: "key".into(),
      ..Default::default()
    };
    let parsed = parse_file(input, &mapping).unwrap();
    assert!(parsed.is_valid());
    assert_eq!(parsed.rows[0].article.external_key.as_deref(), Some("row-1"));
    assert_eq!(
      parsed.rows[0].article.content.context.published_at(),
      Some(Utc.with_ymd_and_hms(2025, 2, 3, 0, 0, 0).unwrap())
    );
    assert_eq!(parsed.rows[1].article.external_key, None);
    assert_eq!(
      parsed.rows[1].article.content.context.published_at(),
      Some(Utc.with_ymd_and_hms(2025, 2, 4, 10, 0, 0).unwrap())
    );
  }

  #[test]
  fn missing_required_column_fails_the_file() {
    let err = parse_file(b"headline,label\nx,relevant\n", &default_mapping()).unwrap_err();
    assert!(matches!(err, Error::MissingColumn { field: "text", .. }));
  }

  #[test]
  fn header_only_file_has_no_rows() {
    let parsed = parse_file(b"text,label\n", &default_mapping()).unwrap();
    assert_eq!(parsed.total_rows, 0);
    assert!(parsed.is_valid());
  }

  #[test]
  fn empty_file_has_no_header() {
    assert!(matches!(parse_file(b"", &default_mapping()), Err(Error::MissingHeader)));
  }
}
