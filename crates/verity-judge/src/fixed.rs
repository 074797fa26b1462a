//! A judge that always answers the same way.

use crate::{Evaluate, Request, Result, Verdict};

#[derive(Debug, Clone)]
pub struct FixedJudge {
  verdict: Verdict,
}

impl FixedJudge {
  pub fn new(verdict: Verdict) -> Self { Self { verdict } }
}

impl Evaluate for FixedJudge {
  async fn evaluate<'a>(&'a self, _request: Request<'a>) -> Result<Verdict> {
    Ok(self.verdict.clone())
  }
}
