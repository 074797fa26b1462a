//! Deterministic sampling for derived datasets.
//!
//! Given the same candidate set, method, size and seed, the result is the same
//! set of article versions on every run and every platform. Candidates are
//! sorted by id before any randomness is applied, so input order never
//! matters.

use std::collections::BTreeMap;

use rand::{SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use crate::{
  assessment::Label,
  dataset::{Candidate, SampleMethod},
};

/// Sample `size` candidates. Returns the chosen article version ids sorted.
pub fn sample(candidates: &[Candidate], method: SampleMethod, size: usize, seed: u64) -> Vec<Uuid> {
  match method {
    SampleMethod::Random => {
      random(candidates.iter().map(|c| c.article_version_id).collect(), size, seed)
    }
    SampleMethod::Stratified => stratified(candidates, size, seed),
  }
}

fn random(mut ids: Vec<Uuid>, size: usize, seed: u64) -> Vec<Uuid> {
  ids.sort_unstable();
  ids.dedup();
  let mut rng = ChaCha8Rng::seed_from_u64(seed);
  ids.shuffle(&mut rng);
  ids.truncate(size);
  ids.sort_unstable();
  ids
}

/// Stream index of a stratum. Fixed per label so adding or removing one
/// stratum does not change the draws of the others.
fn stratum_stream(label: Option<Label>) -> u64 {
  match label {
    None => 0,
    Some(Label::Relevant) => 1,
    Some(Label::NotRelevant) => 2,
    Some(Label::Unsure) => 3,
  }
}

fn stratified(candidates: &[Candidate], size: usize, seed: u64) -> Vec<Uuid> {
  let mut strata: BTreeMap<Option<Label>, Vec<Uuid>> = BTreeMap::new();
  for c in candidates {
    strata.entry(c.label).or_default().push(c.article_version_id);
  }
  for (label, ids) in strata.iter_mut() {
    ids.sort_unstable();
    ids.dedup();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stratum_stream(*label));
    ids.shuffle(&mut rng);
  }

  let available: Vec<usize> = strata.values().map(Vec::len).collect();
  let quotas = allocate(&available, size);

  let mut out: Vec<Uuid> = strata
    .values()
    .zip(quotas)
    .flat_map(|(ids, quota)| ids.iter().take(quota).copied())
    .collect();
  out.sort_unstable();
  out
}

/// Largest-remainder proportional allocation of `size` draws over strata with
/// the given availability. No stratum is allocated more than it holds; any
/// surplus goes to strata with spare capacity, in stratum order.
fn allocate(available: &[usize], size: usize) -> Vec<usize> {
  let total: usize = available.iter().sum();
  let target = size.min(total);
  if total == 0 {
    return vec![0; available.len()];
  }

  let mut quotas: Vec<usize> = Vec::with_capacity(available.len());
  let mut remainders: Vec<(usize, usize)> = Vec::with_capacity(available.len());
  for (i, &n) in available.iter().enumerate() {
    let exact = target * n;
    quotas.push(exact / total);
    remainders.push((exact % total, i));
  }

  let mut leftover = target - quotas.iter().sum::<usize>();
  remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
  for &(_, i) in &remainders {
    if leftover == 0 {
      break;
    }
    if quotas[i] < available[i] {
      quotas[i] += 1;
      leftover -= 1;
    }
  }

  for i in 0..quotas.len() {
    if leftover == 0 {
      break;
    }
    let spare = available[i] - quotas[i];
    let take = spare.min(leftover);
    quotas[i] += take;
    leftover -= take;
  }
  quotas
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use proptest::prelude::*;

  use super::*;

  fn candidates(relevant: usize, not_relevant: usize) -> Vec<Candidate> {
    let mut out = Vec::new();
    for i in 0..relevant {
      out.push(Candidate {
        article_version_id: Uuid::from_u128(i as u128 + 1),
        label:              Some(Label::Relevant),
      });
    }
    for i in 0..not_relevant {
      out.push(Candidate {
        article_version_id: Uuid::from_u128(10_000 + i as u128),
        label:              Some(Label::NotRelevant),
      });
    }
    out
  }

  #[test]
  fn same_seed_same_sample() {
    let pool = candidates(40, 0);
    let a = sample(&pool, SampleMethod::Random, 10, 42);
    let b = sample(&pool, SampleMethod::Random, 10, 42);
    assert_eq!(a, b);
    assert_eq!(a.len(), 10);
  }

  #[test]
  fn input_order_does_not_matter() {
    let pool = candidates(30, 20);
    let mut reversed = pool.clone();
    reversed.reverse();
    for method in [SampleMethod::Random, SampleMethod::Stratified] {
      assert_eq!(sample(&pool, method, 12, 7), sample(&reversed, method, 12, 7));
    }
  }

  #[test]
  fn different_seed_changes_the_sample() {
    let pool = candidates(40, 0);
    let a = sample(&pool, SampleMethod::Random, 10, 1);
    let b = sample(&pool, SampleMethod::Random, 10, 2);
    assert_ne!(a, b);
  }

  #[test]
  fn oversized_request_returns_everything() {
    let pool = candidates(5, 3);
    assert_eq!(sample(&pool, SampleMethod::Random, 100, 3).len(), 8);
    assert_eq!(sample(&pool, SampleMethod::Stratified, 100, 3).len(), 8);
  }

  #[test]
  fn stratified_allocates_proportionally() {
    let pool = candidates(30, 10);
    let picked: HashSet<Uuid> = sample(&pool, SampleMethod::Stratified, 8, 11).into_iter().collect();
    let relevant = pool
      .iter()
      .filter(|c| c.label == Some(Label::Relevant) && picked.contains(&c.article_version_id))
      .count();
    assert_eq!(picked.len(), 8);
    assert_eq!(relevant, 6);
  }

  #[test]
  fn allocation_uses_largest_remainder() {
    // 10 draws over 1/3 each: 3.33 each, one leftover to the first stratum.
    assert_eq!(allocate(&[3, 3, 3], 10), vec![3, 3, 3]);
    assert_eq!(allocate(&[10, 10, 10], 10), vec![4, 3, 3]);
    assert_eq!(allocate(&[1, 99], 10), vec![0, 10]);
    assert_eq!(allocate(&[], 5), Vec::<usize>::new());
  }

  proptest! {
    #[test]
    fn sample_is_a_sorted_subset_of_the_requested_size(
      relevant in 0usize..60,
      not_relevant in 0usize..60,
      size in 1usize..80,
      seed in any::<u64>(),
    ) {
      let pool = candidates(relevant, not_relevant);
      let ids: HashSet<Uuid> = pool.iter().map(|c| c.article_version_id).collect();
      for method in [SampleMethod::Random, SampleMethod::Stratified] {
        let picked = sample(&pool, method, size, seed);
        prop_assert_eq!(picked.len(), size.min(pool.len()));
        prop_assert!(picked.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(picked.iter().all(|id| ids.contains(id)));
      }
    }

    #[test]
    fn allocation_never_exceeds_availability(
      available in proptest::collection::vec(0usize..50, 0..5),
      size in 0usize..200,
    ) {
      let quotas = allocate(&available, size);
      let total: usize = available.iter().sum();
      prop_assert_eq!(quotas.iter().sum::<usize>(), size.min(total));
      prop_assert!(quotas.iter().zip(&available).all(|(q, n)| q <= n));
    }
  }
}
