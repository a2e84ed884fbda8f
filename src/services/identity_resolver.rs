//! Identity resolution for realized keys.
//!
//! The realized store exposes no link back to the intent that produced a
//! record. The resolver infers it by set difference against a baseline taken
//! before the write, or by eliminating keys already claimed by sibling intents.
//!
//! Elimination only yields a unique answer when at most one unclaimed key is
//! present, so writes of ambiguous siblings (e.g. a v4 and a v6 policy) must be
//! serialized: resolve the first fully before writing the second. When more
//! than one candidate remains the resolver refuses to pick one and returns
//! [`HarnessError::AmbiguousIdentity`].

use tracing::info;

use crate::domain::errors::{HarnessError, HarnessResult};
use crate::domain::models::{
    BaselineSnapshot, KeySet, PollingConfig, RealizedKey, RealizedTable, ScenarioContext,
};
use crate::services::poller::{await_condition, Expectation, Probe};
use crate::services::realized_client::RealizedClient;

/// Select the single key of `observed` not present in `claimed`.
pub fn eliminate<'a>(
    table: RealizedTable,
    observed: &KeySet,
    claimed: impl IntoIterator<Item = &'a RealizedKey>,
) -> HarnessResult<RealizedKey> {
    let claimed: KeySet = claimed.into_iter().cloned().collect();
    let mut candidates = observed.difference(&claimed).cloned();

    match (candidates.next(), candidates.next()) {
        (Some(key), None) => Ok(key),
        (None, _) => Err(HarnessError::AmbiguousIdentity {
            table: table.name().to_string(),
            candidates: Vec::new(),
        }),
        (Some(first), Some(second)) => {
            let mut all = vec![first, second];
            all.extend(candidates);
            Err(HarnessError::AmbiguousIdentity {
                table: table.name().to_string(),
                candidates: all,
            })
        }
    }
}

/// Maps newly written intents to their realized keys.
#[derive(Clone)]
pub struct IdentityResolver {
    realized: RealizedClient,
}

impl IdentityResolver {
    /// Resolve identities through `realized`.
    pub fn new(realized: RealizedClient) -> Self {
        Self { realized }
    }

    /// Capture the baseline to diff against; call before the intent write.
    pub async fn baseline(&self, table: RealizedTable) -> HarnessResult<BaselineSnapshot> {
        self.realized.snapshot(table).await
    }

    /// Resolve the key that appeared in the baseline's table since it was taken.
    ///
    /// Waits until the table holds at least `baseline.len() + 1` keys with at
    /// least one of them new, then claims the single new key for `intent_id`.
    pub async fn resolve_new(
        &self,
        ctx: &mut ScenarioContext,
        intent_id: &str,
        baseline: &BaselineSnapshot,
        polling: &PollingConfig,
    ) -> HarnessResult<RealizedKey> {
        let table = baseline.table();
        let condition = table.at_least(baseline.len() + 1);
        let expectation = Expectation::new(
            table.name(),
            format!("one new key beyond {} baseline keys", baseline.len()),
        );
        let realized = &self.realized;

        let key = await_condition(&expectation, polling, || async move {
            let observed = realized.list_keys(table).await?;
            let fresh = baseline.new_keys(&observed);
            if !condition.is_satisfied_by(observed.len()) || fresh.is_empty() {
                return Ok(Probe::pending(format!(
                    "{} keys, {} new",
                    observed.len(),
                    fresh.len()
                )));
            }
            // Several new keys at once means unserialized sibling writes.
            eliminate(table, &observed, baseline.keys()).map(Probe::Ready)
        })
        .await?;

        ctx.claim(table, intent_id, key.clone())?;
        info!(table = %table, intent = intent_id, key = %key, "resolved by baseline difference");
        Ok(key)
    }

    /// Resolve `intent_id` once `table` holds at least `expected_total` keys by
    /// eliminating every key already claimed in `ctx`.
    pub async fn resolve_by_elimination(
        &self,
        ctx: &mut ScenarioContext,
        table: RealizedTable,
        intent_id: &str,
        expected_total: usize,
        polling: &PollingConfig,
    ) -> HarnessResult<RealizedKey> {
        let observed = self
            .realized
            .wait_for_keys(table.at_least(expected_total), polling)
            .await?;

        let key = eliminate(table, &observed, ctx.claimed(table))?;
        ctx.claim(table, intent_id, key.clone())?;
        info!(table = %table, intent = intent_id, key = %key, "resolved by elimination");
        Ok(key)
    }
}
