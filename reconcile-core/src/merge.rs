//! The Merger (§4.6): folds one transaction collection into another in place by
//! structural key plus a caller-provided equivalence predicate.

use crate::identity::dice_coefficient;
use crate::transaction::Transaction;

const THREE_DAYS_MS: i64 = 3 * 86_400 * 1000;

/// Items left over in each pool after both merge passes.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub left_remainder: Vec<Transaction>,
    pub right_remainder: Vec<Transaction>,
}

fn structurally_matches(
    a: &Transaction,
    b: &Transaction,
    equivalent: &impl Fn(&Transaction, &Transaction) -> bool,
) -> bool {
    if a.source_id != b.source_id || a.destination_id != b.destination_id || a.amount != b.amount {
        return false;
    }
    if let (Some(fa), Some(fb)) = (&a.firefly_id, &b.firefly_id) {
        if fa != fb {
            return false;
        }
    }
    if let (Some(xa), Some(xb)) = (&a.foreign_amount, &b.foreign_amount) {
        if xa != xb {
            return false;
        }
    }
    if let (Some(ca), Some(cb)) = (&a.foreign_currency_code, &b.foreign_currency_code) {
        if ca != cb {
            return false;
        }
    }
    equivalent(a, b)
}

/// Among `pool`, find the best structural match for `anchor`: filter to those
/// within 3 days, then sort ascending by date distance, then ascending by
/// description similarity (this ordering, not "most similar wins", is what
/// the source implements — see DESIGN.md).
fn best_match_index(
    anchor: &Transaction,
    pool: &[Transaction],
    equivalent: &impl Fn(&Transaction, &Transaction) -> bool,
) -> Option<usize> {
    let mut candidates: Vec<(usize, i64, f64)> = pool
        .iter()
        .enumerate()
        .filter(|(_, candidate)| structurally_matches(anchor, candidate, equivalent))
        .map(|(index, candidate)| {
            let distance = (anchor.date.timestamp_millis() - candidate.date.timestamp_millis()).abs();
            let similarity = dice_coefficient(&anchor.description, &candidate.description);
            (index, distance, similarity)
        })
        .filter(|(_, distance, _)| *distance <= THREE_DAYS_MS)
        .collect();

    candidates.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.partial_cmp(&b.2).unwrap()));
    candidates.first().map(|(index, _, _)| *index)
}

fn fuse(a: &mut Transaction, b: &Transaction) {
    if a.firefly_id.is_none() {
        a.firefly_id = b.firefly_id.clone();
    }
    for akahu_id in &b.akahu_ids {
        a.akahu_ids.insert(akahu_id.clone());
    }
    if a.foreign_amount.is_none() {
        a.foreign_amount = b.foreign_amount;
    }
    if a.foreign_currency_code.is_none() {
        a.foreign_currency_code = b.foreign_currency_code.clone();
    }
    if a.category_name.is_none() {
        a.category_name = b.category_name.clone();
    }
    if b.has_nonzero_hour_or_minute() {
        a.date = b.date;
    }
}

/// Fold `other` into `self_transactions` in place. `equivalent` defaults to
/// always-true, `combine` to a no-op (see `merge_default`).
pub fn merge(
    self_transactions: &mut Vec<Transaction>,
    mut other: Vec<Transaction>,
    equivalent: impl Fn(&Transaction, &Transaction) -> bool,
    combine: impl Fn(&mut Transaction, &Transaction),
) -> MergeOutcome {
    let mut fused = Vec::new();
    let mut remaining_self = Vec::new();

    for a in self_transactions.drain(..) {
        if let Some(index) = best_match_index(&a, &other, &equivalent) {
            let b = other.remove(index);
            let mut a = a;
            fuse(&mut a, &b);
            combine(&mut a, &b);
            fused.push(a);
        } else {
            remaining_self.push(a);
        }
    }

    let mut right_remainder = Vec::new();
    let mut created = Vec::new();
    for b in other.drain(..) {
        if let Some(index) = best_match_index(&b, &remaining_self, &equivalent) {
            let mut a = remaining_self.remove(index);
            fuse(&mut a, &b);
            combine(&mut a, &b);
            fused.push(a);
        } else {
            created.push(b.clone());
            right_remainder.push(b);
        }
    }

    let left_remainder = remaining_self.clone();

    self_transactions.extend(fused);
    self_transactions.extend(remaining_self);
    self_transactions.extend(created);

    MergeOutcome { left_remainder, right_remainder }
}

/// `merge` with the default always-equivalent predicate and no-op combiner.
pub fn merge_default(self_transactions: &mut Vec<Transaction>, other: Vec<Transaction>) -> MergeOutcome {
    merge(self_transactions, other, |_, _| true, |_, _| {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn t(desc: &str, date: &str, amount: rust_decimal::Decimal, source: u64, dest: u64) -> Transaction {
        let date = Utc.datetime_from_str(date, "%Y-%m-%dT%H:%M:%SZ").unwrap();
        Transaction::candidate(desc, date, amount, source, dest)
    }

    #[test]
    fn fuses_matching_pair_and_unions_akahu_ids() {
        let mut a = t("to savings", "2024-02-03T09:00:00Z", dec!(200), 1, 2);
        a.akahu_ids.insert("trans_T-".into());
        let mut b = t("from chq", "2024-02-03T09:01:00Z", dec!(200), 1, 2);
        b.akahu_ids.insert("trans_T+".into());

        let mut self_pool = vec![a];
        let outcome = merge_default(&mut self_pool, vec![b]);

        assert!(outcome.left_remainder.is_empty());
        assert!(outcome.right_remainder.is_empty());
        assert_eq!(self_pool.len(), 1);
        let fused = &self_pool[0];
        assert_eq!(fused.akahu_ids.len(), 2);
        assert_eq!(fused.date.format("%H:%M").to_string(), "09:01");
    }

    #[test]
    fn zero_minute_date_loses_to_nonzero_minute_on_fuse() {
        let a = t("a", "2024-02-03T00:00:00Z", dec!(5), 1, 2);
        let b = t("b", "2024-02-03T08:30:00Z", dec!(5), 1, 2);
        let mut self_pool = vec![a];
        merge_default(&mut self_pool, vec![b]);
        assert_eq!(self_pool[0].date.format("%H:%M").to_string(), "08:30");
    }

    #[test]
    fn unmatched_items_surface_as_remainders() {
        let a = t("a", "2024-02-03T09:00:00Z", dec!(5), 1, 2);
        let b = t("b", "2024-02-03T09:00:00Z", dec!(7), 1, 2);
        let mut self_pool = vec![a];
        let outcome = merge_default(&mut self_pool, vec![b]);
        assert_eq!(outcome.left_remainder.len(), 1);
        assert_eq!(outcome.right_remainder.len(), 1);
        assert_eq!(self_pool.len(), 2);
    }

    #[test]
    fn candidates_outside_three_days_do_not_match() {
        let a = t("a", "2024-02-01T09:00:00Z", dec!(5), 1, 2);
        let b = t("a", "2024-02-10T09:00:00Z", dec!(5), 1, 2);
        let mut self_pool = vec![a];
        let outcome = merge_default(&mut self_pool, vec![b]);
        assert_eq!(outcome.left_remainder.len(), 1);
        assert_eq!(outcome.right_remainder.len(), 1);
    }
}
