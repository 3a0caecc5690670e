use crate::types::{Facet, LabelValue, Metric, RankedEntry, Record};
use crate::util::{finite_or_zero, percent_of};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Group records by `key`, sum `value` per group and return the `n` largest
/// groups with their share of the grand total.
///
/// Records with an empty key take no part, neither in the groups nor in the
/// total. Equal sums keep first-seen order.
pub fn rank_top_n(records: &[Record], key: Facet, value: Metric, n: usize) -> Vec<RankedEntry> {
    rank_pairs(
        records
            .iter()
            .map(|r| (Some(r.facet(key)), r.metric(value))),
        n,
    )
}

/// Rank a pre-aggregated `{x, y}` dataset. Null labels are excluded and
/// duplicate labels coalesce.
pub fn rank_label_values(points: &[LabelValue], n: usize) -> Vec<RankedEntry> {
    rank_pairs(points.iter().map(|p| (p.x.as_deref(), p.y)), n)
}

/// Rank the points of a per-client pie dataset that belong to the client
/// with tax id `cif`. Shares are relative to that client's own total.
pub fn rank_for_cif(points: &[LabelValue], cif: &str, n: usize) -> Vec<RankedEntry> {
    rank_pairs(
        points
            .iter()
            .filter(|p| p.cif.as_deref() == Some(cif))
            .map(|p| (p.x.as_deref(), p.y)),
        n,
    )
}

/// Shared ranking over `(label, value)` pairs.
pub fn rank_pairs<'a>(
    pairs: impl IntoIterator<Item = (Option<&'a str>, f64)>,
    n: usize,
) -> Vec<RankedEntry> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, f64)> = Vec::new();
    for (label, value) in pairs {
        let Some(label) = label.filter(|l| !l.is_empty()) else {
            continue;
        };
        let value = finite_or_zero(value);
        match index.get(label) {
            Some(&i) => groups[i].1 += value,
            None => {
                index.insert(label, groups.len());
                groups.push((label, value));
            }
        }
    }

    let grand_total: f64 = groups.iter().map(|(_, v)| v).sum();
    // `sort_by` is stable, so ties stay in first-seen order.
    groups.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    groups
        .into_iter()
        .take(n)
        .map(|(label, value)| RankedEntry {
            label: label.to_string(),
            value,
            share_percent: percent_of(value, grand_total),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Period;

    fn lv(x: Option<&str>, y: f64) -> LabelValue {
        LabelValue { x: x.map(str::to_string), y, cif: None }
    }

    #[test]
    fn null_label_excluded_from_ranking_and_total() {
        let points = vec![lv(Some("A"), 30.0), lv(Some("B"), 70.0), lv(None, 999.0)];
        let got = rank_label_values(&points, 2);
        assert_eq!(
            got,
            vec![
                RankedEntry { label: "B".into(), value: 70.0, share_percent: 70.0 },
                RankedEntry { label: "A".into(), value: 30.0, share_percent: 30.0 },
            ]
        );
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let points = vec![lv(Some("X"), 5.0), lv(Some("Y"), 5.0), lv(Some("Z"), 5.0)];
        let labels: Vec<_> = rank_label_values(&points, 3)
            .into_iter()
            .map(|e| e.label)
            .collect();
        assert_eq!(labels, vec!["X", "Y", "Z"]);
    }

    #[test]
    fn zero_total_gives_zero_shares() {
        let points = vec![lv(Some("A"), 0.0), lv(Some("B"), 0.0)];
        assert!(rank_label_values(&points, 5)
            .iter()
            .all(|e| e.share_percent == 0.0));
        assert!(rank_label_values(&[], 3).is_empty());
    }

    #[test]
    fn cif_scopes_the_pie() {
        let with_cif = |x: Option<&str>, y: f64, cif: &str| LabelValue {
            x: x.map(str::to_string),
            y,
            cif: Some(cif.to_string()),
        };
        let points = vec![
            with_cif(Some("Coronas"), 10.0, "B111"),
            with_cif(Some("Puentes"), 30.0, "B111"),
            with_cif(None, 50.0, "B111"),
            with_cif(Some("Coronas"), 500.0, "A999"),
            lv(Some("Coronas"), 7.0),
        ];
        let got = rank_for_cif(&points, "B111", 5);
        let labels: Vec<_> = got.iter().map(|e| (e.label.as_str(), e.share_percent)).collect();
        assert_eq!(labels, vec![("Puentes", 75.0), ("Coronas", 25.0)]);
        assert!(rank_for_cif(&points, "Z000", 5).is_empty());
    }

    #[test]
    fn groups_records_by_facet() {
        let make = |company: &str, cost: f64| Record {
            group_name: String::new(),
            company: company.into(),
            period: Period::new(2024, 1).unwrap(),
            case_count: 0.0,
            user_name: String::new(),
            urgency_type: String::new(),
            case_type: String::new(),
            cost,
            price: 0.0,
            margin: 0.0,
        };
        let data = vec![
            make("Acme", 10.0),
            make("Beta", 25.0),
            make("Acme", 20.0),
            make("", 100.0),
            make("Gamma", 5.0),
        ];
        let got = rank_top_n(&data, Facet::Company, Metric::Cost, 2);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].label, "Acme");
        assert_eq!(got[0].value, 30.0);
        assert_eq!(got[0].share_percent, 50.0);
        assert_eq!(got[1].label, "Beta");
        let all = rank_top_n(&data, Facet::Company, Metric::Cost, 10);
        let share: f64 = all.iter().map(|e| e.share_percent).sum();
        assert!((share - 100.0).abs() < 1e-9);
    }
}
