//! Period bucketing, facet option lists and year-over-year comparison.
//!
//! All functions are pure over a borrowed record slice. They never fail:
//! empty input produces empty or zero output.
use crate::types::{
    Bucket, ClientSale, Comparison, Dataset, Facet, FilterSet, LabelValue, Metric, MonthTile,
    NamedSeries, Period, PeriodBucket, PeriodOrder, PeriodRange, Record, Variance,
};
use crate::util::{finite_or_zero, percent_of};
use std::collections::{BTreeMap, BTreeSet};

/// Distinct non-empty values of `field`, sorted.
pub fn distinct_values(records: &[Record], field: Facet) -> Vec<String> {
    collect_sorted(records.iter(), field)
}

/// Values of `target` that co-occur with `depends_on == value`. An unset or
/// empty `value` falls back to [`distinct_values`] over `target`.
pub fn dependent_values(
    records: &[Record],
    depends_on: Facet,
    value: Option<&str>,
    target: Facet,
) -> Vec<String> {
    match value.filter(|v| !v.is_empty()) {
        Some(v) => collect_sorted(
            records.iter().filter(|r| r.facet(depends_on) == v),
            target,
        ),
        None => distinct_values(records, target),
    }
}

fn collect_sorted<'a>(records: impl Iterator<Item = &'a Record>, field: Facet) -> Vec<String> {
    let set: BTreeSet<&str> = records
        .map(|r| r.facet(field))
        .filter(|v| !v.is_empty())
        .collect();
    set.into_iter().map(str::to_string).collect()
}

/// Bucket `metric` by period.
///
/// Records failing any non-urgency facet are skipped. The rest add to
/// `total`; those also matching the urgency filter (or all, when it is
/// unset) add to `filtered`. Only periods inside `filters.range` are
/// returned.
pub fn aggregate_by_period(
    records: &[Record],
    filters: &FilterSet,
    metric: Metric,
    order: PeriodOrder,
) -> Vec<PeriodBucket> {
    let mut buckets: BTreeMap<Period, Bucket> = BTreeMap::new();
    for r in records {
        if !filters.matches_facets(r) || !filters.range.contains(r.period) {
            continue;
        }
        let value = finite_or_zero(r.metric(metric));
        let b = buckets.entry(r.period).or_default();
        b.total += value;
        if filters.matches_urgency(r) {
            b.filtered += value;
        }
    }
    let rows = buckets.into_iter().map(|(period, b)| PeriodBucket {
        period,
        total: b.total,
        filtered: b.filtered,
    });
    match order {
        PeriodOrder::Ascending => rows.collect(),
        PeriodOrder::Descending => rows.rev().collect(),
    }
}

/// Compare `current` against the same months one year earlier, summing
/// the `filtered` side of each bucket. The range in `filters` is ignored.
///
/// Without a positive prior total there is no baseline and
/// `delta_percent` is reported as 0. A range whose end cannot move back a
/// year has no prior months at all.
pub fn year_over_year(
    records: &[Record],
    filters: &FilterSet,
    metric: Metric,
    current: PeriodRange,
) -> Variance {
    let sum_filtered = |range: PeriodRange| -> f64 {
        let scoped = filters.clone().with_range(range);
        aggregate_by_period(records, &scoped, metric, PeriodOrder::Ascending)
            .iter()
            .map(|b| b.filtered)
            .sum()
    };
    let current_total = sum_filtered(current);
    let prior_total = current
        .shifted_back_one_year()
        .map_or(0.0, sum_filtered);
    let delta = current_total - prior_total;
    let has_baseline = prior_total > 0.0;
    Variance {
        current_total,
        prior_total,
        delta,
        delta_percent: if has_baseline {
            percent_of(delta, prior_total)
        } else {
            0.0
        },
        has_baseline,
    }
}

/// Totals for the `months` complete months before `reference`, oldest
/// first. Months without records are present with 0.
pub fn recent_months(
    records: &[Record],
    metric: Metric,
    reference: Period,
    months: u32,
) -> Vec<(Period, f64)> {
    let mut out: Vec<(Period, f64)> = (1..=i64::from(months))
        .rev()
        .filter_map(|back| reference.shift_months(-back))
        .map(|p| (p, 0.0))
        .collect();
    for r in records {
        if let Some(slot) = out.iter_mut().find(|(p, _)| *p == r.period) {
            slot.1 += finite_or_zero(r.metric(metric));
        }
    }
    out
}

/// Home page tiles: cases, cost and sales (price) for each of the `months`
/// complete months before `reference`.
pub fn recent_month_tiles(records: &[Record], reference: Period, months: u32) -> Vec<MonthTile> {
    let cases = recent_months(records, Metric::Cases, reference, months);
    let cost = recent_months(records, Metric::Cost, reference, months);
    let sales = recent_months(records, Metric::Price, reference, months);
    cases
        .into_iter()
        .zip(cost)
        .zip(sales)
        .map(|(((period, cases), (_, cost)), (_, sales))| MonthTile {
            period,
            cases,
            cost,
            sales,
        })
        .collect()
}

/// Per-period sums of `(period, value)` pairs, ascending.
pub fn monthly_totals(points: impl IntoIterator<Item = (Period, f64)>) -> Vec<(Period, f64)> {
    let mut sums: BTreeMap<Period, f64> = BTreeMap::new();
    for (period, value) in points {
        *sums.entry(period).or_default() += finite_or_zero(value);
    }
    sums.into_iter().collect()
}

/// Sales lines of one client whose date falls inside `range`, oldest first.
pub fn client_sales_between(
    sales: &[ClientSale],
    company: &str,
    range: PeriodRange,
) -> Vec<ClientSale> {
    let mut out: Vec<ClientSale> = sales
        .iter()
        .filter(|s| s.company == company && range.contains(Period::from_date(s.date)))
        .cloned()
        .collect();
    out.sort_by_key(|s| s.date);
    out
}

/// Monthly rollup of one client's sales inside `range`.
pub fn client_monthly_sales(
    sales: &[ClientSale],
    company: &str,
    range: PeriodRange,
) -> Vec<(Period, f64)> {
    monthly_totals(
        client_sales_between(sales, company, range)
            .into_iter()
            .map(|s| (Period::from_date(s.date), s.amount)),
    )
}

/// Align several labelled series on one category axis. Categories keep
/// first-seen order across all datasets; a series without a point for a
/// category gets 0 there. Points with a null `x` are dropped.
pub fn align_datasets(datasets: &[Dataset]) -> Comparison {
    let mut categories: Vec<String> = Vec::new();
    for d in datasets {
        for x in d.points.iter().filter_map(|p| p.x.as_deref()) {
            if !categories.iter().any(|c| c == x) {
                categories.push(x.to_string());
            }
        }
    }
    let series = datasets
        .iter()
        .map(|d| {
            let mut values = vec![0.0; categories.len()];
            for p in &d.points {
                let Some(x) = p.x.as_deref() else { continue };
                if let Some(i) = categories.iter().position(|c| c == x) {
                    values[i] += finite_or_zero(p.y);
                }
            }
            NamedSeries {
                label: d.label.clone(),
                values,
            }
        })
        .collect();
    Comparison { categories, series }
}

/// Y-axis ceiling for a series: the largest total or filtered value, or 10
/// when there is nothing above zero.
pub fn chart_ceiling(rows: &[PeriodBucket]) -> f64 {
    let max = rows
        .iter()
        .flat_map(|b| [b.total, b.filtered])
        .fold(0.0_f64, f64::max);
    if max > 0.0 {
        max
    } else {
        10.0
    }
}

/// Keep points of a month-labelled history dataset (`"Enero 2024"`) that
/// fall inside `range`. Points with missing or unreadable labels are dropped.
pub fn filter_labeled_by_range(points: &[LabelValue], range: PeriodRange) -> Vec<LabelValue> {
    points
        .iter()
        .filter(|p| {
            p.x.as_deref()
                .and_then(Period::parse_label_es)
                .map_or(false, |period| range.contains(period))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(period: &str, cases: f64) -> Record {
        Record {
            group_name: "G1".into(),
            company: "Acme".into(),
            period: Period::parse(period).unwrap(),
            case_count: cases,
            user_name: "Ana".into(),
            urgency_type: "Normal".into(),
            case_type: "Dental".into(),
            cost: cases * 2.0,
            price: 0.0,
            margin: 0.0,
        }
    }

    fn p(s: &str) -> Period {
        Period::parse(s).unwrap()
    }

    #[test]
    fn distinct_values_sorted_without_empties() {
        let mut a = rec("2024-01", 1.0);
        a.company = "Zeta".into();
        let mut b = rec("2024-01", 1.0);
        b.company = String::new();
        let c = rec("2024-02", 1.0);
        let got = distinct_values(&[a, b, c.clone(), c], Facet::Company);
        assert_eq!(got, vec!["Acme", "Zeta"]);
        assert!(distinct_values(&[], Facet::Group).is_empty());
    }

    #[test]
    fn dependent_values_narrow_and_fall_back() {
        let mut a = rec("2024-01", 1.0);
        a.group_name = "G2".into();
        a.company = "Beta".into();
        let b = rec("2024-01", 1.0);
        let data = vec![a, b];
        assert_eq!(
            dependent_values(&data, Facet::Group, Some("G2"), Facet::Company),
            vec!["Beta"]
        );
        assert_eq!(
            dependent_values(&data, Facet::Group, Some(""), Facet::Company),
            vec!["Acme", "Beta"]
        );
        assert!(dependent_values(&data, Facet::Group, Some("G9"), Facet::Company).is_empty());
    }

    #[test]
    fn urgency_only_restricts_filtered() {
        let mut urgent = rec("2024-01", 4.0);
        urgent.urgency_type = "Alta".into();
        let data = vec![urgent, rec("2024-01", 6.0)];
        let f = FilterSet::default().with(Facet::UrgencyType, "Alta");
        let rows = aggregate_by_period(&data, &f, Metric::Cases, PeriodOrder::Ascending);
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].total, rows[0].filtered), (10.0, 4.0));
    }

    #[test]
    fn facet_filters_are_exact_and_case_sensitive() {
        let data = vec![rec("2024-01", 5.0)];
        let f = FilterSet::default().with(Facet::Company, "acme");
        assert!(aggregate_by_period(&data, &f, Metric::Cases, PeriodOrder::Ascending).is_empty());
    }

    #[test]
    fn explicit_order_and_range() {
        let data = vec![
            rec("2024-03", 1.0),
            rec("2023-12", 1.0),
            rec("2024-01", 1.0),
        ];
        let f = FilterSet::default().with_range(PeriodRange::new(Some(p("2024-01")), None));
        let asc = aggregate_by_period(&data, &f, Metric::Cases, PeriodOrder::Ascending);
        let periods: Vec<_> = asc.iter().map(|b| b.period.to_string()).collect();
        assert_eq!(periods, vec!["2024-01", "2024-03"]);
        let desc = aggregate_by_period(&data, &f, Metric::Cases, PeriodOrder::Descending);
        assert_eq!(desc[0].period, p("2024-03"));
    }

    #[test]
    fn metric_selects_field() {
        let data = vec![rec("2024-01", 5.0)];
        let rows = aggregate_by_period(
            &data,
            &FilterSet::default(),
            Metric::Cost,
            PeriodOrder::Ascending,
        );
        assert_eq!(rows[0].total, 10.0);
    }

    #[test]
    fn year_over_year_variance() {
        let data = vec![
            rec("2024-01", 30.0),
            rec("2024-02", 30.0),
            rec("2023-01", 40.0),
            rec("2022-01", 1000.0),
        ];
        let v = year_over_year(
            &data,
            &FilterSet::default(),
            Metric::Cases,
            PeriodRange::new(Some(p("2024-01")), Some(p("2024-02"))),
        );
        assert_eq!(v.current_total, 60.0);
        assert_eq!(v.prior_total, 40.0);
        assert_eq!(v.delta, 20.0);
        assert_eq!(v.delta_percent, 50.0);
        assert!(v.has_baseline);
    }

    #[test]
    fn no_baseline_reports_zero_percent() {
        let data = vec![rec("2024-01", 30.0)];
        let v = year_over_year(&data, &FilterSet::default(), Metric::Cases, PeriodRange::year(2024));
        assert_eq!(v.prior_total, 0.0);
        assert_eq!(v.delta_percent, 0.0);
        assert!(!v.has_baseline);
        assert!(v.delta_percent.is_finite());
    }

    #[test]
    fn recent_months_fill_gaps() {
        let data = vec![rec("2024-01", 2.0), rec("2024-01", 3.0), rec("2024-03", 9.0)];
        let got = recent_months(&data, Metric::Cases, p("2024-03"), 3);
        assert_eq!(
            got,
            vec![(p("2023-12"), 0.0), (p("2024-01"), 5.0), (p("2024-02"), 0.0)]
        );
    }

    #[test]
    fn monthly_totals_sum_per_period() {
        let data = vec![rec("2024-02", 1.0), rec("2024-01", 2.0), rec("2024-02", 3.0)];
        assert_eq!(
            monthly_totals(data.iter().map(|r| (r.period, r.metric(Metric::Cases)))),
            vec![(p("2024-01"), 2.0), (p("2024-02"), 4.0)]
        );
    }

    #[test]
    fn tiles_cover_cases_cost_and_sales() {
        let mut a = rec("2024-02", 3.0);
        a.price = 50.0;
        let tiles = recent_month_tiles(&[a], p("2024-03"), 2);
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[0].period, p("2024-01"));
        assert_eq!(tiles[0].cases, 0.0);
        assert_eq!(
            (tiles[1].cases, tiles[1].cost, tiles[1].sales),
            (3.0, 6.0, 50.0)
        );
    }

    #[test]
    fn client_sales_by_range_and_month() {
        let sale = |company: &str, date: &str, amount: f64| ClientSale {
            company: company.into(),
            date: chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            amount,
        };
        let sales = vec![
            sale("Acme", "2024-02-20", 10.0),
            sale("Acme", "2024-02-01", 5.0),
            sale("Beta", "2024-02-03", 99.0),
            sale("Acme", "2024-04-09", 7.0),
            sale("Acme", "2023-12-31", 1.0),
        ];
        let range = PeriodRange::year(2024);
        let lines = client_sales_between(&sales, "Acme", range);
        let amounts: Vec<f64> = lines.iter().map(|s| s.amount).collect();
        assert_eq!(amounts, vec![5.0, 10.0, 7.0]);
        assert_eq!(
            client_monthly_sales(&sales, "Acme", range),
            vec![(p("2024-02"), 15.0), (p("2024-04"), 7.0)]
        );
        assert!(client_monthly_sales(&sales, "Nobody", range).is_empty());
    }

    #[test]
    fn datasets_align_on_shared_categories() {
        let point = |x: Option<&str>, y: f64| LabelValue {
            x: x.map(str::to_string),
            y,
            ..Default::default()
        };
        let sets = vec![
            Dataset {
                label: "Marzo".into(),
                points: vec![point(Some("S1"), 4.0), point(Some("S2"), 6.0)],
            },
            Dataset {
                label: "Abril".into(),
                points: vec![point(Some("S2"), 5.0), point(Some("S3"), 1.0), point(None, 9.0)],
            },
        ];
        let c = align_datasets(&sets);
        assert_eq!(c.categories, vec!["S1", "S2", "S3"]);
        assert_eq!(c.series[0].values, vec![4.0, 6.0, 0.0]);
        assert_eq!(c.series[1].values, vec![0.0, 5.0, 1.0]);
        assert_eq!(align_datasets(&[]), Comparison::default());
    }

    #[test]
    fn year_over_year_survives_extreme_years() {
        let data = vec![rec("2024-01", 1.0)];
        for year in [i32::MIN, i32::MIN + 1, i32::MAX] {
            let v = year_over_year(&data, &FilterSet::default(), Metric::Cases, PeriodRange::year(year));
            assert_eq!(v.current_total, 0.0);
            assert_eq!(v.delta_percent, 0.0);
            assert!(!v.has_baseline);
        }
        assert_eq!(recent_months(&data, Metric::Cases, Period::new(i32::MIN, 2).unwrap(), 3).len(), 1);
    }

    #[test]
    fn ceiling_defaults_to_ten() {
        assert_eq!(chart_ceiling(&[]), 10.0);
        let rows = vec![PeriodBucket { period: p("2024-01"), total: 12.0, filtered: 3.0 }];
        assert_eq!(chart_ceiling(&rows), 12.0);
    }

    #[test]
    fn labelled_history_by_range() {
        let points = vec![
            LabelValue { x: Some("Diciembre 2023".into()), y: 1.0, cif: None },
            LabelValue { x: Some("Enero 2024".into()), y: 2.0, cif: None },
            LabelValue { x: Some("???".into()), y: 3.0, cif: None },
            LabelValue { x: None, y: 4.0, cif: None },
        ];
        let got = filter_labeled_by_range(&points, PeriodRange::year(2024));
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].y, 2.0);
    }
}
