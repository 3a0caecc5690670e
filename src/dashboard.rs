//! Dashboard view state.
//!
//! Holds the loaded records and the current selection. Every change of a
//! facet, the range or the metric only updates the selection; the view is
//! recomputed from scratch by [`Dashboard::snapshot`].
use crate::aggregate::{
    aggregate_by_period, chart_ceiling, dependent_values, distinct_values, recent_month_tiles,
    year_over_year,
};
use crate::ranking::rank_top_n;
use crate::types::{
    Facet, FilterSet, Metric, MonthTile, Period, PeriodBucket, PeriodOrder, PeriodRange,
    RankedEntry, Record, SummaryStats, Variance,
};
use tracing::{debug, info};

pub const DEFAULT_TOP_N: usize = 3;
/// Months shown by the home page tiles.
pub const TILE_MONTHS: u32 = 3;

/// Values offered by each filter control.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    pub groups: Vec<String>,
    pub companies: Vec<String>,
    pub case_types: Vec<String>,
    pub urgency_types: Vec<String>,
    pub specialists: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub options: FilterOptions,
    pub series: Vec<PeriodBucket>,
    pub variance: Variance,
    pub top_clients: Vec<RankedEntry>,
    pub top_specialists: Vec<RankedEntry>,
    pub chart_ceiling: f64,
    pub matching_records: usize,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    records: Vec<Record>,
    filters: FilterSet,
    metric: Metric,
    top_n: usize,
    order: PeriodOrder,
}

impl Dashboard {
    pub fn new(records: Vec<Record>) -> Self {
        Dashboard {
            records,
            filters: FilterSet::default(),
            metric: Metric::default(),
            top_n: DEFAULT_TOP_N,
            order: PeriodOrder::default(),
        }
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_top_n(mut self, n: usize) -> Self {
        self.top_n = n;
        self
    }

    pub fn with_order(mut self, order: PeriodOrder) -> Self {
        self.order = order;
        self
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn set_metric(&mut self, metric: Metric) {
        self.metric = metric;
    }

    pub fn set_range(&mut self, range: PeriodRange) {
        self.filters.range = range;
    }

    /// Select a facet value (or clear it with `None`).
    ///
    /// Choosing a group drops a selected company that does not occur in it.
    pub fn set_facet(&mut self, facet: Facet, value: Option<String>) {
        self.filters.set(facet, value);
        if facet == Facet::Group {
            if let Some(company) = self.filters.company.clone() {
                let allowed = self.company_options();
                if !allowed.contains(&company) {
                    info!(company = %company, "selected company not in group, clearing");
                    self.filters.company = None;
                }
            }
        }
    }

    pub fn clear_filters(&mut self) {
        let range = self.filters.range;
        self.filters = FilterSet::default().with_range(range);
    }

    pub fn company_options(&self) -> Vec<String> {
        dependent_values(
            &self.records,
            Facet::Group,
            self.filters.get(Facet::Group),
            Facet::Company,
        )
    }

    pub fn case_type_options(&self) -> Vec<String> {
        dependent_values(
            &self.records,
            Facet::Specialist,
            self.filters.get(Facet::Specialist),
            Facet::CaseType,
        )
    }

    pub fn options(&self) -> FilterOptions {
        FilterOptions {
            groups: distinct_values(&self.records, Facet::Group),
            companies: self.company_options(),
            case_types: self.case_type_options(),
            urgency_types: distinct_values(&self.records, Facet::UrgencyType),
            specialists: distinct_values(&self.records, Facet::Specialist),
        }
    }

    /// Records matching every filter including urgency and range.
    pub fn matching(&self) -> Vec<Record> {
        self.records
            .iter()
            .filter(|r| self.filters.matches(r))
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> DashboardView {
        let series = aggregate_by_period(&self.records, &self.filters, self.metric, self.order);
        let variance = year_over_year(&self.records, &self.filters, self.metric, self.filters.range);
        let matching = self.matching();
        let top_clients = rank_top_n(&matching, Facet::Company, self.metric, self.top_n);
        let top_specialists = rank_top_n(&matching, Facet::Specialist, self.metric, self.top_n);
        let ceiling = chart_ceiling(&series);
        debug!(
            periods = series.len(),
            matching = matching.len(),
            metric = self.metric.as_str(),
            "dashboard recomputed"
        );
        DashboardView {
            options: self.options(),
            series,
            variance,
            top_clients,
            top_specialists,
            chart_ceiling: ceiling,
            matching_records: matching.len(),
        }
    }

    /// Tiles for the [`TILE_MONTHS`] complete months before `as_of`. Like the
    /// home page, they ignore every filter.
    pub fn recent_tiles(&self, as_of: Period) -> Vec<MonthTile> {
        recent_month_tiles(&self.records, as_of, TILE_MONTHS)
    }

    pub fn summary(&self, view: &DashboardView) -> SummaryStats {
        SummaryStats {
            metric: self.metric.as_str(),
            range_start: self.filters.range.start.map(|p| p.to_string()),
            range_end: self.filters.range.end.map(|p| p.to_string()),
            total_records: self.records.len(),
            matching_records: view.matching_records,
            variance: view.variance,
            chart_ceiling: view.chart_ceiling,
            series: view.series.clone(),
            top_clients: view.top_clients.clone(),
            top_specialists: view.top_specialists.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(group: &str, company: &str, user: &str, case_type: &str, period: &str, cases: f64) -> Record {
        Record {
            group_name: group.into(),
            company: company.into(),
            period: Period::parse(period).unwrap(),
            case_count: cases,
            user_name: user.into(),
            urgency_type: "Normal".into(),
            case_type: case_type.into(),
            cost: 0.0,
            price: 0.0,
            margin: 0.0,
        }
    }

    fn sample() -> Vec<Record> {
        vec![
            rec("North", "Acme", "Ana", "Dental", "2024-01", 10.0),
            rec("North", "Beta", "Luis", "Ortho", "2024-02", 5.0),
            rec("South", "Gamma", "Ana", "Implant", "2024-02", 7.0),
            rec("North", "Acme", "Ana", "Dental", "2023-01", 4.0),
        ]
    }

    #[test]
    fn group_change_cascades_to_company() {
        let mut d = Dashboard::new(sample());
        d.set_facet(Facet::Company, Some("Gamma".into()));
        d.set_facet(Facet::Group, Some("North".into()));
        assert_eq!(d.filters().company, None);
        assert_eq!(d.company_options(), vec!["Acme", "Beta"]);

        d.set_facet(Facet::Company, Some("Acme".into()));
        d.set_facet(Facet::Group, Some("North".into()));
        assert_eq!(d.filters().company.as_deref(), Some("Acme"));
    }

    #[test]
    fn specialist_narrows_case_types() {
        let mut d = Dashboard::new(sample());
        d.set_facet(Facet::Specialist, Some("Ana".into()));
        assert_eq!(d.options().case_types, vec!["Dental", "Implant"]);
        d.set_facet(Facet::Specialist, None);
        assert_eq!(d.options().case_types.len(), 3);
    }

    #[test]
    fn snapshot_recomputes_after_filter_change() {
        let mut d = Dashboard::new(sample()).with_top_n(2);
        d.set_range(PeriodRange::year(2024));
        let all = d.snapshot();
        assert_eq!(all.series.len(), 2);
        assert_eq!(all.variance.current_total, 22.0);
        assert_eq!(all.variance.prior_total, 4.0);
        assert_eq!(all.top_clients[0].label, "Acme");
        assert_eq!(all.top_specialists[0].label, "Ana");
        assert_eq!(all.top_specialists[0].value, 17.0);

        d.set_facet(Facet::Group, Some("South".into()));
        let south = d.snapshot();
        assert_eq!(south.series.len(), 1);
        assert_eq!(south.chart_ceiling, 7.0);
        assert!(!south.variance.has_baseline);
        assert_eq!(south, d.snapshot());
    }

    #[test]
    fn tiles_ignore_filters() {
        let mut d = Dashboard::new(sample());
        d.set_facet(Facet::Group, Some("South".into()));
        let tiles = d.recent_tiles(Period::new(2024, 3).unwrap());
        let cases: Vec<f64> = tiles.iter().map(|t| t.cases).collect();
        assert_eq!(cases, vec![0.0, 10.0, 12.0]);
        assert_eq!(tiles[0].period, Period::new(2023, 12).unwrap());
    }

    #[test]
    fn clear_keeps_range() {
        let mut d = Dashboard::new(sample());
        d.set_range(PeriodRange::year(2023));
        d.set_facet(Facet::Specialist, Some("Ana".into()));
        d.clear_filters();
        assert_eq!(d.filters().specialist, None);
        assert_eq!(d.filters().range, PeriodRange::year(2023));
    }
}
