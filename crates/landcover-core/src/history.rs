//! Per-year statistics kept for the session, and the cross-year views built
//! from them (coverage table rows, bar-chart series).
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::legend::ClassTable;
use crate::overlay::StatsSink;
use crate::stats::ClassStat;

/// Statistics keyed by year. A later delivery for the same year replaces
/// the earlier one.
#[derive(Debug, Clone, Default)]
pub struct StatsHistory {
    by_year: BTreeMap<i32, Vec<ClassStat>>,
}

impl StatsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, year: i32, stats: Vec<ClassStat>) {
        self.by_year.insert(year, stats);
    }

    pub fn get(&self, year: i32) -> Option<&[ClassStat]> {
        self.by_year.get(&year).map(Vec::as_slice)
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.by_year.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_year.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_year.is_empty()
    }

    /// `(label, percent)` rows for one year's coverage table.
    pub fn table_rows(&self, year: i32, classes: &ClassTable) -> Option<Vec<TableRow>> {
        let stats = self.by_year.get(&year)?;
        Some(
            stats
                .iter()
                .map(|s| TableRow {
                    label: classes.label(s.class_id).into_owned(),
                    percent: s.percent,
                    area_km2: s.area_km2_rounded(),
                })
                .collect(),
        )
    }

    /// Pivot all recorded years into chart series: one row per year, one
    /// column per class label.
    pub fn comparison(&self, classes: &ClassTable) -> YearComparison {
        let mut labels: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        let mut rows = Vec::with_capacity(self.by_year.len());

        for (&year, stats) in &self.by_year {
            let mut values = BTreeMap::new();
            for s in stats {
                let label = classes.label(s.class_id).into_owned();
                if seen.insert(label.clone()) {
                    labels.push(label.clone());
                }
                values.insert(label, s.percent);
            }
            rows.push(YearRow { year, values });
        }

        let colors = labels
            .iter()
            .map(|l| {
                classes
                    .classes()
                    .iter()
                    .find(|c| &c.name == l)
                    .map_or(CHART_FALLBACK_COLOR.to_string(), |c| c.color.to_string())
            })
            .collect();

        YearComparison { classes: labels, colors, rows }
    }
}

/// Shared history: the borrow lasts only for the insert, so readers of the
/// same cell are free once delivery returns.
impl StatsSink for RefCell<StatsHistory> {
    fn on_stats_ready(&self, year: i32, stats: &[ClassStat]) {
        self.borrow_mut().record(year, stats.to_vec());
    }
}

/// Bar color for labels with no configured class.
pub const CHART_FALLBACK_COLOR: &str = "#8884d8";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub label: String,
    pub percent: f64,
    pub area_km2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearRow {
    pub year: i32,
    /// Class label → percent of scene.
    pub values: BTreeMap<String, f64>,
}

/// Cross-year comparison, shaped for a grouped bar chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearComparison {
    /// Unique class labels in first-seen order.
    pub classes: Vec<String>,
    /// Bar color per entry of `classes`.
    pub colors: Vec<String>,
    /// Ascending by year.
    pub rows: Vec<YearRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(class_id: u16, percent: f64) -> ClassStat {
        ClassStat { class_id, pixel_count: 1, area_km2: 0.0, percent }
    }

    #[test]
    fn comparison_pivots_by_year_and_label() {
        let mut h = StatsHistory::new();
        h.record(2022, vec![stat(1, 40.0), stat(4, 5.0)]);
        h.record(2007, vec![stat(1, 50.0), stat(3, 20.0), stat(7, 1.0)]);

        let cmp = h.comparison(&ClassTable::mangrove());
        assert_eq!(cmp.rows.iter().map(|r| r.year).collect::<Vec<_>>(), vec![2007, 2022]);
        assert_eq!(cmp.classes, vec!["Mangrove Forest", "Water", "Class 7", "Prosopis"]);
        assert_eq!(cmp.colors[0], "#2ca02c");
        assert_eq!(cmp.colors[2], CHART_FALLBACK_COLOR);
        assert_eq!(cmp.rows[1].values["Prosopis"], 5.0);
        assert!(!cmp.rows[0].values.contains_key("Prosopis"));
    }

    #[test]
    fn sink_records_latest_delivery() {
        let h = RefCell::new(StatsHistory::new());
        h.on_stats_ready(2012, &[stat(2, 10.0)]);
        h.on_stats_ready(2012, &[stat(2, 12.5)]);
        let h = h.into_inner();
        assert_eq!(h.len(), 1);
        assert_eq!(h.get(2012).unwrap()[0].percent, 12.5);
    }

    #[test]
    fn table_rows_use_fallback_label() {
        let mut h = StatsHistory::new();
        h.record(2017, vec![stat(2, 33.33), stat(12, 0.5)]);
        let rows = h.table_rows(2017, &ClassTable::mangrove()).unwrap();
        assert_eq!(rows[0].label, "Bare Land");
        assert_eq!(rows[1].label, "Class 12");
        assert!(h.table_rows(2025, &ClassTable::mangrove()).is_none());
    }
}
