//! Label/value series handed to whatever draws the charts.

use serde::Serialize;

use crate::engine::{net_emission, EmissionBreakdown};
use crate::pathway::{PathwayResults, StrategyVisibility};
use crate::schema::EMISSION_SCHEMA;
use crate::snapshot::EmissionSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub label: &'static str,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LineChart {
    pub labels: Vec<String>,
    pub series: Vec<Series>,
}

/// Which history lines to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryVisibility {
    pub emission: bool,
    pub sink: bool,
    pub net: bool,
}

impl Default for HistoryVisibility {
    fn default() -> Self {
        HistoryVisibility {
            emission: true,
            sink: true,
            net: true,
        }
    }
}

/// Per-activity share of the current calculation, in schema order.
pub fn breakdown_slices(breakdown: &EmissionBreakdown) -> Vec<(&'static str, f64)> {
    EMISSION_SCHEMA
        .iter()
        .map(|spec| {
            let v = breakdown.sources.get(&spec.key).copied().unwrap_or(0.0);
            (spec.label, v)
        })
        .collect()
}

pub fn totals_bars(total_emission: f64, total_sink: f64) -> [(&'static str, f64); 3] {
    [
        ("Total Emission", total_emission),
        ("Sink", total_sink),
        ("Net Emission", net_emission(total_emission, total_sink)),
    ]
}

/// Lines over a history window. Excluded entries are skipped.
pub fn history_lines(window: &[EmissionSnapshot], visibility: HistoryVisibility) -> LineChart {
    let shown: Vec<&EmissionSnapshot> = window.iter().filter(|e| e.included).collect();
    let mut chart = LineChart {
        labels: shown.iter().map(|e| e.timestamp.clone()).collect(),
        series: Vec::new(),
    };
    let wanted: [(bool, &'static str, fn(&EmissionSnapshot) -> f64); 3] = [
        (visibility.emission, "Emission", |e| e.emission),
        (visibility.sink, "Sink", |e| e.sink),
        (visibility.net, "Net", |e| e.net),
    ];
    for (on, label, pick) in wanted {
        if on {
            chart.series.push(Series {
                label,
                values: shown.iter().map(|e| pick(e)).collect(),
            });
        }
    }
    chart
}

/// Reduction per visible, calculated strategy.
pub fn pathway_bars(results: &PathwayResults, visibility: StrategyVisibility) -> Vec<(&'static str, f64)> {
    results
        .iter()
        .filter(|(s, _)| visibility.is_visible(*s))
        .map(|(s, r)| (s.label(), r.reduction))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathway::{PathwayResult, Strategy};

    fn entry(emission: f64, sink: f64, ts: &str, included: bool) -> EmissionSnapshot {
        let breakdown = EmissionBreakdown {
            total: emission,
            ..Default::default()
        };
        let mut e = EmissionSnapshot::new(&breakdown, sink, ts);
        e.included = included;
        e
    }

    #[test]
    fn test_history_lines_skip_excluded() {
        let window = [
            entry(5.0, 1.0, "a", true),
            entry(7.0, 2.0, "b", false),
            entry(9.0, 3.0, "c", true),
        ];
        let chart = history_lines(&window, HistoryVisibility::default());
        assert_eq!(chart.labels, vec!["a", "c"]);
        assert_eq!(chart.series.len(), 3);
        assert_eq!(chart.series[2].label, "Net");
        assert_eq!(chart.series[2].values, vec![4.0, 6.0]);

        let only_sink = HistoryVisibility {
            emission: false,
            sink: true,
            net: false,
        };
        let chart = history_lines(&window, only_sink);
        assert_eq!(chart.series.len(), 1);
        assert_eq!(chart.series[0].values, vec![1.0, 3.0]);
    }

    #[test]
    fn test_totals_and_slices() {
        let bars = totals_bars(3.0, 5.0);
        assert_eq!(bars[2], ("Net Emission", -2.0));
        let slices = breakdown_slices(&EmissionBreakdown::default());
        assert_eq!(slices.len(), 6);
        assert_eq!(slices[0], ("Diesel", 0.0));
    }

    #[test]
    fn test_pathway_bars_respect_visibility() {
        let mut results = PathwayResults::default();
        results.set(Strategy::Afforestation, PathwayResult::from_reduction(10.0, 6.0));
        results.set(Strategy::Methane, PathwayResult::from_reduction(10.0, 1.34));
        let mut vis = StrategyVisibility::default();
        assert_eq!(pathway_bars(&results, vis).len(), 2);
        vis.set(Strategy::Afforestation, false);
        assert_eq!(pathway_bars(&results, vis), vec![("Methane Capture", 1.34)]);
    }
}
