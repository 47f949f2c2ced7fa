use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::engine::{net_emission, EmissionBreakdown};
use crate::pathway::{PathwayResult, PathwayResults, Strategy};
use crate::schema::Activity;

/// `16 Oct, 9:05`
pub const EMISSION_TIMESTAMP_FORMAT: &str = "%-d %b, %-H:%M";
/// `16/10/2026, 09:05:00`
pub const PATHWAY_TIMESTAMP_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";
/// `16 Oct 2026, 09:05`
pub const REPORT_TIMESTAMP_FORMAT: &str = "%d %b %Y, %H:%M";

fn default_included() -> bool {
    true
}

/// Anything kept in a [`crate::history::History`]: serializable and toggleable.
pub trait Snapshot: Serialize + for<'de> Deserialize<'de> {
    fn included(&self) -> bool;
    fn set_included(&mut self, included: bool);
    fn timestamp(&self) -> &str;
}

/// One saved emission/sink calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionSnapshot {
    pub emission: f64,
    pub sink: f64,
    pub net: f64,
    pub timestamp: String,
    #[serde(default = "default_included")]
    pub included: bool,
    #[serde(default)]
    pub sources: BTreeMap<Activity, f64>,
}

impl EmissionSnapshot {
    pub fn new(breakdown: &EmissionBreakdown, sink: f64, timestamp: impl Into<String>) -> Self {
        EmissionSnapshot {
            emission: breakdown.total,
            sink,
            net: net_emission(breakdown.total, sink),
            timestamp: timestamp.into(),
            included: true,
            sources: breakdown.sources.clone(),
        }
    }

    pub fn taken_at<Tz: TimeZone>(breakdown: &EmissionBreakdown, sink: f64, at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self::new(breakdown, sink, at.format(EMISSION_TIMESTAMP_FORMAT).to_string())
    }

    /// Per-activity emission, zero when the snapshot predates that activity.
    pub fn source(&self, activity: Activity) -> f64 {
        self.sources.get(&activity).copied().unwrap_or(0.0)
    }
}

impl Snapshot for EmissionSnapshot {
    fn included(&self) -> bool {
        self.included
    }

    fn set_included(&mut self, included: bool) {
        self.included = included;
    }

    fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

/// One saved set of pathway results. Strategies never calculated are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathwaySnapshot {
    pub afforestation: Option<PathwayResult>,
    pub methane: Option<PathwayResult>,
    pub renewable: Option<PathwayResult>,
    pub timestamp: String,
    #[serde(default = "default_included")]
    pub included: bool,
}

impl PathwaySnapshot {
    pub fn new(results: &PathwayResults, timestamp: impl Into<String>) -> Self {
        PathwaySnapshot {
            afforestation: results.afforestation,
            methane: results.methane,
            renewable: results.renewable,
            timestamp: timestamp.into(),
            included: true,
        }
    }

    pub fn taken_at<Tz: TimeZone>(results: &PathwayResults, at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self::new(results, at.format(PATHWAY_TIMESTAMP_FORMAT).to_string())
    }

    pub fn results(&self) -> PathwayResults {
        PathwayResults {
            afforestation: self.afforestation,
            methane: self.methane,
            renewable: self.renewable,
        }
    }

    pub fn get(&self, strategy: Strategy) -> Option<&PathwayResult> {
        match strategy {
            Strategy::Afforestation => self.afforestation.as_ref(),
            Strategy::Methane => self.methane.as_ref(),
            Strategy::Renewable => self.renewable.as_ref(),
        }
    }
}

impl Snapshot for PathwaySnapshot {
    fn included(&self) -> bool {
        self.included
    }

    fn set_included(&mut self, included: bool) {
        self.included = included;
    }

    fn timestamp(&self) -> &str {
        &self.timestamp
    }
}
