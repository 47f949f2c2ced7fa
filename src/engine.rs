use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schema::{Activity, LandCover, EMISSION_SCHEMA, KG_PER_TONNE, SINK_SCHEMA};

/// Activity quantities as entered, keyed by activity. Absent keys read as zero.
pub type Quantities = BTreeMap<Activity, f64>;

/// Sequestration areas in hectares, keyed by land cover. Absent keys read as zero.
pub type Areas = BTreeMap<LandCover, f64>;

/// Result of an emission calculation: per-activity t CO2e and their total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmissionBreakdown {
    pub sources: BTreeMap<Activity, f64>,
    pub total: f64,
}

/// Coerce a raw form value into a quantity.
///
/// Reads the longest leading decimal number (sign, digits, fraction, exponent)
/// after any leading whitespace. Unparsable, non-finite, and zero-valued input
/// all come back as `0.0`, so a blank or garbled field never blocks a calculation.
pub fn parse_quantity(raw: &str) -> f64 {
    let s = raw.trim_start();
    let b = s.as_bytes();

    let mut end = 0;
    if matches!(b.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_start = end;
    while end < b.len() && b[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < b.len() && b[end] == b'.' {
        let frac_start = end + 1;
        let mut j = frac_start;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        digits += j - frac_start;
        if digits > 0 {
            end = j;
        }
    }
    if digits == 0 {
        return 0.0;
    }

    if end < b.len() && matches!(b[end], b'e' | b'E') {
        let mut j = end + 1;
        if j < b.len() && matches!(b[j], b'+' | b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            end = j;
        }
    }

    match s[..end].parse::<f64>() {
        Ok(v) if v.is_finite() && v != 0.0 => v,
        _ => 0.0,
    }
}

/// Build quantities from `(field key, raw value)` pairs, ignoring unknown keys.
pub fn quantities_from_form<'a, I>(fields: I) -> Quantities
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    fields
        .into_iter()
        .filter_map(|(key, raw)| Activity::from_key(key).map(|a| (a, parse_quantity(raw))))
        .collect()
}

/// Build sink areas from `(field key, raw value)` pairs, ignoring unknown keys.
pub fn areas_from_form<'a, I>(fields: I) -> Areas
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    fields
        .into_iter()
        .filter_map(|(key, raw)| LandCover::from_key(key).map(|c| (c, parse_quantity(raw))))
        .collect()
}

fn finite_or_zero(v: Option<&f64>) -> f64 {
    v.copied().filter(|x| x.is_finite()).unwrap_or(0.0)
}

/// Per-activity emission in tonnes: quantity x factor / 1000, summed over every
/// declared activity. Every declared activity appears in `sources`.
pub fn compute_emissions(quantities: &Quantities) -> EmissionBreakdown {
    let mut out = EmissionBreakdown::default();
    for spec in EMISSION_SCHEMA.iter() {
        let qty = finite_or_zero(quantities.get(&spec.key));
        let tonnes = (qty * spec.factor) / KG_PER_TONNE;
        out.sources.insert(spec.key, tonnes);
        out.total += tonnes;
    }
    debug!(total = out.total, "computed emissions");
    out
}

/// Annual sequestration in t CO2e: sum of area x rate.
pub fn compute_sink(areas: &Areas) -> f64 {
    let total = SINK_SCHEMA
        .iter()
        .map(|spec| finite_or_zero(areas.get(&spec.key)) * spec.factor)
        .sum();
    debug!(total, "computed sink");
    total
}

/// Net emission; negative means the site absorbs more than it emits.
pub fn net_emission(total_emission: f64, total_sink: f64) -> f64 {
    total_emission - total_sink
}
