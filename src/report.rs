//! CSV exports.
//!
//! Writers here serialize exactly the sequence they are handed. Windowing and
//! `included` filtering belong to the caller. Fields are written unquoted; every
//! value is numeric or comes from one of the fixed timestamp formats.

use std::fmt::Write;

use crate::pathway::{PathwayResult, Strategy};
use crate::schema::EMISSION_SCHEMA;
use crate::snapshot::{EmissionSnapshot, PathwaySnapshot};

pub const EMISSION_REPORT_FILE: &str = "ZeroSphere_Report.csv";
pub const PATHWAY_REPORT_FILE: &str = "ZeroSphere_Pathway_Report.csv";
pub const PROFILE_REPORT_FILE: &str = "ZeroSphere_ProfileData.csv";

pub const PATHWAY_HEADER: &str =
    "Method,Prior Emission (t CO₂e),New Emission (t CO₂e),Reduction/Sink (t CO₂e),Credits (₹)";

/// Placeholder for an absent display field.
const MISSING: &str = "--";

/// Enough fractional digits to print any finite f64 exactly.
const EXACT_DIGITS: usize = 1100;

/// Fixed-point rendering with `digits` decimals. Exact ties round away from
/// zero (`562.5` -> `563`, `0.125` -> `0.13`); everything else rounds to nearest.
/// Magnitudes of `1e21` and above fall back to [`number_cell`].
pub fn to_fixed(x: f64, digits: usize) -> String {
    if !x.is_finite() || x.abs() >= 1e21 {
        return number_cell(x);
    }
    let magnitude = x.abs();
    let exact = format!("{:.*}", EXACT_DIGITS.max(digits + 1), magnitude);
    let point = exact.find('.').unwrap_or(exact.len());
    let tail = &exact[point + 1 + digits..];
    let tie = tail.starts_with('5') && tail[1..].bytes().all(|b| b == b'0');

    let body = if tie {
        let kept = if digits == 0 { &exact[..point] } else { &exact[..point + 1 + digits] };
        increment_last_digit(kept)
    } else {
        format!("{:.*}", digits, magnitude)
    };
    if x < 0.0 {
        format!("-{body}")
    } else {
        body
    }
}

fn increment_last_digit(digits: &str) -> String {
    let mut bytes = digits.as_bytes().to_vec();
    let mut i = bytes.len();
    loop {
        if i == 0 {
            bytes.insert(0, b'1');
            break;
        }
        i -= 1;
        match bytes[i] {
            b'.' => continue,
            b'9' => bytes[i] = b'0',
            _ => {
                bytes[i] += 1;
                break;
            }
        }
    }
    bytes.into_iter().map(char::from).collect()
}

/// Shortest round-trip rendering of a CSV number. Magnitudes below `1e-6` or
/// at least `1e21` use exponent form with a signed exponent (`1e-7`, `1e+21`).
pub fn number_cell(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if x == 0.0 {
        return "0".to_string();
    }
    let magnitude = x.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return x.to_string();
    }
    let sci = format!("{x:e}");
    match sci.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => sci,
    }
}

/// `Date,Timestamp,Emission(t),Sink(t),Net(t),Diesel(L),...,N2O(kg)`
pub fn emission_header() -> String {
    emission_header_with("Date,Timestamp")
}

fn emission_header_with(lead: &str) -> String {
    let mut header = format!("{lead},Emission(t),Sink(t),Net(t)");
    for spec in EMISSION_SCHEMA.iter() {
        header.push(',');
        header.push_str(&spec.key.column());
    }
    header
}

/// Split a display timestamp at its first `", "` into date and time columns.
pub fn split_timestamp(timestamp: &str) -> (&str, &str) {
    match timestamp.split_once(", ") {
        Some((date, time)) => (date, time),
        None if timestamp.is_empty() => (MISSING, MISSING),
        None => (timestamp, MISSING),
    }
}

fn push_emission_row(out: &mut String, s: &EmissionSnapshot) {
    let (date, time) = split_timestamp(&s.timestamp);
    // Writing into a String never fails.
    let _ = write!(
        out,
        "{date},{time},{},{},{}",
        number_cell(s.emission),
        number_cell(s.sink),
        number_cell(s.net)
    );
    for spec in EMISSION_SCHEMA.iter() {
        let _ = write!(out, ",{}", number_cell(s.source(spec.key)));
    }
    out.push('\n');
}

/// Emissions report: header line, then one row per snapshot, each newline-terminated.
pub fn emissions_csv(snapshots: &[EmissionSnapshot]) -> String {
    let mut out = emission_header();
    out.push('\n');
    for s in snapshots {
        push_emission_row(&mut out, s);
    }
    out
}

/// `prior,new,reduction,credits` at report precision.
pub fn pathway_cells(result: &PathwayResult) -> String {
    format!(
        "{},{},{},{}",
        to_fixed(result.prior, 2),
        to_fixed(result.new_emission, 2),
        to_fixed(result.reduction, 2),
        to_fixed(result.credits, 0)
    )
}

/// Pathway report: title with generation time, header, one row per strategy given.
/// Lines are joined with `\n`; there is no trailing newline.
pub fn pathway_csv<'a, I>(rows: I, generated: &str) -> String
where
    I: IntoIterator<Item = (Strategy, &'a PathwayResult)>,
{
    let mut lines = vec![
        format!("ZeroSphere Pathway Report (Generated: {generated})"),
        PATHWAY_HEADER.to_string(),
    ];
    for (strategy, result) in rows {
        lines.push(format!("{},{}", strategy.label(), pathway_cells(result)));
    }
    lines.join("\n")
}

/// Combined export of a user's saved calculator and pathway results.
pub fn profile_csv(emissions: &[EmissionSnapshot], pathways: &[PathwaySnapshot]) -> String {
    let mut out = String::from("Calculator Results\n");
    out.push_str(&emission_header_with("Date,Time"));
    out.push('\n');
    for s in emissions {
        push_emission_row(&mut out, s);
    }

    out.push_str("\n\nPathway Results\n");
    out.push_str("Date,Time,");
    out.push_str(PATHWAY_HEADER);
    out.push('\n');
    for p in pathways {
        let (date, time) = split_timestamp(&p.timestamp);
        for strategy in Strategy::ALL {
            if let Some(r) = p.get(strategy) {
                let _ = writeln!(
                    out,
                    "{date},{time},{},{},{},{},{}",
                    strategy.label(),
                    number_cell(r.prior),
                    number_cell(r.new_emission),
                    number_cell(r.reduction),
                    number_cell(r.credits)
                );
            }
        }
    }
    out
}
