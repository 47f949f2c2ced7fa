use serde::{Deserialize, Serialize};

/// Emission-producing activities tracked by the calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Diesel,
    Petrol,
    Coal,
    Lpg,
    Ch4,
    N2o,
}

/// Land-cover classes that sequester carbon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LandCover {
    Forest,
    Grassland,
}

/// One declared input field: key, display metadata, and its conversion factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec<K> {
    pub key: K,
    pub label: &'static str,
    pub unit: &'static str,
    pub factor: f64,
}

/// Emission factors, declared in form order.
/// Fuels are kg CO2e per unit; ch4 and n2o are per-mass GWP multipliers.
pub static EMISSION_SCHEMA: [FieldSpec<Activity>; 6] = [
    FieldSpec { key: Activity::Diesel, label: "Diesel", unit: "L", factor: 2.68 },
    FieldSpec { key: Activity::Petrol, label: "Petrol", unit: "L", factor: 2.31 },
    FieldSpec { key: Activity::Coal, label: "Coal", unit: "kg", factor: 2.42 },
    FieldSpec { key: Activity::Lpg, label: "LPG", unit: "kg", factor: 3.0 },
    FieldSpec { key: Activity::Ch4, label: "CH4", unit: "m³", factor: 670.0 },
    FieldSpec { key: Activity::N2o, label: "N2O", unit: "kg", factor: 298.0 },
];

/// Sequestration rates in t CO2e per hectare per year.
pub static SINK_SCHEMA: [FieldSpec<LandCover>; 2] = [
    FieldSpec { key: LandCover::Forest, label: "Forest", unit: "ha", factor: 6.0 },
    FieldSpec { key: LandCover::Grassland, label: "Grassland", unit: "ha", factor: 3.0 },
];

/// Factors are kg-scale; engine totals are tonnes.
pub const KG_PER_TONNE: f64 = 1000.0;

impl Activity {
    pub fn key(self) -> &'static str {
        match self {
            Activity::Diesel => "diesel",
            Activity::Petrol => "petrol",
            Activity::Coal => "coal",
            Activity::Lpg => "lpg",
            Activity::Ch4 => "ch4",
            Activity::N2o => "n2o",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        EMISSION_SCHEMA.iter().map(|f| f.key).find(|a| a.key() == key)
    }

    pub fn spec(self) -> &'static FieldSpec<Activity> {
        // Every variant is declared exactly once in EMISSION_SCHEMA, in variant order.
        &EMISSION_SCHEMA[self as usize]
    }

    pub fn factor(self) -> f64 {
        self.spec().factor
    }

    /// Column label used in report headers, e.g. `Diesel(L)`.
    pub fn column(self) -> String {
        let spec = self.spec();
        format!("{}({})", spec.label, spec.unit)
    }
}

impl LandCover {
    pub fn key(self) -> &'static str {
        match self {
            LandCover::Forest => "forest",
            LandCover::Grassland => "grassland",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        SINK_SCHEMA.iter().map(|f| f.key).find(|c| c.key() == key)
    }

    pub fn spec(self) -> &'static FieldSpec<LandCover> {
        &SINK_SCHEMA[self as usize]
    }

    pub fn rate(self) -> f64 {
        self.spec().factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_order_matches_variant_index() {
        for (i, spec) in EMISSION_SCHEMA.iter().enumerate() {
            assert_eq!(spec.key as usize, i);
            assert_eq!(Activity::from_key(spec.key.key()), Some(spec.key));
        }
        for (i, spec) in SINK_SCHEMA.iter().enumerate() {
            assert_eq!(spec.key as usize, i);
            assert_eq!(LandCover::from_key(spec.key.key()), Some(spec.key));
        }
    }

    #[test]
    fn test_factors_and_columns() {
        assert_eq!(Activity::Diesel.factor(), 2.68);
        assert_eq!(Activity::Ch4.factor(), 670.0);
        assert_eq!(LandCover::Forest.rate(), 6.0);
        assert_eq!(LandCover::Grassland.rate(), 3.0);
        assert_eq!(Activity::Ch4.column(), "CH4(m³)");
        assert_eq!(Activity::from_key("kerosene"), None);
    }

    #[test]
    fn test_serde_keys_are_lowercase() {
        let json = serde_json::to_string(&Activity::N2o).unwrap();
        assert_eq!(json, "\"n2o\"");
        let cover: LandCover = serde_json::from_str("\"grassland\"").unwrap();
        assert_eq!(cover, LandCover::Grassland);
    }
}
