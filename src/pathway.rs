use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cost of one unit of each offset action, in rupees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostTable {
    /// per hectare planted
    pub afforestation: f64,
    /// per tonne of CH4 captured
    pub methane: f64,
    /// per MWh replaced
    pub renewable: f64,
}

/// Emission reduction yielded by one unit of each offset action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorTable {
    /// t CO2e per hectare per year
    pub affor_sink_per_ha: f64,
    /// t CO2e per tonne of CH4
    pub methane_per_ton: f64,
    /// t CO2e per MWh
    pub renew_per_mwh: f64,
}

pub const COST: CostTable = CostTable {
    afforestation: 10_000.0,
    methane: 25_000.0,
    renewable: 80_000.0,
};

pub const FACTOR: FactorTable = FactorTable {
    affor_sink_per_ha: 6.0,
    methane_per_ton: 0.67,
    renew_per_mwh: 0.72,
};

/// Rupees credited per tonne of CO2e reduced.
pub const CREDIT_PRICE: f64 = 1000.0;

/// Offset strategies, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Afforestation,
    Methane,
    Renewable,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Afforestation, Strategy::Methane, Strategy::Renewable];

    pub fn label(self) -> &'static str {
        match self {
            Strategy::Afforestation => "Afforestation",
            Strategy::Methane => "Methane Capture",
            Strategy::Renewable => "Renewable Energy",
        }
    }

    /// Achievable reduction in t CO2e for the given budget and land.
    pub fn reduction(self, fund: f64, land: f64) -> f64 {
        match self {
            Strategy::Afforestation => achievable_area(fund, land) * FACTOR.affor_sink_per_ha,
            Strategy::Methane => (fund / COST.methane) * FACTOR.methane_per_ton,
            Strategy::Renewable => (fund / COST.renewable) * FACTOR.renew_per_mwh,
        }
    }

    /// Apply this strategy to the shared input triple.
    pub fn evaluate(self, inputs: &PathwayInputs) -> PathwayResult {
        let reduction = self.reduction(inputs.fund, inputs.land);
        let result = PathwayResult::from_reduction(inputs.current_emission, reduction);
        debug!(strategy = self.label(), reduction, credits = result.credits, "evaluated pathway");
        result
    }
}

/// Plantable hectares: bounded by both the available land and what the fund buys.
pub fn achievable_area(fund: f64, land: f64) -> f64 {
    land.min(fund / COST.afforestation)
}

/// The input triple shared by every strategy. An unset baseline is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PathwayInputs {
    pub fund: f64,
    pub land: f64,
    pub current_emission: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathwayResult {
    pub prior: f64,
    pub new_emission: f64,
    pub reduction: f64,
    pub credits: f64,
}

impl PathwayResult {
    /// Clamp the post-reduction emission at zero and price the reduction.
    pub fn from_reduction(prior: f64, reduction: f64) -> Self {
        PathwayResult {
            prior,
            new_emission: (prior - reduction).max(0.0),
            reduction,
            credits: reduction * CREDIT_PRICE,
        }
    }
}

/// Latest result per strategy; `None` until that strategy has been calculated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PathwayResults {
    pub afforestation: Option<PathwayResult>,
    pub methane: Option<PathwayResult>,
    pub renewable: Option<PathwayResult>,
}

impl PathwayResults {
    pub fn get(&self, strategy: Strategy) -> Option<&PathwayResult> {
        match strategy {
            Strategy::Afforestation => self.afforestation.as_ref(),
            Strategy::Methane => self.methane.as_ref(),
            Strategy::Renewable => self.renewable.as_ref(),
        }
    }

    pub fn set(&mut self, strategy: Strategy, result: PathwayResult) {
        let slot = match strategy {
            Strategy::Afforestation => &mut self.afforestation,
            Strategy::Methane => &mut self.methane,
            Strategy::Renewable => &mut self.renewable,
        };
        *slot = Some(result);
    }

    pub fn is_empty(&self) -> bool {
        Strategy::ALL.iter().all(|s| self.get(*s).is_none())
    }

    /// Present results in display order.
    pub fn iter(&self) -> impl Iterator<Item = (Strategy, &PathwayResult)> + '_ {
        Strategy::ALL
            .into_iter()
            .filter_map(move |s| self.get(s).map(|r| (s, r)))
    }
}

/// Show/hide flags for the chart and the pathway report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyVisibility {
    pub afforestation: bool,
    pub methane: bool,
    pub renewable: bool,
}

impl Default for StrategyVisibility {
    fn default() -> Self {
        StrategyVisibility {
            afforestation: true,
            methane: true,
            renewable: true,
        }
    }
}

impl StrategyVisibility {
    pub fn is_visible(&self, strategy: Strategy) -> bool {
        match strategy {
            Strategy::Afforestation => self.afforestation,
            Strategy::Methane => self.methane,
            Strategy::Renewable => self.renewable,
        }
    }

    pub fn set(&mut self, strategy: Strategy, visible: bool) {
        match strategy {
            Strategy::Afforestation => self.afforestation = visible,
            Strategy::Methane => self.methane = visible,
            Strategy::Renewable => self.renewable = visible,
        }
    }
}
