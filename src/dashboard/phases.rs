use crate::power::{classify, Classification, Phase, PowerDelta, PowerSnapshot};

/// What a phase card shows for one reading.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseView {
    pub phase: Phase,
    pub watts: f64,
    pub classification: Classification,
    /// Magnitude with one decimal, e.g. `"300.0 W"`.
    pub display: String,
    /// Compact magnitude for the mini cards, e.g. `"300W"`.
    pub compact: String,
    pub label: &'static str,
}

impl PhaseView {
    pub fn new(phase: Phase, watts: f64) -> Self {
        let classification = classify(watts);
        let magnitude = watts.abs();
        let label = match classification {
            Classification::Solar => "Solar generation",
            Classification::Consumption => "Household consumption",
        };

        Self {
            phase,
            watts,
            classification,
            display: format!("{:.1} W", round_half_up(magnitude, 1)),
            compact: format!("{:.0}W", round_half_up(magnitude, 0)),
            label,
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self.classification {
            Classification::Solar => "solar",
            Classification::Consumption => "consumption",
        }
    }
}

/// Ties round up, so `0.5` shows as `1` rather than the formatter's `0`.
fn round_half_up(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Client-side copy of the three phases, merged from snapshot and update frames.
#[derive(Debug, Clone, Default)]
pub struct PhaseState {
    values: PowerSnapshot,
}

impl PhaseState {
    /// Merge a delta and return a view for every phase it touched.
    pub fn merge(&mut self, delta: &PowerDelta) -> Vec<PhaseView> {
        delta
            .readings()
            .map(|reading| {
                self.values.set(reading.phase, reading.power_watts);
                PhaseView::new(reading.phase, reading.power_watts)
            })
            .collect()
    }

    pub fn snapshot(&self) -> PowerSnapshot {
        self.values
    }

    pub fn solar_surplus(&self) -> [f64; 3] {
        self.values.solar_surplus()
    }

    pub fn total(&self) -> f64 {
        self.values.total()
    }

    pub fn total_solar(&self) -> f64 {
        self.values.total_solar()
    }
}
