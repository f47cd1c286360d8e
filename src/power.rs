//! Phase readings and the snapshot/delta types shared by the relay and the dashboard.
//!
//! Sign convention for every watt value: negative means solar generation exceeds
//! local consumption on that phase, positive means net consumption.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One of the three independently metered circuits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Phase {
    L0,
    L1,
    L2,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::L0, Phase::L1, Phase::L2];

    pub fn index(self) -> usize {
        match self {
            Phase::L0 => 0,
            Phase::L1 => 1,
            Phase::L2 => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Phase> {
        Phase::ALL.get(index).copied()
    }

    /// Wire key used in snapshot and update frames.
    pub fn key(self) -> &'static str {
        match self {
            Phase::L0 => "phase0",
            Phase::L1 => "phase1",
            Phase::L2 => "phase2",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.index())
    }
}

impl TryFrom<u8> for Phase {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Phase::from_index(value as usize)
            .ok_or_else(|| format!("phase index must be 0, 1 or 2, got {}", value))
    }
}

impl From<Phase> for u8 {
    fn from(phase: Phase) -> u8 {
        phase.index() as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseReading {
    pub phase: Phase,
    pub power_watts: f64,
}

/// How a single phase value is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Solar,
    Consumption,
}

/// Strictly negative values are solar generation; zero counts as consumption.
pub fn classify(watts: f64) -> Classification {
    if watts < 0.0 {
        Classification::Solar
    } else {
        Classification::Consumption
    }
}

/// Surplus available for appliances on a phase: the magnitude of a negative value, else zero.
pub fn solar_surplus(watts: f64) -> f64 {
    if watts < 0.0 {
        watts.abs()
    } else {
        0.0
    }
}

/// Current value of all three phases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerSnapshot {
    pub phase0: f64,
    pub phase1: f64,
    pub phase2: f64,
}

impl PowerSnapshot {
    pub fn get(&self, phase: Phase) -> f64 {
        match phase {
            Phase::L0 => self.phase0,
            Phase::L1 => self.phase1,
            Phase::L2 => self.phase2,
        }
    }

    pub fn set(&mut self, phase: Phase, watts: f64) {
        match phase {
            Phase::L0 => self.phase0 = watts,
            Phase::L1 => self.phase1 = watts,
            Phase::L2 => self.phase2 = watts,
        }
    }

    /// Merge a delta; phases the delta does not mention keep their value.
    pub fn apply(&mut self, delta: &PowerDelta) {
        for reading in delta.readings() {
            self.set(reading.phase, reading.power_watts);
        }
    }

    pub fn values(&self) -> [f64; 3] {
        [self.phase0, self.phase1, self.phase2]
    }

    pub fn solar_surplus(&self) -> [f64; 3] {
        self.values().map(solar_surplus)
    }

    pub fn total(&self) -> f64 {
        self.values().iter().sum()
    }

    pub fn total_solar(&self) -> f64 {
        self.solar_surplus().iter().sum()
    }

    /// Full snapshot expressed as a delta carrying every phase.
    pub fn to_delta(&self) -> PowerDelta {
        PowerDelta {
            phase0: Some(self.phase0),
            phase1: Some(self.phase1),
            phase2: Some(self.phase2),
        }
    }
}

/// Partial update: only the phases that changed are present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase0: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase2: Option<f64>,
}

impl PowerDelta {
    pub fn single(phase: Phase, watts: f64) -> Self {
        let mut delta = PowerDelta::default();
        delta.set(phase, watts);
        delta
    }

    pub fn get(&self, phase: Phase) -> Option<f64> {
        match phase {
            Phase::L0 => self.phase0,
            Phase::L1 => self.phase1,
            Phase::L2 => self.phase2,
        }
    }

    pub fn set(&mut self, phase: Phase, watts: f64) {
        match phase {
            Phase::L0 => self.phase0 = Some(watts),
            Phase::L1 => self.phase1 = Some(watts),
            Phase::L2 => self.phase2 = Some(watts),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.readings().next().is_none()
    }

    /// Present phases in index order.
    pub fn readings(&self) -> impl Iterator<Item = PhaseReading> + '_ {
        Phase::ALL.into_iter().filter_map(move |phase| {
            self.get(phase).map(|power_watts| PhaseReading { phase, power_watts })
        })
    }

    /// Build a delta from an untyped JSON object, keeping only phase keys whose
    /// value is a finite number or a string holding one.
    pub fn from_json_lenient(value: &Value) -> PowerDelta {
        let mut delta = PowerDelta::default();
        let Some(object) = value.as_object() else {
            return delta;
        };

        for phase in Phase::ALL {
            let parsed = match object.get(phase.key()) {
                Some(Value::Number(n)) => n.as_f64(),
                Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            if let Some(watts) = parsed.filter(|w| w.is_finite()) {
                delta.set(phase, watts);
            }
        }

        delta
    }
}
