//! Appliance catalogue and the affordability evaluator.

use crate::power::Phase;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffordabilityState {
    NoSolar,
    PartialSolar,
    FullSolar,
}

impl AffordabilityState {
    pub fn css_class(self) -> &'static str {
        match self {
            AffordabilityState::NoSolar => "no-solar",
            AffordabilityState::PartialSolar => "partial-solar",
            AffordabilityState::FullSolar => "full-solar",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            AffordabilityState::NoSolar => "You would pay the grid",
            AffordabilityState::PartialSolar => "You would save some",
            AffordabilityState::FullSolar => "Running it is FREE",
        }
    }
}

/// Classify an appliance against the surplus on its own phase.
///
/// A surplus equal to `max_consumption` is enough to cover the appliance.
/// `min_consumption` does not influence the result; it is kept so callers pass
/// the full range.
pub fn evaluate(
    solar_surplus: f64,
    _min_consumption: f64,
    max_consumption: f64,
) -> AffordabilityState {
    if solar_surplus <= 0.0 {
        AffordabilityState::NoSolar
    } else if solar_surplus >= max_consumption {
        AffordabilityState::FullSolar
    } else {
        AffordabilityState::PartialSolar
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Appliance {
    pub name: String,
    pub phase: Phase,
    /// `(min, max)`; equal when consumption is fixed.
    pub consumption_range_watts: (f64, f64),
}

impl Appliance {
    pub fn new(name: impl Into<String>, phase: Phase, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            phase,
            consumption_range_watts: (min, max),
        }
    }

    pub fn fixed(name: impl Into<String>, phase: Phase, watts: f64) -> Self {
        Self::new(name, phase, watts, watts)
    }

    /// Affordability given the per-phase surplus array.
    pub fn affordability(&self, surplus_by_phase: &[f64; 3]) -> AffordabilityState {
        let (min, max) = self.consumption_range_watts;
        evaluate(surplus_by_phase[self.phase.index()], min, max)
    }

    pub fn consumption_text(&self) -> String {
        let (min, max) = self.consumption_range_watts;
        if min == max {
            format!("{} W", min)
        } else {
            format!("{}-{} W", min, max)
        }
    }
}

/// Catalogue entry as written in YAML: one or more watt figures.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplianceSpec {
    pub name: String,
    pub phase: Phase,
    pub consumption: Vec<f64>,
}

impl TryFrom<ApplianceSpec> for Appliance {
    type Error = String;

    fn try_from(spec: ApplianceSpec) -> Result<Self, Self::Error> {
        if spec.name.trim().is_empty() {
            return Err("appliance name cannot be empty".to_string());
        }
        if spec.consumption.is_empty() {
            return Err(format!("appliance {} has no consumption figures", spec.name));
        }
        if spec.consumption.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(format!(
                "appliance {} has an invalid consumption figure",
                spec.name
            ));
        }

        let min = spec.consumption.iter().copied().fold(f64::INFINITY, f64::min);
        let max = spec
            .consumption
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        Ok(Appliance::new(spec.name, spec.phase, min, max))
    }
}

/// Household appliances the dashboard ships with.
pub fn default_catalogue() -> Vec<Appliance> {
    vec![
        Appliance::fixed("Oven", Phase::L0, 2000.0),
        Appliance::new("Hob", Phase::L0, 1000.0, 2000.0),
        Appliance::fixed("Dishwasher", Phase::L0, 1100.0),
        Appliance::new("Fridge", Phase::L0, 10.0, 140.0),
        Appliance::new("Laptop", Phase::L0, 30.0, 60.0),
        Appliance::fixed("NAS", Phase::L0, 50.0),
        Appliance::fixed("Stair light", Phase::L0, 20.0),
        Appliance::fixed("Kitchen light", Phase::L0, 50.0),
        Appliance::fixed("Washing machine", Phase::L1, 1000.0),
        Appliance::fixed("Air conditioning", Phase::L1, 20.0),
        Appliance::fixed("Basement fridges", Phase::L2, 150.0),
        Appliance::fixed("Microwave", Phase::L2, 400.0),
        Appliance::fixed("Toaster", Phase::L2, 1000.0),
        Appliance::fixed("Coffee maker", Phase::L2, 1500.0),
        Appliance::new("Bread maker", Phase::L2, 700.0, 1000.0),
        Appliance::fixed("Desktop computers", Phase::L2, 300.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_surplus_is_no_solar() {
        assert_eq!(evaluate(0.0, 0.0, 0.0), AffordabilityState::NoSolar);
        assert_eq!(evaluate(0.0, 100.0, 400.0), AffordabilityState::NoSolar);
        assert_eq!(evaluate(0.0, 50.0, 50.0), AffordabilityState::NoSolar);
    }

    #[test]
    fn test_surplus_at_or_above_max_is_full_solar() {
        assert_eq!(evaluate(400.0, 100.0, 400.0), AffordabilityState::FullSolar);
        assert_eq!(evaluate(401.0, 100.0, 400.0), AffordabilityState::FullSolar);
        assert_eq!(evaluate(300.0, 50.0, 50.0), AffordabilityState::FullSolar);
    }

    #[test]
    fn test_surplus_below_max_is_partial() {
        assert_eq!(evaluate(300.0, 100.0, 400.0), AffordabilityState::PartialSolar);
        assert_eq!(evaluate(0.5, 1.0, 1.0), AffordabilityState::PartialSolar);
        // below min still counts as partial
        assert_eq!(evaluate(50.0, 100.0, 400.0), AffordabilityState::PartialSolar);
    }

    #[test]
    fn test_phases_do_not_pool_surplus() {
        let surplus = [300.0, 0.0, 0.0];

        let on_l0 = Appliance::new("Toaster", Phase::L0, 100.0, 400.0);
        let fixed_l0 = Appliance::fixed("Lamp", Phase::L0, 50.0);
        let on_l1 = Appliance::fixed("Lamp", Phase::L1, 1.0);
        let on_l2 = Appliance::fixed("Lamp", Phase::L2, 1.0);

        assert_eq!(on_l0.affordability(&surplus), AffordabilityState::PartialSolar);
        assert_eq!(fixed_l0.affordability(&surplus), AffordabilityState::FullSolar);
        assert_eq!(on_l1.affordability(&surplus), AffordabilityState::NoSolar);
        assert_eq!(on_l2.affordability(&surplus), AffordabilityState::NoSolar);
    }

    #[test]
    fn test_consumption_text() {
        assert_eq!(Appliance::fixed("Oven", Phase::L0, 2000.0).consumption_text(), "2000 W");
        assert_eq!(
            Appliance::new("Hob", Phase::L0, 1000.0, 2000.0).consumption_text(),
            "1000-2000 W"
        );
    }

    #[test]
    fn test_spec_range_is_min_max_of_figures() {
        let spec = ApplianceSpec {
            name: "Fridge".to_string(),
            phase: Phase::L0,
            consumption: vec![10.0, 40.0, 140.0],
        };
        let appliance = Appliance::try_from(spec).unwrap();
        assert_eq!(appliance.consumption_range_watts, (10.0, 140.0));
    }

    #[test]
    fn test_spec_rejects_empty_or_negative() {
        let empty = ApplianceSpec {
            name: "Ghost".to_string(),
            phase: Phase::L1,
            consumption: vec![],
        };
        assert!(Appliance::try_from(empty).is_err());

        let negative = ApplianceSpec {
            name: "Generator".to_string(),
            phase: Phase::L1,
            consumption: vec![-5.0],
        };
        assert!(Appliance::try_from(negative).is_err());
    }

    #[test]
    fn test_default_catalogue_covers_every_phase() {
        let catalogue = default_catalogue();
        for phase in Phase::ALL {
            assert!(catalogue.iter().any(|a| a.phase == phase));
        }
    }
}
