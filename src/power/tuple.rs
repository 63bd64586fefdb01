use serde::{Deserialize, Serialize};

use super::coefficients::Coefficients;
use super::types::PowerKind;

/// Active and reactive set-point of one device for one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerTuple {
    active_power: i32,
    reactive_power: i32,
}

impl PowerTuple {
    pub fn new(active_power: i32, reactive_power: i32) -> Self {
        Self {
            active_power,
            reactive_power,
        }
    }

    /// Read one device out of a solution point.
    ///
    /// Sums every phase registered for the device per kind and rounds to
    /// whole watts / var.
    pub fn from_solution(coefficients: &Coefficients, point: &[f64], ess_id: &str) -> Self {
        let mut tuple = Self::default();
        for kind in [PowerKind::Active, PowerKind::Reactive] {
            let total: f64 = coefficients
                .indices_of_ess(ess_id, kind)
                .into_iter()
                .filter_map(|i| point.get(i))
                .sum();
            tuple.set_value(kind, round_to_watts(total));
        }
        tuple
    }

    /// Last write per kind wins
    pub fn set_value(&mut self, kind: PowerKind, value: i32) {
        match kind {
            PowerKind::Active => self.active_power = value,
            PowerKind::Reactive => self.reactive_power = value,
        }
    }

    pub fn value(&self, kind: PowerKind) -> i32 {
        match kind {
            PowerKind::Active => self.active_power,
            PowerKind::Reactive => self.reactive_power,
        }
    }

    pub fn active_power(&self) -> i32 {
        self.active_power
    }

    pub fn reactive_power(&self) -> i32 {
        self.reactive_power
    }
}

fn round_to_watts(value: f64) -> i32 {
    // `as` saturates at the i32 range and maps NaN to 0
    value.round() as i32
}
