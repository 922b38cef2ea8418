use crate::air_quality::{Average, Category, Machine, classify};

/// Outcome of one dashboard pass for one machine.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult {
    pub machine: Machine,

    pub average: Average,

    pub category: Category,
}

impl AggregateResult {
    pub fn new(machine: Machine, average: Average) -> Self {
        let category = classify(&average);

        Self {
            machine,
            average,
            category,
        }
    }

    pub fn unavailable(machine: Machine) -> Self {
        Self::new(machine, Average::NoData)
    }
}
