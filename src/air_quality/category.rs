use std::fmt;

use crate::air_quality::{Average, Concentration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Good,
    Moderate,
    UnhealthySensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
    Unavailable,
}

// PM2.5 AQI breakpoints, exclusive upper bound in µg/m³. Anything finite
// above the last bound is hazardous.
const BREAKPOINTS: [(f64, Category); 5] = [
    (12.1, Category::Good),
    (35.5, Category::Moderate),
    (55.5, Category::UnhealthySensitive),
    (150.5, Category::Unhealthy),
    (250.5, Category::VeryUnhealthy),
];

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Good,
        Category::Moderate,
        Category::UnhealthySensitive,
        Category::Unhealthy,
        Category::VeryUnhealthy,
        Category::Hazardous,
        Category::Unavailable,
    ];

    pub fn from_concentration(concentration: Concentration) -> Self {
        let value = concentration.ug_per_m3();

        BREAKPOINTS
            .iter()
            .find(|&&(upper, _)| value < upper)
            .map_or(Category::Hazardous, |&(_, category)| category)
    }

    /// Classifies a raw value. NaN and infinities are `Unavailable`.
    pub fn from_value(ug_per_m3: f64) -> Self {
        Concentration::new(ug_per_m3).map_or(Category::Unavailable, Self::from_concentration)
    }

    /// CSS class name used by the dashboard markup.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Good => "good",
            Category::Moderate => "moderate",
            Category::UnhealthySensitive => "unhealthy-sensitive",
            Category::Unhealthy => "unhealthy",
            Category::VeryUnhealthy => "very-unhealthy",
            Category::Hazardous => "hazardous",
            Category::Unavailable => "unavailable",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Category::Good => "#00e400",
            Category::Moderate => "#ffff00",
            Category::UnhealthySensitive => "#ff7e00",
            Category::Unhealthy => "#ff0000",
            Category::VeryUnhealthy => "#8f3f97",
            Category::Hazardous => "#7e0023",
            Category::Unavailable => "#b0b0b0",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify(average: &Average) -> Category {
    match average {
        Average::Concentration(c) => Category::from_concentration(*c),
        Average::NoData => Category::Unavailable,
    }
}
