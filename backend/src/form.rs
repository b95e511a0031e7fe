//! Option catalog for the client form. The selectable values mirror what the
//! pipeline was trained on; the HTTP endpoint itself accepts any string.

use serde::Serialize;

pub const BRANDS: [&str; 7] = [
    "BMW",
    "Mercedes-Benz",
    "Audi",
    "Toyota",
    "Renault",
    "Volkswagen",
    "Mitsubishi",
];

pub const BODY_TYPES: [&str; 6] = ["sedan", "van", "crossover", "wagon", "other", "hatch"];

pub const ENGINE_TYPES: [&str; 4] = ["Petrol", "Diesel", "Gas", "Other"];

pub const REGISTRATION: [&str; 2] = ["yes", "no"];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NumericInput {
    pub min: f64,
    pub step: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FormOptions {
    pub brands: Vec<&'static str>,
    pub body_types: Vec<&'static str>,
    pub engine_types: Vec<&'static str>,
    pub years: Vec<i32>,
    pub registration: Vec<&'static str>,
    pub mileage: NumericInput,
    pub engine_volume: NumericInput,
}

/// Years present in the training data. 1970-1977 and 1981 never occur.
pub fn years() -> Vec<i32> {
    [1969, 1978, 1979, 1980]
        .into_iter()
        .chain(1982..=2016)
        .collect()
}

impl FormOptions {
    pub fn catalog() -> Self {
        let input = NumericInput { min: 0.0, step: 0.1 };
        Self {
            brands: BRANDS.to_vec(),
            body_types: BODY_TYPES.to_vec(),
            engine_types: ENGINE_TYPES.to_vec(),
            years: years(),
            registration: REGISTRATION.to_vec(),
            mileage: input.clone(),
            engine_volume: input,
        }
    }
}
