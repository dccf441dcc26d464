use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{invalid_input_error, Error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Standard,
    Premium,
    Van,
    Luxury,
}

impl VehicleClass {
    pub fn all() -> Vec<VehicleClass> {
        vec![Self::Standard, Self::Premium, Self::Van, Self::Luxury]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Premium => "premium",
            Self::Van => "van",
            Self::Luxury => "luxury",
        }
    }
}

impl Default for VehicleClass {
    fn default() -> Self {
        Self::Standard
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VehicleClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            "van" => Ok(Self::Van),
            "luxury" => Ok(Self::Luxury),
            _ => Err(invalid_input_error()),
        }
    }
}

#[test]
fn vehicle_class_parses_case_insensitively() {
    assert_eq!("Van".parse::<VehicleClass>().unwrap(), VehicleClass::Van);
    assert!("limo".parse::<VehicleClass>().is_err());
}
