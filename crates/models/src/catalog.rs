use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    pub dish_name: String,
    pub rice_type: String,
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub protein: Option<f64>,
    #[serde(default)]
    pub carbohydrates: Option<f64>,
    #[serde(default)]
    pub fat: Option<f64>,
    #[serde(default)]
    pub reference_link: Option<String>,
}

impl Dish {
    pub fn nutrient(&self, nutrient: Nutrient) -> Option<f64> {
        match nutrient {
            Nutrient::Calories => self.calories,
            Nutrient::Protein => self.protein,
            Nutrient::Carbohydrates => self.carbohydrates,
            Nutrient::Fat => self.fat,
        }
    }
}

/// Nutritional columns a dish list can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nutrient {
    Calories,
    Protein,
    Carbohydrates,
    Fat,
}

impl FromStr for Nutrient {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "calories" => Ok(Self::Calories),
            "protein" => Ok(Self::Protein),
            "carbohydrates" | "carbs" => Ok(Self::Carbohydrates),
            "fat" => Ok(Self::Fat),
            other => Err(ModelError::Validation(format!("unknown nutrient: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medicine {
    pub name: String,
    pub disease: String,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseSolution {
    #[serde(alias = "name")]
    pub disease_name: String,
    pub solution: String,
}
