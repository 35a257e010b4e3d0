use serde::{Deserialize, Serialize};

use crate::workflows::donation::listings::FoodUnit;

/// Conversion table from donated quantity to meal equivalents and reward tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardTable {
    pub tokens_per_meal: f64,
    pub meals_per_kg: f64,
    pub meals_per_tray: f64,
    pub meals_per_box: f64,
}

impl Default for RewardTable {
    fn default() -> Self {
        Self {
            tokens_per_meal: 2.0,
            meals_per_kg: 2.5,
            meals_per_tray: 8.0,
            meals_per_box: 5.0,
        }
    }
}

impl RewardTable {
    pub fn meal_equivalent(&self, quantity: f64, unit: FoodUnit) -> f64 {
        let per_unit = match unit {
            FoodUnit::Meals => 1.0,
            FoodUnit::Kg => self.meals_per_kg,
            FoodUnit::Trays => self.meals_per_tray,
            FoodUnit::Boxes => self.meals_per_box,
        };
        (quantity * per_unit).max(0.0)
    }

    pub fn reward_for(&self, quantity: f64, unit: FoodUnit) -> u64 {
        let tokens = (self.meal_equivalent(quantity, unit) * self.tokens_per_meal).round();
        if tokens.is_finite() && tokens > 0.0 {
            tokens as u64
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixty_meals_earn_one_hundred_twenty_tokens() {
        let table = RewardTable::default();
        assert_eq!(table.reward_for(60.0, FoodUnit::Meals), 120);
    }

    #[test]
    fn units_convert_through_meal_equivalents() {
        let table = RewardTable::default();
        assert_eq!(table.meal_equivalent(4.0, FoodUnit::Kg), 10.0);
        assert_eq!(table.reward_for(3.0, FoodUnit::Trays), 48);
        assert_eq!(table.reward_for(2.0, FoodUnit::Boxes), 20);
    }

    #[test]
    fn fractional_rewards_round_to_nearest_token() {
        let table = RewardTable {
            tokens_per_meal: 1.5,
            ..RewardTable::default()
        };
        assert_eq!(table.reward_for(3.0, FoodUnit::Meals), 5);
    }
}
