use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

pub const KCAL_PER_GRAM_PROTEIN: f64 = 4.0;
pub const KCAL_PER_GRAM_FAT: f64 = 9.0;
pub const KCAL_PER_GRAM_CARBOHYDRATE: f64 = 4.0;

/// Round to one decimal place, half away from zero.
///
/// Every value the crate reports goes through here, so the rounding mode is
/// uniform: `round1(0.25) == 0.3`, `round1(-0.25) == -0.3`.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Energy of 100g of food, from its macros per 100g.
pub fn kcal_per_100g(proteins: f64, fats: f64, carbohydrates: f64) -> f64 {
    round1(kcal_unrounded(proteins, fats, carbohydrates))
}

fn kcal_unrounded(proteins: f64, fats: f64, carbohydrates: f64) -> f64 {
    KCAL_PER_GRAM_PROTEIN * proteins
        + KCAL_PER_GRAM_FAT * fats
        + KCAL_PER_GRAM_CARBOHYDRATE * carbohydrates
}

/// Scale a per-100g value to `mass_grams`. Not rounded: callers round final
/// totals only.
pub fn scale(per_100g: f64, mass_grams: f64) -> f64 {
    per_100g * mass_grams / 100.0
}

/// Proteins, fats and carbohydrates in grams per 100g of food.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Macros {
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
}

impl Macros {
    pub fn new(proteins: f64, fats: f64, carbohydrates: f64) -> Self {
        Self {
            proteins,
            fats,
            carbohydrates,
        }
    }

    pub fn sum(&self) -> f64 {
        self.proteins + self.fats + self.carbohydrates
    }

    pub fn kcal(&self) -> f64 {
        kcal_per_100g(self.proteins, self.fats, self.carbohydrates)
    }

    /// Each macro rounded to one decimal.
    pub fn normalized(&self) -> Self {
        Self::new(
            round1(self.proteins),
            round1(self.fats),
            round1(self.carbohydrates),
        )
    }

    /// Per-100g profile with derived kcal.
    pub fn profile(&self) -> Nutrition {
        Nutrition {
            proteins: self.proteins,
            fats: self.fats,
            carbohydrates: self.carbohydrates,
            kcal: self.kcal(),
        }
    }
}

/// Nutrient amounts for some quantity of food: a per-100g profile, a single
/// portion or a sum of portions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
    pub kcal: f64,
}

impl Nutrition {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn macros(&self) -> Macros {
        Macros::new(self.proteins, self.fats, self.carbohydrates)
    }

    /// Every field scaled from a 100g basis to `mass_grams`, full precision.
    pub fn scaled(&self, mass_grams: f64) -> Self {
        Self {
            proteins: scale(self.proteins, mass_grams),
            fats: scale(self.fats, mass_grams),
            carbohydrates: scale(self.carbohydrates, mass_grams),
            kcal: scale(self.kcal, mass_grams),
        }
    }

    pub fn rounded(&self) -> Self {
        Self {
            proteins: round1(self.proteins),
            fats: round1(self.fats),
            carbohydrates: round1(self.carbohydrates),
            kcal: round1(self.kcal),
        }
    }

    /// Rounded macros with kcal recomputed from them, so the reported
    /// energy always agrees with the reported macros.
    pub fn rounded_with_derived_kcal(&self) -> Self {
        self.macros().normalized().profile()
    }

    /// kcal recomputed from the unrounded macros.
    pub fn with_derived_kcal(mut self) -> Self {
        self.kcal = kcal_unrounded(self.proteins, self.fats, self.carbohydrates);
        self
    }
}

impl Add for Nutrition {
    type Output = Nutrition;

    fn add(mut self, rhs: Nutrition) -> Nutrition {
        self += rhs;
        self
    }
}

impl AddAssign for Nutrition {
    fn add_assign(&mut self, rhs: Nutrition) {
        self.proteins += rhs.proteins;
        self.fats += rhs.fats;
        self.carbohydrates += rhs.carbohydrates;
        self.kcal += rhs.kcal;
    }
}

impl std::iter::Sum for Nutrition {
    fn sum<I: Iterator<Item = Nutrition>>(iter: I) -> Nutrition {
        iter.fold(Nutrition::zero(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round1_half_away_from_zero() {
        assert_eq!(round1(0.25), 0.3);
        assert_eq!(round1(0.24), 0.2);
        assert_eq!(round1(-0.25), -0.3);
        assert_eq!(round1(12.0), 12.0);
    }

    #[test]
    fn test_kcal_per_100g_matches_formula() {
        for p in 0..=10 {
            for f in 0..=10 {
                for c in 0..=10 {
                    let (p, f, c) = (p as f64 * 3.3, f as f64 * 2.1, c as f64 * 4.7);
                    assert_eq!(kcal_per_100g(p, f, c), round1(4.0 * p + 9.0 * f + 4.0 * c));
                }
            }
        }
    }

    #[test]
    fn test_chicken_portion() {
        let chicken = Macros::new(20.0, 5.0, 0.0).profile();
        assert_eq!(chicken.kcal, 125.0);

        let portion = chicken.scaled(200.0).rounded();
        assert_eq!(
            portion,
            Nutrition {
                proteins: 40.0,
                fats: 10.0,
                carbohydrates: 0.0,
                kcal: 250.0
            }
        );
    }

    #[test]
    fn test_scale_keeps_precision() {
        assert_eq!(scale(3.3, 33.0), 3.3 * 33.0 / 100.0);
        assert_eq!(round1(scale(3.3, 33.0)), 1.1);
    }

    #[test]
    fn test_rounded_with_derived_kcal() {
        let n = Nutrition {
            proteins: 10.04,
            fats: 2.06,
            carbohydrates: 0.0,
            kcal: 999.0,
        };
        let r = n.rounded_with_derived_kcal();
        assert_eq!(r.proteins, 10.0);
        assert_eq!(r.fats, 2.1);
        assert_eq!(r.kcal, round1(40.0 + 18.9));
    }

    #[test]
    fn test_sum() {
        let a = Nutrition {
            proteins: 1.0,
            fats: 2.0,
            carbohydrates: 3.0,
            kcal: 4.0,
        };
        let total: Nutrition = vec![a, a, a].into_iter().sum();
        assert_eq!(total.proteins, 3.0);
        assert_eq!(total.kcal, 12.0);
        assert_eq!(Vec::<Nutrition>::new().into_iter().sum::<Nutrition>(), Nutrition::zero());
    }
}
