//! Fixed-point money arithmetic.

use serde::{Deserialize, Serialize};

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from a dollar value.
    pub fn from_dollars(dollars: i64) -> Self {
        Self {
            cents: dollars * 100,
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the dollar portion (whole number).
    pub fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents * quantity as i64,
        }
    }

    /// Returns `self * part / whole`, rounded half-up.
    ///
    /// Used for quantity-proportional refunds: the share of a line total that
    /// `part` units represent out of `whole`. Intermediate math is i128 so
    /// large totals cannot overflow.
    pub fn proportional(&self, part: u32, whole: u32) -> Money {
        if whole == 0 {
            return Money::zero();
        }
        let numerator = self.cents as i128 * part as i128;
        let denominator = whole as i128;
        let half = denominator / 2;
        let rounded = if numerator >= 0 {
            (numerator + half) / denominator
        } else {
            (numerator - half) / denominator
        };
        Money {
            cents: rounded as i64,
        }
    }

    /// Splits this amount across `weights`, returning one part per weight.
    ///
    /// Largest-remainder allocation: each part gets the floor of its
    /// proportional share, then leftover cents go to the parts with the
    /// largest truncated remainders. The parts always sum exactly to `self`,
    /// which is what keeps per-vendor totals equal to the checkout total to
    /// the cent. All-zero weights split the remainder evenly from the front.
    pub fn allocate(&self, weights: &[i64]) -> Vec<Money> {
        if weights.is_empty() {
            return Vec::new();
        }

        let total_weight: i128 = weights.iter().map(|w| *w as i128).sum();
        let amount = self.cents as i128;

        if total_weight == 0 {
            let n = weights.len() as i128;
            let base = amount / n;
            let mut leftover = amount - base * n;
            return weights
                .iter()
                .map(|_| {
                    let extra = if leftover > 0 {
                        leftover -= 1;
                        1
                    } else if leftover < 0 {
                        leftover += 1;
                        -1
                    } else {
                        0
                    };
                    Money::from_cents((base + extra) as i64)
                })
                .collect();
        }

        let mut parts: Vec<i128> = Vec::with_capacity(weights.len());
        let mut remainders: Vec<(usize, i128)> = Vec::with_capacity(weights.len());
        for (idx, weight) in weights.iter().enumerate() {
            let exact = amount * *weight as i128;
            let floor = exact.div_euclid(total_weight);
            parts.push(floor);
            remainders.push((idx, exact.rem_euclid(total_weight)));
        }

        let allocated: i128 = parts.iter().sum();
        let mut leftover = amount - allocated;

        // Hand leftover cents to the largest remainders first; index breaks ties
        // deterministically.
        remainders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        for (idx, _) in remainders {
            if leftover == 0 {
                break;
            }
            parts[idx] += 1;
            leftover -= 1;
        }

        parts
            .into_iter()
            .map(|cents| Money::from_cents(cents as i64))
            .collect()
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents - rhs.cents,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents += rhs.cents;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.cents -= rhs.cents;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}
