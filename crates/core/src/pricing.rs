use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// How far below the cart total the agent may concede, in whole percent of
/// the total kept. The default keeps 85% (a 15% maximum discount).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorRule {
    pub floor_pct: u8,
}

impl Default for FloorRule {
    fn default() -> Self {
        Self { floor_pct: 85 }
    }
}

impl FloorRule {
    /// Deterministic, monotonic in `total`, truncated toward zero to an
    /// integer currency unit. A zero (or negative) total floors at zero.
    pub fn compute_floor(&self, total: Decimal) -> Decimal {
        if total <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (total * Decimal::from(self.floor_pct) / Decimal::from(100u32)).trunc()
    }
}

/// The bounds a finalized price must fall within: `floor <= price <= total`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub total: Decimal,
    pub floor: Decimal,
}

impl PricingPolicy {
    pub fn from_total(total: Decimal, rule: FloorRule) -> Self {
        Self { total, floor: rule.compute_floor(total) }
    }

    /// Validates a proposed final price from the agent. The agent's structured
    /// finalize action is untrusted input; this check is independent of
    /// whatever the agent asserts about its own arithmetic.
    pub fn clamp_accepted_price(&self, proposed: Decimal) -> Result<Decimal, DomainError> {
        if proposed < self.floor || proposed > self.total {
            return Err(DomainError::PolicyViolation {
                proposed,
                floor: self.floor,
                total: self.total,
            });
        }
        Ok(proposed)
    }
}

pub fn discount_for(total: Decimal, proposed: Decimal) -> Decimal {
    (total - proposed).max(Decimal::ZERO)
}
