//! Plan catalog: tiers, billing intervals and their prices.
//!
//! Pure lookups, no I/O. Annual prices are a discounted yearly total, not
//! twelve times the monthly price.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BillingError;

/// Monthly prices in dollars, indexed like [`PlanTier::ALL`].
const MONTHLY_PRICES: [f64; 4] = [9.99, 18.99, 35.99, 54.99];

/// Per-month price in dollars when billed annually, indexed like [`PlanTier::ALL`].
const ANNUAL_MONTHLY_PRICES: [f64; 4] = [7.99, 15.99, 29.99, 43.99];

/// Below this many cents, `x / 100 * 100` rounds back to `x` exactly.
const EXACT_CENTS_LIMIT: f64 = 1_125_899_906_842_624.0; // 2^50

/// Suffix the provider uses for the yearly variant of a plan.
const YEARLY_SUFFIX: &str = "-yearly";

/// Suffix the provider uses for the trial variant of a plan.
const TRIAL_SUFFIX: &str = "-trial";

/// A paid plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    /// Single user.
    Personal,
    /// Independent consultant.
    Consultant,
    /// Small business.
    Business,
    /// Larger team.
    GrowingBusiness,
}

impl PlanTier {
    /// Every tier, in catalog order.
    pub const ALL: [Self; 4] = [
        Self::Personal,
        Self::Consultant,
        Self::Business,
        Self::GrowingBusiness,
    ];

    const fn index(self) -> usize {
        match self {
            Self::Personal => 0,
            Self::Consultant => 1,
            Self::Business => 2,
            Self::GrowingBusiness => 3,
        }
    }

    /// Human-readable plan name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Personal => "Personal",
            Self::Consultant => "Consultant",
            Self::Business => "Business",
            Self::GrowingBusiness => "Growing Business",
        }
    }

    /// Plan code registered with the payment provider.
    #[must_use]
    pub const fn provider_code(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Consultant => "consultant",
            Self::Business => "business",
            Self::GrowingBusiness => "growing",
        }
    }

    /// Provider plan id for this tier billed over `interval`.
    #[must_use]
    pub fn provider_plan_id(self, interval: BillingInterval) -> String {
        match interval {
            BillingInterval::Monthly => self.provider_code().to_string(),
            BillingInterval::Annually => format!("{}{YEARLY_SUFFIX}", self.provider_code()),
        }
    }

    /// Map a provider plan id back to a tier.
    ///
    /// Accepts current codes, their `-yearly` variants, and the legacy
    /// metal-named codes still attached to older customers.
    #[must_use]
    pub fn from_provider_code(code: &str) -> Option<Self> {
        let code = code.trim().to_ascii_lowercase();
        let base = code.strip_suffix(YEARLY_SUFFIX).unwrap_or(&code);
        match base {
            "personal" | "bronze" => Some(Self::Personal),
            "consultant" | "aluminum" => Some(Self::Consultant),
            "business" | "silver" | "silver-1" => Some(Self::Business),
            "growing" | "gold" | "gold-1" => Some(Self::GrowingBusiness),
            _ => None,
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PlanTier {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|tier| tier.label().eq_ignore_ascii_case(trimmed))
            .or_else(|| Self::from_provider_code(trimmed))
            .ok_or_else(|| BillingError::validation("Plan is invalid"))
    }
}

/// How often a subscription is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    /// Billed every month.
    Monthly,
    /// Billed once a year.
    Annually,
}

impl BillingInterval {
    /// Wire name of the interval.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Annually => "annually",
        }
    }

    /// Phrase used on receipts ("a monthly" / "an annual").
    #[must_use]
    pub const fn receipt_phrase(self) -> &'static str {
        match self {
            Self::Monthly => "a monthly",
            Self::Annually => "an annual",
        }
    }
}

impl fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingInterval {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(Self::Monthly),
            "annually" => Ok(Self::Annually),
            _ => Err(BillingError::validation("Duration is invalid")),
        }
    }
}

/// Provider plan id for the trial variant of `plan` (e.g. `free-trial`).
#[must_use]
pub fn trial_plan_id(plan: &str) -> String {
    format!("{plan}{TRIAL_SUFFIX}")
}

/// Round half away from zero at two decimal places.
///
/// `18.999999` becomes `19.0`; `0.125` becomes `0.13`; `-0.125` becomes `-0.13`.
/// Amounts too large to carry a cent digit are returned unchanged.
#[must_use]
pub fn round_to_cents(amount: f64) -> f64 {
    let cents = amount * 100.0;
    if !cents.is_finite() || cents.abs() >= EXACT_CENTS_LIMIT {
        return amount;
    }
    cents.round() / 100.0
}

/// Price in dollars for `tier` billed over `interval`.
#[must_use]
pub fn price_for(tier: PlanTier, interval: BillingInterval) -> f64 {
    let i = tier.index();
    let price = match interval {
        BillingInterval::Monthly => MONTHLY_PRICES[i],
        BillingInterval::Annually => ANNUAL_MONTHLY_PRICES[i] * 12.0,
    };
    round_to_cents(price)
}

/// String-keyed price lookup.
///
/// Unknown plans or durations return `0.0`; callers treat zero as
/// "plan not found". Use [`PlanTier::from_str`] for a rejecting lookup.
#[must_use]
pub fn price_for_label(plan: &str, duration: &str) -> f64 {
    match (plan.parse::<PlanTier>(), duration.parse::<BillingInterval>()) {
        (Ok(tier), Ok(interval)) => price_for(tier, interval),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::float_cmp)]
    fn price_table_is_fixed() {
        let expected = [
            (PlanTier::Personal, 9.99, 95.88),
            (PlanTier::Consultant, 18.99, 191.88),
            (PlanTier::Business, 35.99, 359.88),
            (PlanTier::GrowingBusiness, 54.99, 527.88),
        ];

        for _ in 0..3 {
            for (tier, monthly, annual) in expected {
                assert_eq!(price_for(tier, BillingInterval::Monthly), monthly);
                assert_eq!(price_for(tier, BillingInterval::Annually), annual);
            }
        }
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn label_lookup_returns_zero_for_unknown() {
        assert_eq!(price_for_label("Personal", "monthly"), 9.99);
        assert_eq!(price_for_label("Growing Business", "annually"), 527.88);
        assert_eq!(price_for_label("Platinum", "monthly"), 0.0);
        assert_eq!(price_for_label("Personal", "weekly"), 0.0);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_to_cents(18.999_999), 19.0);
        assert_eq!(round_to_cents(0.125), 0.13);
        assert_eq!(round_to_cents(-0.125), -0.13);
        assert_eq!(round_to_cents(2.5), 2.5);
        assert_eq!(round_to_cents(95.880_000_000_000_01), 95.88);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn rounding_is_idempotent() {
        let samples = [
            0.0,
            0.004,
            0.005,
            1.234_5,
            18.999_999,
            95.88,
            527.875,
            -3.335,
            1e6 + 0.015,
            11_258_999_068_426.235,
            44_906_743_356_990.195,
            -44_906_743_356_990.195,
            35_184_372_088_832.015,
            45_035_996_273_704.96,
            9.007_199_254_740_993e15,
            f64::MAX,
            f64::INFINITY,
        ];
        for x in samples {
            let once = round_to_cents(x);
            assert_eq!(round_to_cents(once), once, "not idempotent for {x}");
        }
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn rounding_leaves_amounts_without_cent_precision_alone() {
        let huge = 9.007_199_254_740_993e15;
        assert_eq!(round_to_cents(huge), huge);
        assert_eq!(round_to_cents(-huge), -huge);
        assert!(round_to_cents(f64::NAN).is_nan());
    }

    #[test]
    fn tier_parsing_accepts_labels_and_codes() {
        assert_eq!("Growing Business".parse::<PlanTier>().unwrap(), PlanTier::GrowingBusiness);
        assert_eq!("personal".parse::<PlanTier>().unwrap(), PlanTier::Personal);
        assert_eq!("silver-1".parse::<PlanTier>().unwrap(), PlanTier::Business);
        assert!(matches!(
            "enterprise".parse::<PlanTier>(),
            Err(BillingError::Validation(_))
        ));
    }

    #[test]
    fn interval_parsing_rejects_unknown() {
        assert_eq!(
            " Annually ".parse::<BillingInterval>().unwrap(),
            BillingInterval::Annually
        );
        assert_eq!(
            "weekly".parse::<BillingInterval>(),
            Err(BillingError::validation("Duration is invalid"))
        );
    }

    #[test]
    fn provider_plan_ids() {
        assert_eq!(
            PlanTier::GrowingBusiness.provider_plan_id(BillingInterval::Annually),
            "growing-yearly"
        );
        assert_eq!(
            PlanTier::Personal.provider_plan_id(BillingInterval::Monthly),
            "personal"
        );
        assert_eq!(
            PlanTier::from_provider_code("consultant-yearly"),
            Some(PlanTier::Consultant)
        );
        assert_eq!(PlanTier::from_provider_code("free"), None);
        assert_eq!(trial_plan_id("free"), "free-trial");
    }
}
