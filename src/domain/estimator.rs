//! Pure estimation and classification functions. No I/O, no hidden state:
//! every output is a function of the arguments alone.

use rust_decimal::Decimal;

use crate::config::{AirdropTierRule, SquadTierRule};

/// Squad capacity classification derived from the aggregate point total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquadTierInfo {
    pub tier: u8,
    pub max_members: u32,
}

impl SquadTierInfo {
    /// Below the lowest threshold: ineligible to host members.
    pub const INELIGIBLE: SquadTierInfo = SquadTierInfo {
        tier: 0,
        max_members: 0,
    };
}

/// Estimated slice of the community airdrop pool implied by a user's points.
///
/// Zero whenever the user has no points or the community total is not yet
/// positive, so early awards cannot divide by zero or produce a share larger
/// than the pool.
pub fn estimate_points_share(
    user_points: i64,
    total_community_points: i64,
    pool_size: Decimal,
) -> Decimal {
    if user_points <= 0 || total_community_points <= 0 {
        return Decimal::ZERO;
    }
    Decimal::from(user_points) / Decimal::from(total_community_points) * pool_size
}

/// Total estimated airdrop: initial allocation plus any token balance plus
/// the points-derived pool share.
pub fn estimate_total_airdrop(
    initial_allocation: Decimal,
    token_balance: Decimal,
    points_share: Decimal,
) -> Decimal {
    initial_allocation + token_balance + points_share
}

/// Squad tier for a given aggregate total: the highest rule whose threshold
/// is met, or [`SquadTierInfo::INELIGIBLE`] below the lowest threshold.
pub fn classify_squad_tier(total_squad_points: i64, rules: &[SquadTierRule]) -> SquadTierInfo {
    rules
        .iter()
        .filter(|rule| total_squad_points >= rule.min_points)
        .max_by_key(|rule| rule.min_points)
        .map(|rule| SquadTierInfo {
            tier: rule.tier,
            max_members: rule.max_members,
        })
        .unwrap_or(SquadTierInfo::INELIGIBLE)
}

/// Airdrop bracket for an initial token allocation: the highest rung whose
/// threshold the amount meets, if any.
pub fn classify_airdrop_tier(amount: Decimal, ladder: &[AirdropTierRule]) -> Option<&AirdropTierRule> {
    ladder
        .iter()
        .filter(|rule| amount >= Decimal::from(rule.min_amount))
        .max_by_key(|rule| rule.min_amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewardsConfig;
    use crate::models::ActionType;
    use rust_decimal_macros::dec;

    #[test]
    fn share_is_proportional_to_points() {
        // 100 of 1,000 community points over a 1B pool
        let share = estimate_points_share(100, 1_000, dec!(1_000_000_000));
        assert_eq!(share, dec!(100_000_000));
    }

    #[test]
    fn share_is_zero_without_positive_inputs() {
        let pool = dec!(1_000_000_000);
        assert_eq!(estimate_points_share(0, 1_000, pool), Decimal::ZERO);
        assert_eq!(estimate_points_share(-5, 1_000, pool), Decimal::ZERO);
        assert_eq!(estimate_points_share(100, 0, pool), Decimal::ZERO);
    }

    #[test]
    fn total_airdrop_is_a_plain_sum() {
        assert_eq!(
            estimate_total_airdrop(dec!(500), dec!(0), dec!(12.5)),
            dec!(512.5)
        );
        assert_eq!(
            estimate_total_airdrop(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            Decimal::ZERO
        );
    }

    #[test]
    fn squad_tier_thresholds_are_inclusive() {
        let rules = RewardsConfig::default().squad_tiers;
        assert_eq!(classify_squad_tier(999, &rules), SquadTierInfo::INELIGIBLE);
        assert_eq!(
            classify_squad_tier(1_000, &rules),
            SquadTierInfo {
                tier: 1,
                max_members: 10
            }
        );
        assert_eq!(classify_squad_tier(4_999, &rules).tier, 1);
        assert_eq!(
            classify_squad_tier(5_000, &rules),
            SquadTierInfo {
                tier: 2,
                max_members: 50
            }
        );
        assert_eq!(
            classify_squad_tier(250_000, &rules),
            SquadTierInfo {
                tier: 3,
                max_members: 100
            }
        );
    }

    #[test]
    fn airdrop_ladder_highest_threshold_wins() {
        let ladder = RewardsConfig::default().airdrop_tiers;
        assert!(classify_airdrop_tier(dec!(9_999), &ladder).is_none());

        let bronze = classify_airdrop_tier(dec!(10_000), &ladder).unwrap();
        assert_eq!(bronze.action, ActionType::AirdropTierBronze);
        assert_eq!(bronze.points, 50);

        let legend = classify_airdrop_tier(dec!(2_000_000_000), &ladder).unwrap();
        assert_eq!(legend.action, ActionType::AirdropTierLegend);
        assert_eq!(legend.points, 10_000);
    }

    #[test]
    fn estimator_is_pure() {
        let rules = RewardsConfig::default().squad_tiers;
        for _ in 0..3 {
            assert_eq!(
                estimate_points_share(42, 84, dec!(1000)),
                estimate_points_share(42, 84, dec!(1000))
            );
            assert_eq!(
                classify_squad_tier(7_500, &rules),
                classify_squad_tier(7_500, &rules)
            );
        }
    }
}
