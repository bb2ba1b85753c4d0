//! Ledger behavior tests
//!
//! Walk challenges through their lifecycle against a manual clock and check the
//! balance, status and listing rules.

use challenge_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

const HOUR_MS: i64 = 3_600_000;
// 2024-03-04T08:00:00Z
const MONDAY_8AM: i64 = 1_709_539_200_000;

fn standard_limits() -> RiskLimits {
    RiskLimits::new(Money::new(dec!(500)), Money::new(dec!(1000)), Money::new(dec!(1000)))
}

struct Desk {
    clock: Arc<ManualClock>,
    ledger: Ledger,
    user: UserId,
}

impl Desk {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(MONDAY_8AM)));
        let ledger = Ledger::new(clock.clone());
        let user = ledger
            .register_user("desk@example.com", "Desk", "hash", Role::User)
            .unwrap()
            .id;
        Self { clock, ledger, user }
    }

    fn open(&self, initial: Decimal) -> Challenge {
        self.ledger
            .create_challenge(NewChallenge::new(self.user, Money::new(initial), standard_limits()))
            .unwrap()
    }

    fn trade(&self, challenge: ChallengeId, pnl: Decimal) -> Result<Trade, LedgerError> {
        self.ledger.record_trade(NewTrade {
            user_id: self.user,
            challenge_id: challenge,
            symbol: "EURUSD".to_string(),
            side: Side::Buy,
            price: dec!(1.0850),
            quantity: 1,
            pnl: Money::new(pnl),
        })
    }

    fn balance(&self, challenge: ChallengeId) -> Decimal {
        self.ledger.challenge(challenge).unwrap().current_balance.value()
    }

    fn status(&self, challenge: ChallengeId) -> ChallengeStatus {
        self.ledger.challenge(challenge).unwrap().status
    }
}

mod lifecycle_tests {
    use super::*;

    #[test]
    fn total_loss_fails_and_closes_challenge() {
        let desk = Desk::new();
        let c = desk.open(dec!(10000));

        desk.trade(c.id, dec!(-1000)).unwrap();
        assert_eq!(desk.balance(c.id), dec!(9000));
        assert_eq!(desk.status(c.id), ChallengeStatus::Failed);

        let err = desk.trade(c.id, dec!(50)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::ChallengeClosed { id: c.id, status: ChallengeStatus::Failed }
        );
        assert_eq!(desk.balance(c.id), dec!(9000));
        assert_eq!(desk.ledger.trades_for_challenge(c.id).len(), 1);
    }

    #[test]
    fn profit_target_passes() {
        let desk = Desk::new();
        let c = desk.open(dec!(10000));

        desk.trade(c.id, dec!(1000)).unwrap();
        assert_eq!(desk.balance(c.id), dec!(11000));
        assert_eq!(desk.status(c.id), ChallengeStatus::Passed);
        assert!(desk.trade(c.id, dec!(-5)).is_err());
    }

    #[test]
    fn just_short_of_every_limit_stays_active() {
        let desk = Desk::new();
        let c = desk.open(dec!(10000));

        desk.trade(c.id, dec!(999.99)).unwrap();
        assert_eq!(desk.status(c.id), ChallengeStatus::Active);

        // 499.99 off the high, still above the day open
        desk.trade(c.id, dec!(-499.99)).unwrap();
        assert_eq!(desk.status(c.id), ChallengeStatus::Active);
        assert_eq!(desk.balance(c.id), dec!(10500));
    }

    #[test]
    fn daily_loss_counts_from_day_open_not_from_peak() {
        let desk = Desk::new();
        let c = desk.open(dec!(10000));

        desk.trade(c.id, dec!(300)).unwrap();
        desk.clock.advance(HOUR_MS);
        // 10300 -> 9550: 750 off the intraday high but only 450 below the open
        desk.trade(c.id, dec!(-750)).unwrap();
        assert_eq!(desk.status(c.id), ChallengeStatus::Active);

        desk.trade(c.id, dec!(-50)).unwrap();
        assert_eq!(desk.balance(c.id), dec!(9500));
        assert_eq!(desk.status(c.id), ChallengeStatus::Failed);
    }

    #[test]
    fn new_utc_day_resets_daily_bucket() {
        let desk = Desk::new();
        let c = desk.open(dec!(10000));

        desk.trade(c.id, dec!(-450)).unwrap();
        // 16 hours later is 00:00 UTC Tuesday
        desk.clock.advance(16 * HOUR_MS);
        desk.trade(c.id, dec!(-450)).unwrap();
        assert_eq!(desk.status(c.id), ChallengeStatus::Active);
        assert_eq!(desk.balance(c.id), dec!(9100));

        let anchor = desk.ledger.challenge(c.id).unwrap().day_anchor.unwrap();
        assert_eq!(anchor.opening_balance.value(), dec!(9550));
        assert_eq!(anchor.day, Timestamp::from_millis(MONDAY_8AM + 16 * HOUR_MS).trading_day());
    }

    #[test]
    fn total_loss_wins_over_daily_loss() {
        let desk = Desk::new();
        let c = desk
            .ledger
            .create_challenge(NewChallenge::new(
                desk.user,
                Money::new(dec!(10000)),
                RiskLimits::new(Money::new(dec!(600)), Money::new(dec!(600)), Money::new(dec!(1000))),
            ))
            .unwrap();

        let assessment = risk::assess(
            &desk.ledger.challenge(c.id).unwrap(),
            Money::new(dec!(9400)),
            desk.ledger.now(),
        )
        .unwrap();
        assert_eq!(assessment.breach, Some(Breach::TotalLoss));
        assert_eq!(assessment.daily_loss.value(), dec!(600));
    }

    #[test]
    fn opening_balance_honors_current_balance() {
        let desk = Desk::new();
        let c = desk
            .ledger
            .create_challenge(NewChallenge {
                current_balance: Some(Money::new(dec!(10800))),
                ..NewChallenge::new(desk.user, Money::new(dec!(10000)), standard_limits())
            })
            .unwrap();
        assert_eq!(c.current_balance.value(), dec!(10800));

        desk.trade(c.id, dec!(200)).unwrap();
        assert_eq!(desk.status(c.id), ChallengeStatus::Passed);
    }
}

mod validation_tests {
    use super::*;

    #[test]
    fn create_rejects_non_positive_amounts() {
        let desk = Desk::new();
        let bad = [
            (dec!(0), standard_limits()),
            (dec!(-10), standard_limits()),
            (dec!(10000), RiskLimits::new(Money::zero(), Money::new(dec!(1000)), Money::new(dec!(1000)))),
            (dec!(10000), RiskLimits::new(Money::new(dec!(500)), Money::new(dec!(-1)), Money::new(dec!(1000)))),
            (dec!(10000), RiskLimits::new(Money::new(dec!(500)), Money::new(dec!(1000)), Money::zero())),
        ];
        for (initial, limits) in bad {
            let err = desk
                .ledger
                .create_challenge(NewChallenge::new(desk.user, Money::new(initial), limits))
                .unwrap_err();
            assert!(matches!(err, LedgerError::InvalidParameter(_)), "{err:?}");
        }
        assert_eq!(desk.ledger.challenge_count(), 0);
        assert!(desk.ledger.challenges_for_user(desk.user).is_empty());
    }

    #[test]
    fn create_for_unknown_user_is_not_found() {
        let desk = Desk::new();
        let err = desk
            .ledger
            .create_challenge(NewChallenge::new(UserId(404), Money::new(dec!(10000)), standard_limits()))
            .unwrap_err();
        assert_eq!(err, LedgerError::UserNotFound(UserId(404)));
    }

    #[test]
    fn trade_shape_is_checked_before_challenge() {
        let desk = Desk::new();
        let c = desk.open(dec!(10000));

        let mut zero_qty = NewTrade {
            user_id: desk.user,
            challenge_id: c.id,
            symbol: "EURUSD".to_string(),
            side: Side::Sell,
            price: dec!(1.08),
            quantity: 0,
            pnl: Money::new(dec!(10)),
        };
        assert!(matches!(
            desk.ledger.record_trade(zero_qty.clone()),
            Err(LedgerError::InvalidParameter(ValidationError::ZeroQuantity))
        ));

        zero_qty.quantity = 1;
        zero_qty.price = dec!(0);
        assert!(desk.ledger.record_trade(zero_qty.clone()).is_err());

        zero_qty.price = dec!(1.08);
        zero_qty.symbol = String::new();
        zero_qty.challenge_id = ChallengeId(9_999);
        // shape error wins over the missing challenge
        assert!(matches!(
            desk.ledger.record_trade(zero_qty),
            Err(LedgerError::InvalidParameter(_))
        ));
        assert_eq!(desk.balance(c.id), dec!(10000));
    }

    #[test]
    fn trade_on_someone_elses_challenge_is_not_found() {
        let desk = Desk::new();
        let c = desk.open(dec!(10000));
        let other = desk
            .ledger
            .register_user("other@example.com", "Other", "hash", Role::User)
            .unwrap();

        let err = desk
            .ledger
            .record_trade(NewTrade {
                user_id: other.id,
                challenge_id: c.id,
                symbol: "EURUSD".to_string(),
                side: Side::Buy,
                price: dec!(1.08),
                quantity: 1,
                pnl: Money::new(dec!(10)),
            })
            .unwrap_err();
        assert_eq!(err, LedgerError::ChallengeNotFound(c.id));
        assert_eq!(desk.balance(c.id), dec!(10000));
    }
}

mod listing_tests {
    use super::*;

    #[test]
    fn challenges_newest_first() {
        let desk = Desk::new();
        let first = desk.open(dec!(10000));
        desk.clock.advance(HOUR_MS);
        let second = desk.open(dec!(20000));
        desk.clock.advance(HOUR_MS);
        let third = desk.open(dec!(30000));

        let ids: Vec<_> = desk.ledger.challenges_for_user(desk.user).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
        assert!(desk.ledger.challenges_for_user(UserId(777)).is_empty());
    }

    #[test]
    fn trades_newest_first_across_challenges() {
        let desk = Desk::new();
        let a = desk.open(dec!(10000));
        let b = desk.open(dec!(10000));

        let t1 = desk.trade(a.id, dec!(10)).unwrap();
        desk.clock.advance(1_000);
        let t2 = desk.trade(b.id, dec!(20)).unwrap();
        desk.clock.advance(1_000);
        let t3 = desk.trade(a.id, dec!(30)).unwrap();

        let ids: Vec<_> = desk.ledger.trades_for_user(desk.user).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![t3.id, t2.id, t1.id]);
        assert_eq!(desk.ledger.trades_for_challenge(a.id).len(), 2);
    }

    #[test]
    fn ids_are_shared_across_record_kinds() {
        let desk = Desk::new();
        let c = desk.open(dec!(10000));
        let t = desk.trade(c.id, dec!(1)).unwrap();
        assert!(desk.user.0 < c.id.0);
        assert!(c.id.0 < t.id.0);
    }
}

mod patch_tests {
    use super::*;

    #[test]
    fn patch_applies_listed_fields_only() {
        let desk = Desk::new();
        let c = desk.open(dec!(10000));
        desk.clock.advance(HOUR_MS);

        let patch = ChallengePatch {
            max_daily_loss: Some(Money::new(dec!(750))),
            current_balance: Some(Money::new(dec!(10100))),
            ..ChallengePatch::default()
        };
        let updated = desk.ledger.update_challenge(c.id, &patch).unwrap();
        assert_eq!(updated.max_daily_loss.value(), dec!(750));
        assert_eq!(updated.current_balance.value(), dec!(10100));
        assert_eq!(updated.max_total_loss, c.max_total_loss);
        assert_eq!(updated.status, ChallengeStatus::Active);
        assert!(updated.updated_at > c.updated_at);
        assert_eq!(updated.created_at, c.created_at);
    }

    #[test]
    fn patch_errors() {
        let desk = Desk::new();
        let c = desk.open(dec!(10000));

        assert!(matches!(
            desk.ledger.update_challenge(c.id, &ChallengePatch::default()),
            Err(LedgerError::InvalidParameter(_))
        ));

        let close = ChallengePatch {
            status: Some(ChallengeStatus::Failed),
            ..ChallengePatch::default()
        };
        assert_eq!(
            desk.ledger.update_challenge(ChallengeId(5_000), &close).unwrap_err(),
            LedgerError::ChallengeNotFound(ChallengeId(5_000))
        );

        desk.ledger.update_challenge(c.id, &close).unwrap();
        assert!(matches!(
            desk.ledger.update_challenge(c.id, &close),
            Err(LedgerError::ChallengeClosed { .. })
        ));
        assert!(desk.trade(c.id, dec!(1)).is_err());
    }
}
