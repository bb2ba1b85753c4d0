//! Persistence tests
//!
//! Mutations through the service survive a restart from the snapshot file, and a
//! storage outage is never acknowledged as success.

use challenge_core::*;
use rust_decimal_macros::dec;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn file_config(path: &Path) -> ServiceConfig {
    ServiceConfig {
        data_file: path.to_path_buf(),
        ..ServiceConfig::default()
    }
}

fn register(svc: &AccountService, email: &str) -> (UserId, ChallengeId) {
    let resp = svc.handle_register(json!({"email": email, "name": "Trader", "password": "hash"}));
    let user = resp.user.expect("registered").id;
    let challenge = svc.list_challenges(user)[0].id;
    (user, challenge)
}

mod file_tests {
    use super::*;

    #[test]
    fn state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users_data.json");

        let (user, challenge, trade_ids) = {
            let svc = AccountService::open(file_config(&path)).unwrap();
            let (user, challenge) = register(&svc, "restart@example.com");
            let mut trade_ids = Vec::new();
            for pnl in ["120.50", "-80.25", "15"] {
                let trade = svc
                    .record_trade(RecordTradeRequest {
                        user_id: user,
                        challenge_id: challenge,
                        symbol: "USDJPY".to_string(),
                        side: Side::Sell,
                        price: dec!(148.25),
                        quantity: 2,
                        pnl: Some(pnl.parse().unwrap()),
                    })
                    .unwrap();
                trade_ids.push(trade.id);
            }
            let resp = svc.handle_update_challenge(challenge, &json!({"profitTarget": "1500"}));
            assert!(resp.success);
            (user, challenge, trade_ids)
        };

        let svc = AccountService::open(file_config(&path)).unwrap();
        let c = svc.ledger().challenge(challenge).unwrap();
        assert_eq!(c.current_balance.value(), dec!(10055.25));
        assert_eq!(c.profit_target.value(), dec!(1500));
        assert!(c.day_anchor.is_some());

        let restored: Vec<_> = svc.list_trades(user).iter().map(|t| t.id).collect();
        let mut expected = trade_ids.clone();
        expected.reverse();
        assert_eq!(restored, expected);

        // the sequence resumes past everything stored
        let (_, fresh) = register(&svc, "after@example.com");
        assert!(fresh.0 > trade_ids[2].0);
    }

    #[test]
    fn document_uses_external_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let svc = AccountService::open(file_config(&path)).unwrap();
        let (user, challenge) = register(&svc, "shape@example.com");
        svc.handle_record_trade(json!({
            "userId": user, "challengeId": challenge, "symbol": "EURUSD",
            "type": "BUY", "price": "1.0850", "quantity": 1, "pnl": "12.34"
        }));

        let doc: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(doc["version"], json!(SNAPSHOT_VERSION));
        assert_eq!(doc["challenges"][0]["current_balance"], json!("10012.34"));
        assert_eq!(doc["challenges"][0]["status"], json!("active"));
        assert_eq!(doc["trades"][0]["type"], json!("BUY"));
        assert!(doc["trades"][0]["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn unreadable_document_refuses_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(&path, b"[1, 2, 3]").unwrap();
        assert!(matches!(
            AccountService::open(file_config(&path)),
            Err(ServiceError::Store(StoreError::Serialization(_)))
        ));
        // the bad document is left alone for inspection
        assert_eq!(fs::read(&path).unwrap(), b"[1, 2, 3]");
    }
}

mod outage_tests {
    use super::*;

    fn memory_service() -> (AccountService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let svc = AccountService::with_store(ServiceConfig::default(), Arc::clone(&store), Arc::new(SystemClock))
            .unwrap();
        (svc, store)
    }

    #[test]
    fn outage_surfaces_as_persistence_unavailable() {
        let (svc, store) = memory_service();
        let (user, challenge) = register(&svc, "outage@example.com");
        let before = store.stored().unwrap();

        store.set_available(false);
        let resp = svc.handle_create_challenge(json!({
            "userId": user, "initialBalance": 5000, "maxDailyLoss": 250,
            "maxTotalLoss": 500, "profitTarget": 500
        }));
        assert!(!resp.success);
        assert_eq!(resp.code, Some(ErrorCode::PersistenceUnavailable));

        let resp = svc.handle_update_challenge(challenge, &json!({"maxDailyLoss": 400}));
        assert_eq!(resp.code, Some(ErrorCode::PersistenceUnavailable));
        assert_eq!(store.stored().unwrap(), before);

        // in-memory state is not rolled back
        assert_eq!(svc.list_challenges(user).len(), 2);
        assert_eq!(
            svc.ledger().challenge(challenge).unwrap().max_daily_loss.value(),
            dec!(400)
        );
    }

    #[test]
    fn empty_patch_never_reaches_storage() {
        let (svc, store) = memory_service();
        let (_, challenge) = register(&svc, "empty@example.com");
        let flushes = store.flush_count();

        for body in [json!({}), json!({"id": 1}), json!({"unknownField": 3})] {
            let resp = svc.handle_update_challenge(challenge, &body);
            assert_eq!(resp.code, Some(ErrorCode::InvalidParameter));
        }
        // storage being down does not change the answer
        store.set_available(false);
        let resp = svc.handle_update_challenge(challenge, &json!({}));
        assert_eq!(resp.code, Some(ErrorCode::InvalidParameter));
        assert_eq!(store.flush_count(), flushes);
    }

    #[test]
    fn failed_validation_does_not_flush() {
        let (svc, store) = memory_service();
        let (user, challenge) = register(&svc, "invalid@example.com");
        let flushes = store.flush_count();

        let responses = [
            svc.handle_record_trade(json!({
                "userId": user, "challengeId": challenge, "symbol": "EURUSD",
                "type": "BUY", "price": -1, "quantity": 1
            })),
            svc.handle_record_trade(json!({
                "userId": user, "challengeId": 999_999, "symbol": "EURUSD",
                "type": "BUY", "price": 1.1, "quantity": 1
            })),
            svc.handle_create_challenge(json!({"userId": user, "initialBalance": 5000})),
            svc.handle_update_challenge(challenge, &json!({"maxTotalLoss": -5})),
        ];
        let codes: Vec<_> = responses.iter().map(|r| r.code).collect();
        assert_eq!(
            codes,
            vec![
                Some(ErrorCode::InvalidParameter),
                Some(ErrorCode::NotFound),
                Some(ErrorCode::InvalidParameter),
                Some(ErrorCode::InvalidParameter),
            ]
        );
        assert_eq!(store.flush_count(), flushes);
    }
}
