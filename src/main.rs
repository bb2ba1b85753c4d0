//! Challenge account simulation.
//!
//! Walks challenges through the full lifecycle: passing on profit, failing on total
//! and daily loss, concurrent trade traffic and a restart from the stored snapshot.
//!
//! Usage: `challenge-sim [config.toml]`. Set `RUST_LOG=debug` to see every flush.

use anyhow::{ensure, Context};
use challenge_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

const DAY_MS: i64 = 86_400_000;
// 2024-01-01T09:30:00Z
const SESSION_OPEN: i64 = 1_704_101_400_000;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let template = match std::env::args().nth(1) {
        Some(path) => ServiceConfig::load(Path::new(&path))?.default_challenge,
        None => ChallengeTemplate::default(),
    };

    println!("Challenge Account Engine Simulation");
    println!(
        "Template: ${} start, ${} daily / ${} total loss, ${} target\n",
        template.initial_balance, template.max_daily_loss, template.max_total_loss, template.profit_target
    );

    scenario_1_pass_on_profit()?;
    scenario_2_fail_on_total_loss()?;
    scenario_3_daily_loss_window()?;
    scenario_4_concurrent_trades()?;
    scenario_5_restart_from_snapshot(&template)?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn service_at(clock: Arc<ManualClock>) -> anyhow::Result<AccountService> {
    Ok(AccountService::with_store(ServiceConfig::strict(), MemoryStore::new(), clock)?)
}

fn open(svc: &AccountService, email: &str, initial: Decimal) -> anyhow::Result<(UserId, ChallengeId)> {
    let user = svc.register_user(RegisterUserRequest {
        email: email.to_string(),
        name: email.split('@').next().unwrap_or(email).to_string(),
        credential: "external-hash".to_string(),
        role: None,
    })?;
    let challenge = svc.create_challenge(CreateChallengeRequest {
        user_id: user.id,
        initial_balance: initial,
        current_balance: None,
        max_daily_loss: dec!(500),
        max_total_loss: dec!(1000),
        profit_target: dec!(1000),
    })?;
    Ok((user.id, challenge.id))
}

fn trade(svc: &AccountService, user: UserId, challenge: ChallengeId, pnl: Decimal) -> Result<Trade, ApiError> {
    svc.record_trade(RecordTradeRequest {
        user_id: user,
        challenge_id: challenge,
        symbol: "EURUSD".to_string(),
        side: if pnl.is_sign_negative() { Side::Sell } else { Side::Buy },
        price: dec!(1.0850),
        quantity: 1,
        pnl: Some(pnl),
    })
}

fn show(svc: &AccountService, id: ChallengeId) -> anyhow::Result<Challenge> {
    let c = svc.ledger().challenge(id).context("challenge vanished")?;
    println!("  Balance: ${}, status: {}", c.current_balance, c.status);
    Ok(c)
}

/// Profit target reached in three trades.
fn scenario_1_pass_on_profit() -> anyhow::Result<()> {
    println!("Scenario 1: Passing on Profit Target\n");

    let svc = service_at(Arc::new(ManualClock::new(Timestamp::from_millis(SESSION_OPEN))))?;
    let (user, id) = open(&svc, "alice@example.com", dec!(10000))?;

    for pnl in [dec!(400), dec!(-150), dec!(750)] {
        trade(&svc, user, id, pnl)?;
        println!("  Trade pnl {pnl}");
        show(&svc, id)?;
    }

    let c = show(&svc, id)?;
    ensure!(c.status == ChallengeStatus::Passed, "expected passed, got {}", c.status);

    match trade(&svc, user, id, dec!(10)) {
        Err(rejected) => println!("  Further trade rejected: {}\n", rejected.code),
        Ok(_) => anyhow::bail!("trade accepted on a passed challenge"),
    }
    Ok(())
}

/// Slow bleed past the total loss limit, spread over several days.
fn scenario_2_fail_on_total_loss() -> anyhow::Result<()> {
    println!("Scenario 2: Failing on Total Loss\n");

    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(SESSION_OPEN)));
    let svc = service_at(Arc::clone(&clock))?;
    let (user, id) = open(&svc, "bob@example.com", dec!(10000))?;

    for day in 1..=3 {
        trade(&svc, user, id, dec!(-350))?;
        print!("  Day {day}:");
        show(&svc, id)?;
        clock.advance(DAY_MS);
    }

    let c = show(&svc, id)?;
    ensure!(c.status == ChallengeStatus::Failed, "expected failed, got {}", c.status);
    let loss = c
        .initial_balance
        .checked_sub(c.current_balance)
        .context("loss out of range")?;
    println!("  Total loss ${} breached the ${} limit\n", loss, c.max_total_loss);
    Ok(())
}

/// Same losses, once inside one UTC day and once across midnight.
fn scenario_3_daily_loss_window() -> anyhow::Result<()> {
    println!("Scenario 3: Daily Loss Window\n");

    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(SESSION_OPEN)));
    let svc = service_at(Arc::clone(&clock))?;

    let (carol, same_day) = open(&svc, "carol@example.com", dec!(10000))?;
    trade(&svc, carol, same_day, dec!(-300))?;
    clock.advance(3_600_000);
    trade(&svc, carol, same_day, dec!(-250))?;
    println!("  Carol loses $550 within one day:");
    let c = show(&svc, same_day)?;
    ensure!(c.status == ChallengeStatus::Failed, "daily limit should have closed carol's challenge");

    let (dave, across) = open(&svc, "dave@example.com", dec!(10000))?;
    clock.set(Timestamp::from_millis(SESSION_OPEN + DAY_MS));
    trade(&svc, dave, across, dec!(-300))?;
    clock.advance(DAY_MS);
    trade(&svc, dave, across, dec!(-250))?;
    println!("  Dave loses the same $550 across midnight UTC:");
    let c = show(&svc, across)?;
    ensure!(c.status == ChallengeStatus::Active, "dave's challenge should still be active");
    println!();
    Ok(())
}

/// Many writers on one challenge: every pnl lands exactly once.
fn scenario_4_concurrent_trades() -> anyhow::Result<()> {
    println!("Scenario 4: Concurrent Trades\n");

    let svc = Arc::new(service_at(Arc::new(ManualClock::new(Timestamp::from_millis(SESSION_OPEN))))?);
    let (user, id) = open(&svc, "erin@example.com", dec!(10000))?;

    let threads = 8;
    let per_thread = 50;
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let svc = Arc::clone(&svc);
            thread::spawn(move || -> Result<(), ApiError> {
                for _ in 0..per_thread {
                    trade(&svc, user, id, dec!(1))?;
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("trader thread panicked"))??;
    }

    let c = show(&svc, id)?;
    let expected = dec!(10000) + Decimal::from(threads * per_thread);
    ensure!(c.current_balance.value() == expected, "lost update: {} != {}", c.current_balance, expected);
    println!("  {} trades recorded\n", svc.list_trades(user).len());
    Ok(())
}

/// Register through the wire surface, trade, drop the service, reopen from disk.
fn scenario_5_restart_from_snapshot(template: &ChallengeTemplate) -> anyhow::Result<()> {
    println!("Scenario 5: Restart From Snapshot\n");

    let dir = std::env::temp_dir().join(format!("challenge-sim-{}", std::process::id()));
    let config = ServiceConfig {
        data_file: dir.join("users_data.json"),
        default_challenge: template.clone(),
        ..ServiceConfig::default()
    };

    let (user, challenge) = {
        let svc = AccountService::open(config.clone())?;
        let resp = svc.handle_register(json!({
            "email": "frank@example.com", "name": "Frank", "password": "external-hash"
        }));
        let user = resp.user.context("registration failed")?.id;
        let challenge = svc
            .list_challenges(user)
            .first()
            .map(|c| c.id)
            .context("no starter challenge")?;

        let resp = svc.handle_record_trade(json!({
            "userId": user, "challengeId": challenge, "symbol": "GBPUSD",
            "type": "SELL", "price": "1.2710", "quantity": 3, "pnl": "-125.40"
        }));
        println!("  Trade response: {}", serde_json::to_string(&resp)?);
        (user, challenge)
    };

    let svc = AccountService::open(config.clone())?;
    println!("  Reopened from {}", config.data_file.display());
    let c = show(&svc, challenge)?;
    ensure!(
        c.current_balance.value() == template.initial_balance - dec!(125.40),
        "restored balance mismatch"
    );
    ensure!(svc.list_trades(user).len() == 1, "restored trade history mismatch");

    std::fs::remove_dir_all(&dir).with_context(|| format!("removing {}", dir.display()))?;
    Ok(())
}
