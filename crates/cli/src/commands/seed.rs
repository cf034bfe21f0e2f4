use mandi_db::{migrations, MarketSeedDataset, SeedResult, VerificationResult};

use crate::commands::{block_on, load_config, open_pool, CommandFailure, CommandResult};

pub fn run() -> CommandResult {
    match load() {
        Ok(loaded) => CommandResult::success(
            "seed",
            format!(
                "marketplace seed dataset loaded: {} users, {} products, {} orders, {} events",
                loaded.users, loaded.products, loaded.orders, loaded.events
            ),
        ),
        Err(failure) => CommandResult::failure("seed", failure),
    }
}

fn load() -> Result<SeedResult, CommandFailure> {
    let config = load_config()?;

    block_on(async {
        let pool = open_pool(&config).await?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| CommandFailure::new("migration", error.to_string(), 5))?;

        let loaded = MarketSeedDataset::load(&pool)
            .await
            .map_err(|error| CommandFailure::new("seed_execution", error.to_string(), 5))?;
        let verification = MarketSeedDataset::verify(&pool)
            .await
            .map_err(|error| CommandFailure::new("seed_verification", error.to_string(), 6))?;
        pool.close().await;

        if verification.all_present {
            Ok(loaded)
        } else {
            Err(CommandFailure::new("seed_verification", verification_message(&verification), 6))
        }
    })
}

fn verification_message(verification: &VerificationResult) -> String {
    let failed: Vec<&str> = verification
        .checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect();

    if failed.is_empty() {
        "seed rows missing after load".to_string()
    } else {
        format!("seed verification failed for: {}", failed.join(", "))
    }
}
