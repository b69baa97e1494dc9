use chrono::Utc;
use milletchain_db::{
    connect_with_config, migrations, MarketSeedDataset, OrderSeedInfo, VerificationResult,
};

use crate::commands::{
    prepare, CommandResult, StepFailure, EXIT_DB_CONNECTIVITY, EXIT_MIGRATION, EXIT_VERIFICATION,
};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DB_CONNECTIVITY))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;

        let seed_result = MarketSeedDataset::load(&pool, Utc::now())
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_MIGRATION))?;

        let verification = MarketSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), EXIT_VERIFICATION))?;

        let run_result: Result<Vec<OrderSeedInfo>, StepFailure> = if verification.all_present {
            Ok(seed_result.orders_seeded)
        } else {
            let message = verification_failure_message(&verification);
            Err(("seed_verification", message, EXIT_VERIFICATION))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(orders) => CommandResult::success("seed", success_message(&orders)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn success_message(orders: &[OrderSeedInfo]) -> String {
    let lines = orders
        .iter()
        .map(|order| {
            format!("  - {}: {} ({})", order.order_id, order.final_status, order.description)
        })
        .collect::<Vec<_>>();
    format!(
        "demo marketplace loaded with price history, a quality check, and {} orders:\n{}",
        orders.len(),
        lines.join("\n")
    )
}

fn verification_failure_message(verification: &VerificationResult) -> String {
    let failed_checks = verification
        .checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
