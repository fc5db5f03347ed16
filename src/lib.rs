pub mod config;
pub mod error;
pub mod observability;
pub mod services;

pub use config::{AppConfig, Cli, load_config};
pub use error::{ObservabilityError, Result};
pub use observability::{Observability, TraceOption, TraceOptions, TrackingOperation};

use std::time::Duration;

use services::database::{ClientError, MockDatabase, SqlClient, TracedClient};

const USERS_QUERY: &str = "SELECT id, name FROM users WHERE active = true";

/// Run a small scripted workload through a traced client and return the
/// Prometheus exposition of the resulting latency views.
///
/// Every third transfer fails and is rolled back.
pub async fn run_demo(observability: &Observability, options: &TraceOptions, iterations: u32) -> Result<String> {
    let mut db = MockDatabase::new()
        .with_rows(
            USERS_QUERY,
            vec![
                vec![serde_json::json!(1), serde_json::json!("ada")],
                vec![serde_json::json!(2), serde_json::json!("grace")],
            ],
        )
        .with_latency(Duration::from_millis(2));

    for i in 0..iterations {
        if i % 3 == 2 {
            db = db.fail_on(transfer_sql(i), ClientError::Failed("deadlock detected".to_string()));
        }
    }

    let mut client = TracedClient::new(db, observability.clone(), options);

    for i in 0..iterations {
        let users = match client.query(USERS_QUERY) {
            Ok(rows) => rows.len(),
            Err(e) => {
                tracing::warn!(error = %e, "Query failed");
                0
            }
        };

        match client.execute(&transfer_sql(i)) {
            Ok(_) => {
                if let Err(e) = client.commit() {
                    tracing::warn!(error = %e, "Commit failed");
                }
            }
            Err(e) => {
                tracing::warn!(iteration = i, error = %e, "Transfer failed, rolling back");
                if let Err(e) = client.rollback() {
                    tracing::warn!(error = %e, "Rollback failed");
                }
            }
        }

        tracing::info!(iteration = i, users, "Demo iteration complete");
    }

    let ping = observability
        .track_future("SqlClient.ping", None, async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok::<_, ClientError>(())
        })
        .await;
    if let Err(e) = ping {
        tracing::warn!(error = %e, "Ping failed");
    }

    if let Err(e) = client.close() {
        tracing::warn!(error = %e, "Close failed");
    }

    Ok(observability.stats().render())
}

fn transfer_sql(iteration: u32) -> String {
    format!("UPDATE accounts SET balance = balance - 10 WHERE id = {}", iteration)
}
