use dbtrace::observability::init_telemetry;
use dbtrace::{AppConfig, TraceOption, TraceOptions, run_demo};

// Installs the global subscriber, so this file holds a single test.
#[tokio::test]
async fn init_and_run_demo_workload() {
    let mut config = AppConfig::default();
    config.service_name = "dbtrace-demo".to_string();
    config.metrics.environment = "test".to_string();
    config.tracing.db_system = Some("sqlite".to_string());

    let telemetry = init_telemetry(&config).unwrap();
    assert!(telemetry.observability().stats().views_registered());

    let options = TraceOptions::none().with(TraceOption::AnnotateTracesWithSql);
    let exposition = run_demo(telemetry.observability(), &options, 3).await.unwrap();

    assert!(exposition.contains("sql_client_latency_milliseconds_bucket"));
    assert!(exposition.contains("method=\"SqlClient.query\""));
    assert!(exposition.contains("method=\"SqlClient.rollback\""));
    assert!(exposition.contains("method=\"SqlClient.ping\""));
    assert!(exposition.contains("error=\"deadlock detected\""));
    assert!(exposition.contains("service=\"dbtrace-demo\""));

    // A second subscriber cannot be installed
    assert!(init_telemetry(&config).is_err());

    telemetry.shutdown();
}
