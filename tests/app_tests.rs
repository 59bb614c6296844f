//! Supervisor lifecycle: coordinated startup and shutdown.

use std::sync::Arc;
use std::time::Duration;

use ari_bridge::app::App;
use ari_bridge::config::Config;
use ari_bridge::handler::NoopHandler;
use tokio::sync::watch;

/// Config pointing every dependency at a closed port so the retry loops
/// spin harmlessly while the supervisor is exercised.
fn isolated_config() -> Config {
    let mut config = Config::default();
    config.http.host = "127.0.0.1".into();
    config.http.port = 0;
    config.api.endpoint = "http://127.0.0.1:1".into();
    config.amqp.host = "127.0.0.1".into();
    config.amqp.port = 1;
    config.consul.host = "127.0.0.1".into();
    config.consul.port = 1;
    config
}

#[tokio::test]
async fn shutdown_signal_terminates_all_loops() {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(App::run_with_shutdown(
        isolated_config(),
        Arc::new(NoopHandler),
        shutdown_rx,
    ));

    // Let the loops start and hit their first retries.
    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown_tx.send(true).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("supervisor did not shut down")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn dropped_shutdown_sender_also_terminates() {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(App::run_with_shutdown(
        isolated_config(),
        Arc::new(NoopHandler),
        shutdown_rx,
    ));

    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(shutdown_tx);

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("supervisor did not shut down")
        .unwrap();
    assert!(result.is_ok());
}
