use steth_store_api::routes::health::{health_check, ping};

#[tokio::test]
async fn health_check_returns_ok() {
    let response = health_check().await;
    assert_eq!(response.0.message, "Health check");
    assert!(response.0.success);
    assert!(response.0.data.is_some());
}

#[tokio::test]
async fn ping_answers_pong() {
    assert_eq!(ping().await, "pong");
}
