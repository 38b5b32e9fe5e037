/// Operator alerting
///
/// Failures a player never sees in full (worker crashes, store outages) are
/// reported here. The default sink is the error log under the `alert` target,
/// which log shippers can route separately.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Alerter: Send + Sync {
    async fn alert(&self, request_id: &str, username: &str, error: &str);
}

#[derive(Debug, Clone, Default)]
pub struct LogAlerter;

#[async_trait::async_trait]
impl Alerter for LogAlerter {
    async fn alert(&self, request_id: &str, username: &str, error: &str) {
        tracing::error!(
            target: "alert",
            request_id = %request_id,
            username = %username,
            error = %error,
            "Recommendation request failed"
        );
    }
}
