use std::time::Duration;

use reqwest::Client;

use crate::{info, warning};

const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// URL pinged for a run: the check URL on success, `<url>/fail` otherwise.
pub fn ping_url(url: &str, success: bool) -> String {
    if success {
        url.to_string()
    } else {
        format!("{}/fail", url.trim_end_matches('/'))
    }
}

/// Reports the outcome of the run to a health-check service.
///
/// Never fails the run; problems are only logged.
pub async fn ping(url: &str, success: bool) {
    let target = ping_url(url, success);
    let client = match Client::builder().timeout(PING_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            warning!("Cannot create health-check client. Err: {}", e);
            return;
        }
    };

    match client.get(&target).send().await.and_then(|r| r.error_for_status()) {
        Ok(_) => info!("Health check pinged"),
        Err(e) => warning!("Health-check ping to {} failed. Err: {}", target, e),
    }
}
