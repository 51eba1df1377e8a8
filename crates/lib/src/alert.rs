use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::{config::AlertConfig, constant::lamports_to_sol, ledger::Metrics};

/// Posts a webhook notification when reclaimable rent crosses the configured
/// threshold. A cooldown window prevents alert spam; delivery failures are
/// logged and otherwise ignored.
pub struct Alerter {
    config: AlertConfig,
    client: reqwest::Client,
    last_alert: Mutex<Option<Instant>>,
}

impl Alerter {
    pub fn new(config: AlertConfig) -> Self {
        Self { config, client: reqwest::Client::new(), last_alert: Mutex::new(None) }
    }

    pub async fn check_and_alert(&self, metrics: &Metrics) {
        if !self.config.enabled {
            return;
        }

        let reclaimable_sol = lamports_to_sol(metrics.reclaimable_lamports);
        if reclaimable_sol < self.config.threshold_sol {
            return;
        }

        let cooldown = Duration::from_secs(self.config.cooldown_minutes * 60);
        {
            let last_alert = self.last_alert.lock();
            if let Some(last) = *last_alert {
                if last.elapsed() < cooldown {
                    log::debug!("Alert cooldown active, suppressing notification");
                    return;
                }
            }
        }

        log::info!(
            "Alert triggered: {reclaimable_sol:.6} SOL reclaimable (threshold: {})",
            self.config.threshold_sol
        );
        let message = format!(
            "{reclaimable_sol:.6} SOL is available to reclaim across {} monitored accounts \
             (total reclaimed so far: {:.6} SOL)",
            metrics.accounts_monitored,
            lamports_to_sol(metrics.total_reclaimed),
        );
        self.post(&message).await;

        *self.last_alert.lock() = Some(Instant::now());
    }

    async fn post(&self, message: &str) {
        let Some(url) = &self.config.webhook_url else {
            log::warn!("Alert webhook URL not configured");
            return;
        };

        let payload = serde_json::json!({ "content": message });
        match self.client.post(url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                log::info!("Alert sent");
            }
            Ok(response) => {
                log::error!("Alert webhook returned status {}", response.status());
            }
            Err(e) => log::error!("Failed to send alert: {e}"),
        }
    }
}
