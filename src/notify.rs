use reqwest::Client;
use serde_json::json;
use tracing::warn;

use crate::types::{AccountIndex, TransactionDigest};

/// Optional Discord webhook for events an operator wants to see.
#[derive(Debug, Clone)]
pub struct Notifier {
    client: Client,
    webhook_url: String,
}

impl Notifier {
    /// `None` when no webhook is configured.
    #[must_use]
    pub fn from_webhook(webhook_url: Option<String>) -> Option<Self> {
        webhook_url
            .filter(|url| !url.is_empty())
            .map(|webhook_url| Self {
                client: Client::new(),
                webhook_url,
            })
    }

    /// Sends a fire-and-forget alert. Does not block the caller; must be
    /// called from within a tokio runtime.
    pub fn send_alert(&self, content: String) {
        let client = self.client.clone();
        let url = self.webhook_url.clone();
        tokio::spawn(async move {
            let payload = json!({ "content": content });
            if let Err(e) = client.post(&url).json(&payload).send().await {
                warn!(error = %e, "failed to send discord alert");
            }
        });
    }
}

pub fn format_claim_alert(account: AccountIndex, epoch: u64, tx_count: u64, digest: &TransactionDigest) -> String {
    format!(
        "**Reward claimed**\n**Account**: `{account}`\n**Epoch**: `{epoch}`\n**Transactions**: `{tx_count}`\n**Digest**: `{digest}`"
    )
}

pub fn format_funding_failure(error: &str) -> String {
    format!("**Funding failed**, fleet accounts may run out of gas\n```{error}```")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_webhook_disables_alerts() {
        assert!(Notifier::from_webhook(None).is_none());
        assert!(Notifier::from_webhook(Some(String::new())).is_none());
        assert!(Notifier::from_webhook(Some("https://discord.test/hook".to_owned())).is_some());
    }

    #[test]
    fn claim_alert_names_account_and_digest() {
        let alert = format_claim_alert(3, 8, 120, &"Dg1".to_owned());
        assert!(alert.contains("`3`"));
        assert!(alert.contains("`120`"));
        assert!(alert.contains("`Dg1`"));
    }
}
