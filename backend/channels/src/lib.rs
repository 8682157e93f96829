use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use aquadash_core::DashError;

pub mod token_cache;
pub mod wework;

pub use token_cache::TokenCache;
pub use wework::{WeworkClient, WeworkUser};

/// A clickable notification card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub title: String,
    pub description: String,
    pub url: String,
}

/// Push channel for risk notices. Recipients are channel-specific user ids.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name for logging.
    fn name(&self) -> &str;

    async fn send_text(&self, user_ids: &[String], text: &str) -> Result<(), DashError>;

    async fn send_card(&self, user_ids: &[String], card: &Card) -> Result<(), DashError>;
}
