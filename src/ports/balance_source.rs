//! The `BalanceSource` port: the chain-read capability the cache's balance
//! refresh (§4.5 step 6) uses, kept separate from [`crate::ports::ChainAdapter`]
//! so the cache doesn't need to depend on the full adapter surface.

use async_trait::async_trait;

use crate::error::Result;

/// Fetches a single address's current balance as a decimal string.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Fetch the balance of `address`, rendered as a decimal string (wei, for
    /// Ethereum).
    async fn balance_of(&self, address: &str) -> Result<String>;
}
