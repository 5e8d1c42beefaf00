// Polled contract reads with a short-lived cache in front of the reader.
//
// Flow state never stands in for chain state: after a successful transaction
// the controller asks a `Refresh` implementation to drop the affected cache
// entries so the next read goes back to the contracts.

use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::capabilities::{GatewayError, StateReader};
use crate::protocol::{Address, Invoice, TokenId, Usdc, VaultKind};

#[cfg(test)]
use mockall::automock;

/// Group of reads invalidated together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshScope {
    Balances,
    Invoices,
    Vaults,
    Yield,
    Donations,
    All,
}

/// Something that can re-read chain state after a write
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Refresh: Send + Sync {
    async fn refresh(&self, scopes: &[RefreshScope]);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ReadKey {
    UsdcBalance(Address),
    UserInvoices(Address),
    Invoice(TokenId),
    Reputation(Address),
    VaultShares(VaultKind, Address),
    ConvertToAssets(VaultKind, Usdc),
    MaxWithdraw(VaultKind, Address),
    ClaimableYield(Address),
    PendingHarvest(VaultKind),
    TotalDonated,
    BusinessContribution(Address),
}

impl ReadKey {
    fn scope(&self) -> RefreshScope {
        match self {
            ReadKey::UsdcBalance(_) => RefreshScope::Balances,
            ReadKey::UserInvoices(_) | ReadKey::Invoice(_) | ReadKey::Reputation(_) => {
                RefreshScope::Invoices
            }
            ReadKey::VaultShares(..) | ReadKey::ConvertToAssets(..) | ReadKey::MaxWithdraw(..) => {
                RefreshScope::Vaults
            }
            ReadKey::ClaimableYield(_) | ReadKey::PendingHarvest(_) => RefreshScope::Yield,
            ReadKey::TotalDonated | ReadKey::BusinessContribution(_) => RefreshScope::Donations,
        }
    }
}

#[derive(Debug, Clone)]
enum ReadValue {
    Amount(Usdc),
    Ids(Vec<TokenId>),
    Invoice(Option<Invoice>),
    Count(u64),
}

/// Caching decorator over any [`StateReader`]
#[derive(Clone)]
pub struct CachedReader {
    inner: Arc<dyn StateReader>,
    cache: Cache<ReadKey, ReadValue>,
}

impl CachedReader {
    pub fn new(inner: Arc<dyn StateReader>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1_000)
            .time_to_live(ttl)
            .support_invalidation_closures()
            .build();
        Self { inner, cache }
    }

    pub fn invalidate(&self, scopes: &[RefreshScope]) {
        if scopes.contains(&RefreshScope::All) {
            self.cache.invalidate_all();
            return;
        }
        let scopes = scopes.to_vec();
        if let Err(e) = self
            .cache
            .invalidate_entries_if(move |key, _| scopes.contains(&key.scope()))
        {
            warn!("Falling back to full cache invalidation: {}", e);
            self.cache.invalidate_all();
        }
    }

    async fn cached<F>(&self, key: ReadKey, load: F) -> Result<ReadValue, GatewayError>
    where
        F: std::future::Future<Output = Result<ReadValue, GatewayError>>,
    {
        if let Some(hit) = self.cache.get(&key).await {
            debug!(key = ?key, "Read cache hit");
            return Ok(hit);
        }
        let value = load.await?;
        self.cache.insert(key, value.clone()).await;
        Ok(value)
    }

    async fn amount<F>(&self, key: ReadKey, load: F) -> Result<Usdc, GatewayError>
    where
        F: std::future::Future<Output = Result<Usdc, GatewayError>>,
    {
        match self.cached(key, async { load.await.map(ReadValue::Amount) }).await? {
            ReadValue::Amount(amount) => Ok(amount),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(value: ReadValue) -> GatewayError {
    GatewayError::Provider(format!("read cache returned mismatched value: {value:?}"))
}

#[async_trait]
impl StateReader for CachedReader {
    async fn usdc_balance(&self, account: &Address) -> Result<Usdc, GatewayError> {
        self.amount(ReadKey::UsdcBalance(account.clone()), self.inner.usdc_balance(account))
            .await
    }

    async fn user_invoices(&self, account: &Address) -> Result<Vec<TokenId>, GatewayError> {
        let load = async { self.inner.user_invoices(account).await.map(ReadValue::Ids) };
        match self.cached(ReadKey::UserInvoices(account.clone()), load).await? {
            ReadValue::Ids(ids) => Ok(ids),
            other => Err(unexpected(other)),
        }
    }

    async fn invoice(&self, token_id: TokenId) -> Result<Option<Invoice>, GatewayError> {
        let load = async { self.inner.invoice(token_id).await.map(ReadValue::Invoice) };
        match self.cached(ReadKey::Invoice(token_id), load).await? {
            ReadValue::Invoice(invoice) => Ok(invoice),
            other => Err(unexpected(other)),
        }
    }

    async fn reputation(&self, account: &Address) -> Result<u64, GatewayError> {
        let load = async { self.inner.reputation(account).await.map(ReadValue::Count) };
        match self.cached(ReadKey::Reputation(account.clone()), load).await? {
            ReadValue::Count(score) => Ok(score),
            other => Err(unexpected(other)),
        }
    }

    async fn vault_shares(&self, vault: VaultKind, account: &Address) -> Result<Usdc, GatewayError> {
        self.amount(
            ReadKey::VaultShares(vault, account.clone()),
            self.inner.vault_shares(vault, account),
        )
        .await
    }

    async fn convert_to_assets(&self, vault: VaultKind, shares: Usdc) -> Result<Usdc, GatewayError> {
        self.amount(
            ReadKey::ConvertToAssets(vault, shares),
            self.inner.convert_to_assets(vault, shares),
        )
        .await
    }

    async fn max_withdraw(&self, vault: VaultKind, account: &Address) -> Result<Usdc, GatewayError> {
        self.amount(
            ReadKey::MaxWithdraw(vault, account.clone()),
            self.inner.max_withdraw(vault, account),
        )
        .await
    }

    async fn claimable_yield(&self, account: &Address) -> Result<Usdc, GatewayError> {
        self.amount(
            ReadKey::ClaimableYield(account.clone()),
            self.inner.claimable_yield(account),
        )
        .await
    }

    async fn pending_harvest(&self, vault: VaultKind) -> Result<Usdc, GatewayError> {
        self.amount(ReadKey::PendingHarvest(vault), self.inner.pending_harvest(vault))
            .await
    }

    async fn total_donated(&self) -> Result<Usdc, GatewayError> {
        self.amount(ReadKey::TotalDonated, self.inner.total_donated()).await
    }

    async fn business_contribution(&self, account: &Address) -> Result<Usdc, GatewayError> {
        self.amount(
            ReadKey::BusinessContribution(account.clone()),
            self.inner.business_contribution(account),
        )
        .await
    }
}

#[async_trait]
impl Refresh for CachedReader {
    async fn refresh(&self, scopes: &[RefreshScope]) {
        debug!(scopes = ?scopes, "Invalidating cached reads");
        self.invalidate(scopes);
        self.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Counts balance reads and returns a balance that grows with each read
    struct CountingReader {
        balance_reads: AtomicU32,
    }

    #[async_trait]
    impl StateReader for CountingReader {
        async fn usdc_balance(&self, _account: &Address) -> Result<Usdc, GatewayError> {
            let n = self.balance_reads.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Usdc::from_whole(n as u64 * 100))
        }
        async fn user_invoices(&self, _account: &Address) -> Result<Vec<TokenId>, GatewayError> {
            Ok(vec![1, 2])
        }
        async fn invoice(&self, _token_id: TokenId) -> Result<Option<Invoice>, GatewayError> {
            Ok(None)
        }
        async fn reputation(&self, _account: &Address) -> Result<u64, GatewayError> {
            Ok(3)
        }
        async fn vault_shares(&self, _vault: VaultKind, _account: &Address) -> Result<Usdc, GatewayError> {
            Ok(Usdc::ZERO)
        }
        async fn convert_to_assets(&self, _vault: VaultKind, shares: Usdc) -> Result<Usdc, GatewayError> {
            Ok(shares)
        }
        async fn max_withdraw(&self, _vault: VaultKind, _account: &Address) -> Result<Usdc, GatewayError> {
            Ok(Usdc::ZERO)
        }
        async fn claimable_yield(&self, _account: &Address) -> Result<Usdc, GatewayError> {
            Err(GatewayError::Network("rpc down".into()))
        }
        async fn pending_harvest(&self, _vault: VaultKind) -> Result<Usdc, GatewayError> {
            Ok(Usdc::ZERO)
        }
        async fn total_donated(&self) -> Result<Usdc, GatewayError> {
            Ok(Usdc::from_whole(42))
        }
        async fn business_contribution(&self, _account: &Address) -> Result<Usdc, GatewayError> {
            Ok(Usdc::ZERO)
        }
    }

    fn reader() -> (CachedReader, Arc<CountingReader>) {
        let inner = Arc::new(CountingReader { balance_reads: AtomicU32::new(0) });
        (CachedReader::new(inner.clone(), Duration::from_secs(60)), inner)
    }

    #[tokio::test]
    async fn test_reads_are_served_from_cache() {
        let (cached, inner) = reader();
        let account = Address::zero();

        assert_eq!(cached.usdc_balance(&account).await.unwrap(), Usdc::from_whole(100));
        assert_eq!(cached.usdc_balance(&account).await.unwrap(), Usdc::from_whole(100));
        assert_eq!(inner.balance_reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_forces_a_new_read_for_its_scope() {
        let (cached, inner) = reader();
        let account = Address::zero();

        cached.usdc_balance(&account).await.unwrap();
        cached.refresh(&[RefreshScope::Invoices]).await;
        cached.usdc_balance(&account).await.unwrap();
        assert_eq!(inner.balance_reads.load(Ordering::SeqCst), 1);

        cached.refresh(&[RefreshScope::Balances]).await;
        assert_eq!(cached.usdc_balance(&account).await.unwrap(), Usdc::from_whole(200));
        assert_eq!(inner.balance_reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let (cached, _) = reader();
        let account = Address::zero();
        assert!(cached.claimable_yield(&account).await.is_err());
        assert!(cached.claimable_yield(&account).await.is_err());
        assert_eq!(cached.user_invoices(&account).await.unwrap(), vec![1, 2]);
    }
}
