// Protocol-facing value types: amounts, addresses, invoices and vaults.
// Everything here is a projection of contract state; nothing is authoritative.

pub mod address;
pub mod amount;
pub mod invoice;
pub mod vault;

pub use address::{Address, Explorer, TxHash};
pub use amount::{AmountError, Usdc};
pub use invoice::{Invoice, InvoiceStatus, InvoiceTerms, TokenId};
pub use vault::{DistributionBreakdown, VaultKind, VaultPosition, YieldEstimate};
