pub mod access;
pub mod address;
pub mod amount;
pub mod auth;
pub mod csv;
pub mod engine;
pub mod ledger;
pub mod model;
pub mod snapshot;

pub use address::Address;
pub use amount::Amount;
pub use engine::{PoolError, SwapPool};
pub use ledger::{AssetLedger, InMemoryLedger};
pub use model::{Action, Call, PoolEvent, SequenceId, Swap, SwapParams, SwapRequest, SwapStatus};
