//! Chain state: amounts, transactions, blocks, and the validated ledger.

pub mod amount;
pub mod block;
pub mod ledger;
pub mod transaction;

pub use amount::Amount;
pub use block::{block_material, compute_block_hash, sum_fees, Block};
pub use ledger::{work_of, AddressData, Chain};
pub use transaction::{validate_shape, Transaction};
