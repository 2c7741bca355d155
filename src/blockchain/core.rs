// Blocks and the local chain live in `chain`; structural and ledger checks in `validation`.
pub mod chain;
pub mod validation;

pub use chain::*;
pub use validation::*;
