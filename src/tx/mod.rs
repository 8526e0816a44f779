//! Transaction building: gas pricing, nonce selection and signing

mod gas;
mod nonce;
mod transfer;

pub use gas::GasOracle;
pub use nonce::NonceTracker;
pub use transfer::sign_transfer;
