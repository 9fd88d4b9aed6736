//! Wallet linking
//! --------------
//! A screen presents its session credential together with a wallet address. Once the
//! credential verifies and the oracle accepts the address, the address is written to
//! the screen row and the owning app is pinged.

mod linker;
pub mod validator;

pub use linker::{LinkOutcome, NotificationDispatch, WalletLinker, PUSH_BODY, PUSH_TITLE};
pub use validator::{FormatWalletValidator, OracleWalletValidator, WalletValidator};
