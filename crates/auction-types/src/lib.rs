//! Shared types for the auction relay.
//!
//! Every other crate in the workspace depends on this one for the canonical
//! auction record, the sponsored-call vocabulary, the auction house ABI and
//! the configuration schema helpers.

pub mod account;
pub mod auction;
pub mod contracts;
pub mod delivery;
pub mod events;
pub mod settlement;
pub mod utils;
pub mod validation;

pub use account::*;
pub use auction::*;
pub use delivery::*;
pub use events::*;
pub use settlement::*;
pub use utils::*;
pub use validation::*;
