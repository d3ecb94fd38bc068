//! Adapters: the Roon Core on one side, the MPRIS surface on the other

pub mod handle;
#[cfg(feature = "mpris")]
pub mod mpris;
#[cfg(feature = "roon")]
pub mod roon;
pub mod traits;

pub use handle::*;
pub use traits::*;
