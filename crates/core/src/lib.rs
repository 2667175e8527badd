//! Dense square blocks and the text formats used to move them around.
//!
//! Everything here is pure: the scheduler crate builds the job tree on top of
//! [`Block`], and both ends of a worker connection speak the format in
//! [`codec`].

pub mod block;
pub mod codec;
pub mod error;

pub use block::Block;
pub use codec::ControlToken;
pub use error::*;
