//! # Wire format
//!
//! Fixed 9-byte UDP payload sent to the remote listener:
//!
//! ```text
//! offset  size  field     encoding
//! 0       1     kind      ASCII byte ('L', 'R' or 'C')
//! 1       4     value     i32, big-endian
//! 5       4     lapse_ms  i32, big-endian
//! ```

pub mod message;

pub use message::{DecodeError, KnobMessage, MESSAGE_LEN};
