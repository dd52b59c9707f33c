//! Transport backends for `midiport`.
//!
//! Implementations of [`PortProvider`](crate::transport::PortProvider) and
//! [`PortHandle`](crate::transport::PortHandle).
//!
//! # Feature flags
//! - **`virtual`** — in-memory endpoints with injectable failures (default).
//!
//! Hardware transports live outside this crate; they only need to implement the
//! two traits in [`transport`](crate::transport).

#[cfg(feature = "virtual")]
#[cfg_attr(docsrs, doc(cfg(feature = "virtual")))]
pub mod virtual_port;

#[cfg(feature = "virtual")]
pub use virtual_port::{VirtualBackend, VirtualPort};
