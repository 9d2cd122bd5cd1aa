//! Connection handling subsystem.
//!
//! # Data Flow
//! ```text
//! TcpListener
//!     → listener.rs (accept loop until the stop signal)
//!     → connection.rs (one tracked task per connection, HTTP/1.1 + HTTP/2)
//!     → Router (middleware + routes)
//!
//! On stop:
//!     listener closed → idle connections closed → in-flight requests finish
//!     → on force: every connection task still running is aborted
//! ```
//!
//! # Design Decisions
//! - All connection tasks live in one `JoinSet`, so they can be aborted together
//! - The accept loop owns the set; dropping the loop drops every connection

pub mod connection;
pub mod listener;

pub use connection::{Connections, Drained};
pub use listener::serve;
