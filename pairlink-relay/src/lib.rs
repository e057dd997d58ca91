//! HTTP rendezvous for pairlink sessions.
//!
//! Each session has two last-write-wins keys, `offer` and `answer`, served
//! under `/sessions/{session}/{kind}`. Endpoints observe a key with the
//! long-poll `watch` route instead of holding a socket open.

mod error;
mod routes;

pub use error::RelayError;
pub use routes::{MAX_WATCH_TIMEOUT, router, serve};
