//! A single-machine MapReduce execution engine in the style of the original
//! Google MapReduce paper: a coordinator dispatches map and reduce tasks to a
//! pool of worker processes over a local RPC transport.

pub mod error;
pub mod logging;
pub mod mr;
