pub mod coordinator;
pub mod naming;
pub mod plugin;
pub mod plugins;
pub mod rpc;
pub mod sequential;
pub mod worker;

pub use rpc::Pair;
