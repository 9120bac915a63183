//! Domain logic - pure rules independent of git, files and the network

pub mod remote;
pub mod version;

pub use remote::RemoteEndpoint;
pub use version::{BumpCandidates, BumpKind, Version};
