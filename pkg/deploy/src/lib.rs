//! Fleet deployment: pushes issued certificates to every node and rebuilds
//! each node's secret store, isolating failures per node.

pub mod commands;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod poll;
pub mod profile;
pub mod progress;

pub use commands::RemoteCommands;
pub use context::{DeployContext, DeployOptions};
pub use error::{DeployError, Result};
pub use orchestrator::{FleetDeployer, deploy};
pub use poll::{PollError, Poller};
pub use profile::{Artifact, ArtifactProfile};
pub use progress::{NoProgress, ProgressSink};
