pub mod startup;
pub mod workspace;

pub use startup::{StartupSequence, StartupSequenceTracker};
pub use workspace::{Struts, Workspace, WorkspaceId, WorkspaceList};
