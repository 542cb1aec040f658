//! Skill storage and execution: the Path Guard, registry operations, the
//! sandbox provider seam and the two-phase creation transaction.

pub mod creation;
pub mod error;
pub mod guard;
pub mod registry;
pub mod sandbox;

pub use creation::{CreationOutcome, CreationProposal, PendingCreationStore};
pub use error::{ErrorKind, SkillError};
pub use guard::validate_skill_name;
pub use registry::{FileContent, SkillsRegistry, SKILL_DOC};
pub use sandbox::{SandboxProvider, ScriptExecutionResult, VenvSandbox};
