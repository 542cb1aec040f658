//! Two-phase skill creation: `propose` records a request and hands out a
//! one-time token, `confirm` performs the filesystem work.
//!
//! Nothing touches the disk until a token is confirmed through an external
//! channel (HTTP endpoint or the interactive REPL).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{ErrorKind, Result, SkillError};
use crate::guard::{check_skill_name, VENV_DIR};
use crate::registry::SKILL_DOC;
use crate::sandbox::SandboxProvider;

/// Dependency manifest written next to `SKILL.MD`.
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

pub const INVALID_TOKEN: &str = "invalid or expired token";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A creation request waiting for confirmation.
#[derive(Debug, Clone)]
pub struct PendingCreation {
    pub token: String,
    pub skill_name: String,
    pub documentation: String,
    pub requirements: Option<String>,
    pub skills_root: PathBuf,
    created_at: Instant,
}

#[derive(Debug, Clone)]
pub struct CreationProposal {
    pub token: String,
    pub skill_name: String,
    pub actions: Vec<String>,
}

impl CreationProposal {
    pub fn to_payload(&self) -> Value {
        json!({
            "status": "pending_confirmation",
            "confirmation_token": self.token,
            "skill_name": self.skill_name,
            "actions": self.actions,
            "message": format!(
                "Nothing has been created yet. Show the planned actions to the user; \
                 the skill is created only after they confirm with token {}.",
                self.token
            ),
        })
    }
}

/// Result of a confirmation. Steps are additive: a failure leaves earlier
/// artifacts in place and the flags say which steps completed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreationOutcome {
    pub success: bool,
    pub skill_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_path: Option<PathBuf>,
    pub folder_created: bool,
    pub venv_created: bool,
    pub dependencies_installed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CreationOutcome {
    fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }

    /// `PartialSuccess` when some steps completed before a failure.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match (self.success, self.folder_created) {
            (true, _) => None,
            (false, true) => Some(ErrorKind::PartialSuccess),
            (false, false) if self.error.as_deref() == Some(INVALID_TOKEN) => {
                Some(ErrorKind::NotFound)
            }
            (false, false) => Some(ErrorKind::Execution),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pending proposals keyed by token.
pub struct PendingCreationStore {
    pending: Mutex<HashMap<String, PendingCreation>>,
    ttl: Option<Duration>,
}

impl PendingCreationStore {
    /// `ttl = None` keeps proposals until they are confirmed.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Build from a seconds value where `0` disables expiry.
    pub fn with_ttl_secs(secs: u64) -> Self {
        Self::new((secs > 0).then(|| Duration::from_secs(secs)))
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Validate and record a creation request. Does not touch the disk.
    pub fn propose(
        &self,
        skill_name: &str,
        documentation: &str,
        requirements: Option<&str>,
        skills_root: &Path,
    ) -> Result<CreationProposal> {
        check_skill_name(skill_name)?;
        let skill_path = skills_root.join(skill_name);
        if skill_path.exists() {
            return Err(SkillError::SkillExists(skill_name.to_owned()));
        }

        let requirements = requirements
            .filter(|r| !r.trim().is_empty())
            .map(str::to_owned);
        let packages = requirements.as_deref().map(parse_packages).unwrap_or_default();

        let mut actions = vec![
            format!("Create folder {}", skill_path.display()),
            format!("Write {SKILL_DOC} ({} bytes)", documentation.len()),
        ];
        if requirements.is_some() {
            actions.push(format!("Write {REQUIREMENTS_FILE}"));
        }
        actions.push(format!(
            "Create virtual environment {}",
            skill_path.join(VENV_DIR).display()
        ));
        if !packages.is_empty() {
            actions.push(format!("Install dependencies: {}", packages.join(", ")));
        }

        let token = uuid::Uuid::new_v4().simple().to_string();
        let entry = PendingCreation {
            token: token.clone(),
            skill_name: skill_name.to_owned(),
            documentation: documentation.to_owned(),
            requirements,
            skills_root: skills_root.to_path_buf(),
            created_at: Instant::now(),
        };

        self.purge_expired();
        self.pending.lock().insert(token.clone(), entry);
        tracing::info!(skill = %skill_name, "skill creation proposed");

        Ok(CreationProposal {
            token,
            skill_name: skill_name.to_owned(),
            actions,
        })
    }

    /// Atomically remove the entry for `token`. Expired entries are removed
    /// and reported as absent.
    pub fn take(&self, token: &str) -> Option<PendingCreation> {
        let entry = self.pending.lock().remove(token)?;
        if self.is_expired(&entry) {
            tracing::info!(skill = %entry.skill_name, "creation proposal expired");
            return None;
        }
        Some(entry)
    }

    /// Drop every expired proposal. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|_, entry| !self.is_expired(entry));
        before - pending.len()
    }

    fn is_expired(&self, entry: &PendingCreation) -> bool {
        self.ttl
            .map(|ttl| entry.created_at.elapsed() >= ttl)
            .unwrap_or(false)
    }

    /// Execute the proposal recorded under `token`.
    ///
    /// A token can be confirmed once; later calls report an invalid token.
    pub async fn confirm(
        &self,
        token: &str,
        sandbox: &dyn SandboxProvider,
        install_timeout: Duration,
    ) -> CreationOutcome {
        let Some(entry) = self.take(token) else {
            return CreationOutcome::default().failed(INVALID_TOKEN);
        };
        let outcome = execute(&entry, sandbox, install_timeout).await;
        tracing::info!(
            skill = %entry.skill_name,
            success = outcome.success,
            folder_created = outcome.folder_created,
            venv_created = outcome.venv_created,
            "skill creation confirmed"
        );
        outcome
    }
}

async fn execute(
    entry: &PendingCreation,
    sandbox: &dyn SandboxProvider,
    install_timeout: Duration,
) -> CreationOutcome {
    let skill_path = entry.skills_root.join(&entry.skill_name);
    let mut outcome = CreationOutcome {
        skill_name: entry.skill_name.clone(),
        ..Default::default()
    };

    // Fails when the folder appeared after the proposal was made.
    if let Err(e) = std::fs::create_dir(&skill_path) {
        let msg = if e.kind() == std::io::ErrorKind::AlreadyExists {
            format!("Skill '{}' already exists", entry.skill_name)
        } else {
            format!("Failed to create skill folder: {e}")
        };
        return outcome.failed(msg);
    }
    outcome.folder_created = true;
    outcome.skill_path = Some(skill_path.clone());

    if let Err(e) = std::fs::write(skill_path.join(SKILL_DOC), &entry.documentation) {
        return outcome.failed(format!("Failed to write {SKILL_DOC}: {e}"));
    }

    let manifest = match &entry.requirements {
        Some(text) => {
            let path = skill_path.join(REQUIREMENTS_FILE);
            if let Err(e) = std::fs::write(&path, text) {
                return outcome.failed(format!("Failed to write {REQUIREMENTS_FILE}: {e}"));
            }
            Some(path)
        }
        None => None,
    };

    if let Err(e) = sandbox.provision(&skill_path).await {
        return outcome.failed(e);
    }
    outcome.venv_created = true;

    if let Some(manifest) = manifest {
        if let Err(e) = sandbox
            .install_requirements(&skill_path, &manifest, install_timeout)
            .await
        {
            return outcome.failed(e);
        }
        outcome.dependencies_installed = true;
    }

    outcome.success = true;
    outcome.message = Some(format!("Skill '{}' created successfully", entry.skill_name));
    outcome
}

/// Package names declared in a requirements text: non-blank, non-comment
/// lines.
pub fn parse_packages(requirements: &str) -> Vec<String> {
    requirements
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_owned)
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
