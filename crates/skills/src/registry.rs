use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{Result, SkillError};
use crate::guard::{check_skill_name, confine, is_write_protected, relative_to};
use crate::sandbox::{SandboxProvider, ScriptExecutionResult};

/// Documentation file every skill carries. Matched case-sensitively.
pub const SKILL_DOC: &str = "SKILL.MD";

/// Upper bound for a skill's documentation file.
pub const MAX_DOC_BYTES: u64 = 1024 * 1024;

/// Text file read from inside a skill.
#[derive(Debug, Clone, Serialize)]
pub struct FileContent {
    pub content: String,
    pub size_bytes: u64,
}

/// List/read/write/run operations scoped to one skill folder at a time.
pub struct SkillsRegistry {
    skills_root: PathBuf,
    sandbox: Arc<dyn SandboxProvider>,
    script_timeout: Duration,
}

impl SkillsRegistry {
    pub fn new(
        skills_root: impl Into<PathBuf>,
        sandbox: Arc<dyn SandboxProvider>,
        script_timeout: Duration,
    ) -> Self {
        Self {
            skills_root: skills_root.into(),
            sandbox,
            script_timeout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.skills_root
    }

    pub fn sandbox(&self) -> &Arc<dyn SandboxProvider> {
        &self.sandbox
    }

    /// Names of all skill folders, sorted ascending.
    pub fn list_skills(&self) -> Result<Vec<String>> {
        let start = Instant::now();
        let root = &self.skills_root;
        if !root.exists() {
            return Err(SkillError::RootMissing(root.clone()));
        }
        if !root.is_dir() {
            return Err(SkillError::RootNotDir(root.clone()));
        }

        let entries = std::fs::read_dir(root)
            .map_err(|e| SkillError::io(format!("cannot list '{}'", root.display()), e))?;

        let mut skills: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| crate::guard::validate_skill_name(name))
            .collect();
        skills.sort();

        log_duration("list_skills", start);
        Ok(skills)
    }

    /// Contents of the skill's `SKILL.MD`.
    pub fn get_skill_doc(&self, skill_name: &str) -> Result<String> {
        let start = Instant::now();
        let skill_dir = self.skill_dir(skill_name)?;

        if !has_exact_entry(&skill_dir, SKILL_DOC) {
            return Err(SkillError::DocNotFound(skill_name.to_owned()));
        }
        let doc_path = skill_dir.join(SKILL_DOC);
        let context = || format!("Error reading SKILL.MD for skill '{skill_name}'");

        let meta = std::fs::metadata(&doc_path).map_err(|e| SkillError::io(context(), e))?;
        if meta.len() > MAX_DOC_BYTES {
            return Err(SkillError::TooLarge(format!("SKILL.MD for skill '{skill_name}'")));
        }
        let bytes = std::fs::read(&doc_path).map_err(|e| SkillError::io(context(), e))?;
        let doc = String::from_utf8(bytes)
            .map_err(|_| SkillError::NotUtf8(format!("SKILL.MD for skill '{skill_name}'")))?;

        log_duration("get_skill", start);
        Ok(doc)
    }

    /// Read a UTF-8 file at `file_path`, relative to the skill folder.
    pub fn read_file(&self, skill_name: &str, file_path: &str) -> Result<FileContent> {
        let start = Instant::now();
        let skill_dir = self.skill_dir(skill_name)?;
        let target = confine(&skill_dir, file_path)?;

        if !target.is_file() {
            return Err(SkillError::FileNotFound {
                skill_name: skill_name.to_owned(),
                file_path: file_path.to_owned(),
            });
        }
        let bytes = std::fs::read(&target)
            .map_err(|e| SkillError::io(format!("Cannot read file '{file_path}'"), e))?;
        let size_bytes = bytes.len() as u64;
        let content = String::from_utf8(bytes)
            .map_err(|_| SkillError::NotUtf8(format!("file '{file_path}'")))?;

        log_duration("read_file_in_skill", start);
        Ok(FileContent {
            content,
            size_bytes,
        })
    }

    /// Write `content` to `file_path` inside an existing skill, creating
    /// intermediate directories. Returns the number of bytes written.
    pub fn write_file(&self, skill_name: &str, file_path: &str, content: &str) -> Result<usize> {
        let start = Instant::now();
        let skill_dir = self.skill_dir(skill_name)?;
        let target = confine(&skill_dir, file_path)?;

        let relative = relative_to(&skill_dir, &target).ok_or(SkillError::Traversal)?;
        if is_write_protected(&relative) {
            tracing::warn!(skill = %skill_name, file_path = %file_path, "protected write rejected");
            return Err(SkillError::Forbidden(file_path.to_owned()));
        }
        if target.is_dir() {
            return Err(SkillError::InvalidPath);
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SkillError::io("failed to create parent directory", e))?;
        }

        // Write to a sibling temp file, then rename into place.
        let tmp_name = format!(
            ".{}.{}.tmp",
            target
                .file_name()
                .unwrap_or_default()
                .to_string_lossy(),
            uuid::Uuid::new_v4().as_simple()
        );
        let tmp_path = target.with_file_name(tmp_name);
        std::fs::write(&tmp_path, content.as_bytes())
            .map_err(|e| SkillError::io(format!("Cannot write file '{file_path}'"), e))?;
        if let Err(e) = std::fs::rename(&tmp_path, &target) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(SkillError::io(format!("Cannot write file '{file_path}'"), e));
        }

        log_duration("write_file_in_skill", start);
        Ok(content.len())
    }

    /// Run `script` with the skill's isolated interpreter.
    ///
    /// Timeouts and non-zero exits are reported inside the returned result;
    /// only a bad name, missing skill or missing runtime is an `Err`.
    pub async fn run_python_script(
        &self,
        skill_name: &str,
        script: &str,
    ) -> Result<ScriptExecutionResult> {
        let start = Instant::now();
        let skill_dir = self.skill_dir(skill_name)?;
        let skill_dir = skill_dir
            .canonicalize()
            .map_err(|e| SkillError::io(format!("cannot resolve skill '{skill_name}'"), e))?;

        let interpreter = self
            .sandbox
            .find_interpreter(&skill_dir)
            .ok_or_else(|| SkillError::RuntimeMissing(skill_name.to_owned()))?;

        let result = self
            .sandbox
            .execute(&interpreter, script, &skill_dir, self.script_timeout)
            .await;

        tracing::debug!(
            skill = %skill_name,
            succeeded = result.succeeded(),
            error_kind = ?result.error_kind(),
            "script finished"
        );
        log_duration("run_python_script", start);
        Ok(result)
    }

    /// Validated path of an existing skill folder.
    pub fn skill_dir(&self, skill_name: &str) -> Result<PathBuf> {
        check_skill_name(skill_name)?;
        let dir = self.skills_root.join(skill_name);
        if !dir.is_dir() {
            return Err(SkillError::SkillNotFound(skill_name.to_owned()));
        }
        Ok(dir)
    }
}

fn has_exact_entry(dir: &Path, name: &str) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .any(|e| e.file_name() == name && e.path().is_file())
        })
        .unwrap_or(false)
}

fn log_duration(operation: &str, start: Instant) {
    tracing::info!(
        operation = operation,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "skill operation completed"
    );
}
