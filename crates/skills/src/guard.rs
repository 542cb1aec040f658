//! Path Guard: skill-name validation and per-skill path confinement.
//!
//! Every filesystem-touching operation validates the skill name first and
//! resolves caller-supplied paths through [`confine`] before any I/O.

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, SkillError};

/// Folder holding a skill's isolated interpreter.
pub const VENV_DIR: &str = "venv";

/// True when `name` can safely be used as a single folder name under the
/// skills root.
///
/// Rejects empty names, `.`, and anything containing `/`, `\` or `..`.
pub fn validate_skill_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..")
        && !name.contains('\0')
}

/// Return `Ok(())` for a valid name, the descriptive error otherwise.
pub fn check_skill_name(name: &str) -> Result<()> {
    if validate_skill_name(name) {
        Ok(())
    } else {
        Err(SkillError::InvalidName(name.to_owned()))
    }
}

/// Resolve `requested` against `skill_dir` and verify the result stays
/// inside it.
///
/// Existing targets are canonicalized, so symlinks pointing outside the
/// skill are caught. For targets that do not exist yet the nearest existing
/// ancestor is canonicalized and the remaining components are applied
/// lexically. Absolute inputs replace the base on join and therefore fail
/// the containment check.
pub fn confine(skill_dir: &Path, requested: &str) -> Result<PathBuf> {
    if requested.trim().is_empty() || requested.contains('\0') {
        return Err(SkillError::InvalidPath);
    }

    let root = skill_dir
        .canonicalize()
        .map_err(|e| SkillError::io(format!("cannot resolve '{}'", skill_dir.display()), e))?;

    let candidate = root.join(requested);
    let resolved = resolve_lenient(&candidate)
        .map_err(|e| SkillError::io(format!("cannot resolve '{requested}'"), e))?;

    if !resolved.starts_with(&root) {
        tracing::warn!(
            skill_dir = %root.display(),
            requested = %requested,
            "path traversal attempt rejected"
        );
        return Err(SkillError::Traversal);
    }
    Ok(resolved)
}

/// Relative path of `resolved` below `skill_dir`, or `None` when it is not
/// a descendant.
pub fn relative_to(skill_dir: &Path, resolved: &Path) -> Option<PathBuf> {
    let root = skill_dir.canonicalize().ok()?;
    resolved.strip_prefix(root).ok().map(Path::to_path_buf)
}

/// Writes may not touch hidden entries or the interpreter subtree.
pub fn is_write_protected(relative: &Path) -> bool {
    let mut parts = relative.components().filter_map(|c| match c {
        Component::Normal(p) => Some(p.to_string_lossy()),
        _ => None,
    });
    let Some(first) = parts.next() else {
        return true;
    };
    if first == VENV_DIR || first.starts_with('.') {
        return true;
    }
    parts.any(|p| p.starts_with('.'))
}

fn resolve_lenient(candidate: &Path) -> std::io::Result<PathBuf> {
    if candidate.exists() {
        return candidate.canonicalize();
    }

    let mut existing = candidate;
    let mut tail: Vec<Component<'_>> = Vec::new();
    while !existing.exists() {
        let Some(parent) = existing.parent() else {
            break;
        };
        if let Some(last) = existing.components().next_back() {
            tail.push(last);
        }
        existing = parent;
    }

    let mut resolved = existing.canonicalize()?;
    for component in tail.into_iter().rev() {
        match component {
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(part) => resolved.push(part),
            _ => {}
        }
    }
    Ok(resolved)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
