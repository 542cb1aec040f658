use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sr_skills::{ErrorKind, SkillError, SkillsRegistry, VenvSandbox};
use tempfile::TempDir;

fn registry(root: &Path) -> SkillsRegistry {
    SkillsRegistry::new(
        root,
        Arc::new(VenvSandbox::new("python3", Duration::from_secs(30))),
        Duration::from_secs(5),
    )
}

fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    let calc = dir.path().join("calculator");
    std::fs::create_dir_all(calc.join("scripts")).unwrap();
    std::fs::write(calc.join("SKILL.MD"), "# Calculator").unwrap();
    std::fs::write(calc.join("scripts/add.py"), "print(1 + 1)\n").unwrap();
    std::fs::write(dir.path().join("outside.txt"), "secret").unwrap();
    dir
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// list_skills
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn list_is_sorted_and_directories_only() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("beta")).unwrap();
    std::fs::create_dir(dir.path().join("alpha")).unwrap();
    std::fs::write(dir.path().join("not_a_dir.txt"), "").unwrap();

    let skills = registry(dir.path()).list_skills().unwrap();
    assert_eq!(skills, vec!["alpha".to_string(), "beta".to_string()]);
}

#[test]
fn list_reports_missing_root() {
    let dir = TempDir::new().unwrap();
    let err = registry(&dir.path().join("nope")).list_skills().unwrap_err();
    assert!(matches!(err, SkillError::RootMissing(_)));
    assert!(err.to_string().starts_with("Skills folder not found"));
}

#[test]
fn list_reports_file_root() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("file");
    std::fs::write(&file, "").unwrap();
    let err = registry(&file).list_skills().unwrap_err();
    assert!(matches!(err, SkillError::RootNotDir(_)));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// get_skill_doc
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn doc_is_returned_verbatim() {
    let dir = fixture();
    let doc = registry(dir.path()).get_skill_doc("calculator").unwrap();
    assert_eq!(doc, "# Calculator");
}

#[test]
fn doc_name_is_case_sensitive() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("lower")).unwrap();
    std::fs::write(dir.path().join("lower/skill.md"), "# lower").unwrap();
    let err = registry(dir.path()).get_skill_doc("lower").unwrap_err();
    assert!(matches!(err, SkillError::DocNotFound(_)));
}

#[test]
fn oversized_doc_is_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("big")).unwrap();
    std::fs::write(dir.path().join("big/SKILL.MD"), vec![b'a'; 1024 * 1024 + 1]).unwrap();
    let err = registry(dir.path()).get_skill_doc("big").unwrap_err();
    assert!(matches!(err, SkillError::TooLarge(_)));
    assert_eq!(err.kind(), ErrorKind::Execution);
}

#[test]
fn non_utf8_doc_is_distinct_from_missing() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("bin")).unwrap();
    std::fs::write(dir.path().join("bin/SKILL.MD"), [0xff, 0xfe, 0x00]).unwrap();
    let err = registry(dir.path()).get_skill_doc("bin").unwrap_err();
    assert!(matches!(err, SkillError::NotUtf8(_)));
}

#[test]
fn bad_names_fail_before_touching_the_disk() {
    let dir = fixture();
    let reg = registry(dir.path());
    for bad in ["../calculator", "a/b", "a\\b", ".."] {
        assert!(matches!(reg.get_skill_doc(bad), Err(SkillError::InvalidName(_))));
        assert!(matches!(reg.read_file(bad, "SKILL.MD"), Err(SkillError::InvalidName(_))));
        assert!(matches!(reg.write_file(bad, "x.txt", "x"), Err(SkillError::InvalidName(_))));
    }
}

#[test]
fn unknown_skill_is_not_found() {
    let dir = fixture();
    let err = registry(dir.path()).get_skill_doc("missing").unwrap_err();
    assert_eq!(err.to_string(), "Skill 'missing' not found in skills folder");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// read_file / write_file
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn read_file_inside_skill() {
    let dir = fixture();
    let file = registry(dir.path())
        .read_file("calculator", "scripts/add.py")
        .unwrap();
    assert_eq!(file.content, "print(1 + 1)\n");
    assert_eq!(file.size_bytes, 13);
}

#[test]
fn read_file_traversal_is_rejected() {
    let dir = fixture();
    let err = registry(dir.path())
        .read_file("calculator", "../outside.txt")
        .unwrap_err();
    assert!(matches!(err, SkillError::Traversal));
}

#[test]
fn read_missing_file_names_skill_and_path() {
    let dir = fixture();
    let err = registry(dir.path())
        .read_file("calculator", "nope.txt")
        .unwrap_err();
    assert_eq!(err.to_string(), "File 'nope.txt' not found in skill 'calculator'");
}

#[test]
fn write_creates_intermediate_directories() {
    let dir = fixture();
    let reg = registry(dir.path());
    let n = reg
        .write_file("calculator", "data/out/result.json", "{\"v\":2}")
        .unwrap();
    assert_eq!(n, 7);
    let written = std::fs::read_to_string(dir.path().join("calculator/data/out/result.json")).unwrap();
    assert_eq!(written, "{\"v\":2}");
    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("calculator/data/out"))
        .unwrap()
        .collect();
    assert_eq!(leftovers.len(), 1);
}

#[test]
fn write_outside_skill_leaves_filesystem_unchanged() {
    let dir = fixture();
    let err = registry(dir.path())
        .write_file("calculator", "../outside.txt", "pwned")
        .unwrap_err();
    assert!(matches!(err, SkillError::Traversal));
    assert_eq!(std::fs::read_to_string(dir.path().join("outside.txt")).unwrap(), "secret");
}

#[cfg(unix)]
#[test]
fn write_through_symlinked_directory_is_rejected() {
    let dir = fixture();
    let elsewhere = dir.path().join("elsewhere");
    std::fs::create_dir(&elsewhere).unwrap();
    std::fs::write(elsewhere.join("existing.txt"), "untouched").unwrap();
    std::os::unix::fs::symlink(&elsewhere, dir.path().join("calculator/shared")).unwrap();

    let reg = registry(dir.path());
    for target in ["shared/new.txt", "shared/existing.txt", "shared/deep/new.txt"] {
        let err = reg.write_file("calculator", target, "pwned").unwrap_err();
        assert!(matches!(err, SkillError::Traversal), "{target}: {err}");
    }

    assert_eq!(
        std::fs::read_to_string(elsewhere.join("existing.txt")).unwrap(),
        "untouched"
    );
    let entries: Vec<_> = std::fs::read_dir(&elsewhere).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn write_to_hidden_or_venv_is_forbidden() {
    let dir = fixture();
    let reg = registry(dir.path());
    for target in [".env", "venv/bin/python", "scripts/.hidden"] {
        let err = reg.write_file("calculator", target, "x").unwrap_err();
        assert!(matches!(err, SkillError::Forbidden(_)), "{target}: {err}");
    }
    assert!(!dir.path().join("calculator/.env").exists());
    assert!(!dir.path().join("calculator/venv").exists());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// run_python_script
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn script_without_venv_reports_missing_runtime() {
    let dir = fixture();
    let err = registry(dir.path())
        .run_python_script("calculator", "print(1)")
        .await
        .unwrap_err();
    assert!(matches!(err, SkillError::RuntimeMissing(_)));
    assert!(err.to_string().contains("does not have a venv"));
}

#[cfg(unix)]
fn fake_venv(skill_dir: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let bin = skill_dir.join("venv/bin");
    std::fs::create_dir_all(&bin).unwrap();
    // `python -c <script>` becomes `sh -c <script>`.
    let python = bin.join("python");
    std::fs::write(&python, "#!/bin/sh\nexec /bin/sh \"$@\"\n").unwrap();
    std::fs::set_permissions(&python, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn script_runs_in_skill_folder() {
    let dir = fixture();
    fake_venv(&dir.path().join("calculator"));
    let result = registry(dir.path())
        .run_python_script("calculator", "cat SKILL.MD")
        .await
        .unwrap();
    assert_eq!(result.stdout, "# Calculator");
    assert_eq!(result.returncode, 0);
    assert!(!result.timed_out);
}

#[cfg(unix)]
#[tokio::test]
async fn script_timeout_is_reported() {
    let dir = fixture();
    fake_venv(&dir.path().join("calculator"));
    let reg = SkillsRegistry::new(
        dir.path(),
        Arc::new(VenvSandbox::new("python3", Duration::from_secs(30))),
        Duration::from_millis(200),
    );
    let result = reg
        .run_python_script("calculator", "exec sleep 5")
        .await
        .unwrap();
    assert!(result.timed_out);
    assert_eq!(result.returncode, -1);
    assert!(!result.error.unwrap_or_default().is_empty());
}
