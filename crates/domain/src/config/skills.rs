use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Skills
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillsConfig {
    /// Root folder holding one sub-folder per skill.
    #[serde(default = "d_skills_path")]
    pub path: PathBuf,
    /// Wall-clock limit for a single `run_python_script` call.
    #[serde(default = "d_30")]
    pub script_timeout_secs: u64,
    /// Base interpreter used to provision a skill's virtual environment.
    #[serde(default = "d_python")]
    pub python: String,
    /// Limit for `pip install -r requirements.txt` during skill creation.
    #[serde(default = "d_120")]
    pub install_timeout_secs: u64,
    /// Lifetime of an unconfirmed creation proposal. `0` disables expiry.
    #[serde(default = "d_3600")]
    pub proposal_ttl_secs: u64,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            path: d_skills_path(),
            script_timeout_secs: d_30(),
            python: d_python(),
            install_timeout_secs: d_120(),
            proposal_ttl_secs: d_3600(),
        }
    }
}

fn d_skills_path() -> PathBuf {
    PathBuf::from("./skills")
}
fn d_30() -> u64 {
    30
}
fn d_python() -> String {
    "python3".into()
}
fn d_120() -> u64 {
    120
}
fn d_3600() -> u64 {
    3600
}
