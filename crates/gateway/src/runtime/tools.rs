//! Tool catalog exposed to the model, and the dispatcher that turns a
//! requested tool call into a skill operation.
//!
//! Every dispatch returns a flat JSON object. Failures are rendered into
//! `{"error": ..}` (or `{"success": false, ..}`) payloads and handed back to
//! the model rather than failing the turn.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};

use sr_domain::tool::ToolDefinition;
use sr_skills::{CreationOutcome, PendingCreationStore, SkillError, SkillsRegistry};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool definitions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build the set of tool definitions exposed to the LLM.
pub fn build_tool_definitions() -> Vec<ToolDefinition> {
    let mut defs = Vec::new();

    // ── Discovery ─────────────────────────────────────────────────
    defs.push(ToolDefinition {
        name: "list_skills".into(),
        description: "List all available skills in the skills folder. Returns skill names.".into(),
        parameters: json!({
            "type": "object",
            "properties": {},
            "required": []
        }),
    });

    defs.push(ToolDefinition {
        name: "get_skill".into(),
        description: "Read the SKILL.MD documentation for a specific skill. \
                      SKILL.MD serves as the table of contents."
            .into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "skill_name": { "type": "string", "description": "Name of the skill (folder name)" }
            },
            "required": ["skill_name"]
        }),
    });

    // ── Files ─────────────────────────────────────────────────────
    defs.push(ToolDefinition {
        name: "read_file_in_skill".into(),
        description: "Read any file within a skill's folder. \
                      Use this when SKILL.MD references additional files."
            .into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "skill_name": { "type": "string", "description": "Name of the skill" },
                "file_path": {
                    "type": "string",
                    "description": "Relative path within skill (e.g., 'examples/usage.py')"
                }
            },
            "required": ["skill_name", "file_path"]
        }),
    });

    defs.push(ToolDefinition {
        name: "write_file_in_skill".into(),
        description: "Write a text file inside a skill's folder, creating intermediate \
                      directories. Hidden files and the skill's venv cannot be written."
            .into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "skill_name": { "type": "string", "description": "Name of the skill" },
                "file_path": { "type": "string", "description": "Relative path within skill" },
                "content": { "type": "string", "description": "Text content to write" }
            },
            "required": ["skill_name", "file_path", "content"]
        }),
    });

    // ── Execution ─────────────────────────────────────────────────
    defs.push(ToolDefinition {
        name: "run_python_script".into(),
        description: "Execute a Python script in the specified skill's venv and return stdout/stderr."
            .into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "skill_name": { "type": "string", "description": "Name of the skill whose venv to use" },
                "script": { "type": "string", "description": "Python code to execute" }
            },
            "required": ["skill_name", "script"]
        }),
    });

    defs.push(ToolDefinition {
        name: "create_skill".into(),
        description: "Propose creating a new skill. This will NOT immediately create the skill. \
                      It returns a preview of actions that require user confirmation before \
                      execution. Use this when the user asks you to create a new skill."
            .into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "skill_name": {
                    "type": "string",
                    "description": "Name for the new skill (lowercase_with_underscores, used as folder name)"
                },
                "skill_md_content": {
                    "type": "string",
                    "description": "Full content for the SKILL.md documentation file"
                },
                "requirements": {
                    "type": "string",
                    "description": "Contents for requirements.txt (one package per line). Leave empty if no dependencies needed."
                }
            },
            "required": ["skill_name", "skill_md_content"]
        }),
    });

    defs
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Parsed tool calls
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A tool call the dispatcher knows how to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillTool {
    ListSkills,
    GetSkill {
        skill_name: String,
    },
    ReadFile {
        skill_name: String,
        file_path: String,
    },
    WriteFile {
        skill_name: String,
        file_path: String,
        content: String,
    },
    RunScript {
        skill_name: String,
        script: String,
    },
    CreateSkill {
        skill_name: String,
        documentation: String,
        requirements: Option<String>,
    },
}

impl SkillTool {
    /// Decode a model-requested call.
    ///
    /// Arguments are parsed before the name is looked at, so a malformed
    /// payload is reported as such even for an unknown tool. The `Err`
    /// side is the error payload to hand back to the model.
    pub fn parse(name: &str, arguments: &str) -> Result<Self, Value> {
        let params = parse_arguments(arguments)?;
        let arg = |key: &str| -> String {
            params
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned()
        };

        let tool = match name {
            "list_skills" => Self::ListSkills,
            "get_skill" => Self::GetSkill {
                skill_name: arg("skill_name"),
            },
            "read_file_in_skill" => Self::ReadFile {
                skill_name: arg("skill_name"),
                file_path: arg("file_path"),
            },
            "write_file_in_skill" => Self::WriteFile {
                skill_name: arg("skill_name"),
                file_path: arg("file_path"),
                content: arg("content"),
            },
            "run_python_script" => Self::RunScript {
                skill_name: arg("skill_name"),
                script: arg("script"),
            },
            "create_skill" => Self::CreateSkill {
                skill_name: arg("skill_name"),
                documentation: arg("skill_md_content"),
                requirements: params
                    .get("requirements")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
            },
            other => return Err(error_payload(format!("Unknown tool: {other}"))),
        };
        Ok(tool)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ListSkills => "list_skills",
            Self::GetSkill { .. } => "get_skill",
            Self::ReadFile { .. } => "read_file_in_skill",
            Self::WriteFile { .. } => "write_file_in_skill",
            Self::RunScript { .. } => "run_python_script",
            Self::CreateSkill { .. } => "create_skill",
        }
    }
}

/// Blank arguments count as `{}`; anything else must be a JSON object.
fn parse_arguments(arguments: &str) -> Result<Map<String, Value>, Value> {
    if arguments.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(arguments) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(error_payload(
            "Invalid tool arguments: expected a JSON object",
        )),
        Err(e) => Err(error_payload(format!("Invalid tool arguments: {e}"))),
    }
}

fn error_payload(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

fn skill_error_payload(e: &SkillError) -> Value {
    json!({ "error": e.to_string(), "error_kind": e.kind() })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatcher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Routes tool calls to the skills registry and the pending-creation store.
pub struct ToolDispatcher {
    registry: Arc<SkillsRegistry>,
    creations: Arc<PendingCreationStore>,
    install_timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(
        registry: Arc<SkillsRegistry>,
        creations: Arc<PendingCreationStore>,
        install_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            creations,
            install_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<SkillsRegistry> {
        &self.registry
    }

    pub fn creations(&self) -> &Arc<PendingCreationStore> {
        &self.creations
    }

    /// Parse and execute one tool call.
    pub async fn dispatch(&self, name: &str, arguments: &str) -> Value {
        match SkillTool::parse(name, arguments) {
            Ok(tool) => self.execute(tool).await,
            Err(payload) => {
                tracing::warn!(tool_name = %name, "rejected tool call");
                payload
            }
        }
    }

    pub async fn execute(&self, tool: SkillTool) -> Value {
        let registry = &self.registry;
        match tool {
            SkillTool::ListSkills => match registry.list_skills() {
                Ok(skills) => json!({ "skills": skills }),
                Err(e) => skill_error_payload(&e),
            },

            SkillTool::GetSkill { skill_name } => match registry.get_skill_doc(&skill_name) {
                Ok(documentation) => json!({
                    "skill_name": skill_name,
                    "documentation": documentation,
                }),
                Err(e) => skill_error_payload(&e),
            },

            SkillTool::ReadFile {
                skill_name,
                file_path,
            } => match registry.read_file(&skill_name, &file_path) {
                Ok(file) => json!({
                    "success": true,
                    "skill_name": skill_name,
                    "file_path": file_path,
                    "content": file.content,
                    "size_bytes": file.size_bytes,
                    "encoding": "utf-8",
                }),
                Err(e) => json!({
                    "success": false,
                    "skill_name": skill_name,
                    "file_path": file_path,
                    "error": e.to_string(),
                    "error_kind": e.kind(),
                }),
            },

            SkillTool::WriteFile {
                skill_name,
                file_path,
                content,
            } => match registry.write_file(&skill_name, &file_path, &content) {
                Ok(bytes_written) => json!({
                    "success": true,
                    "skill_name": skill_name,
                    "file_path": file_path,
                    "bytes_written": bytes_written,
                }),
                Err(e) => json!({
                    "success": false,
                    "skill_name": skill_name,
                    "file_path": file_path,
                    "error": e.to_string(),
                    "error_kind": e.kind(),
                }),
            },

            SkillTool::RunScript { skill_name, script } => {
                match registry.run_python_script(&skill_name, &script).await {
                    Ok(result) => {
                        if result.timed_out {
                            tracing::warn!(skill = %skill_name, "script timed out");
                        }
                        let mut payload = json!({
                            "skill_name": skill_name,
                            "stdout": result.stdout,
                            "stderr": result.stderr,
                            "returncode": result.returncode,
                            "timed_out": result.timed_out,
                        });
                        if let Some(kind) = result.error_kind() {
                            payload["error_kind"] = json!(kind);
                        }
                        if let Some(error) = result.error {
                            payload["error"] = Value::String(error);
                        }
                        payload
                    }
                    Err(e) => skill_error_payload(&e),
                }
            }

            SkillTool::CreateSkill {
                skill_name,
                documentation,
                requirements,
            } => match self.creations.propose(
                &skill_name,
                &documentation,
                requirements.as_deref(),
                registry.root(),
            ) {
                Ok(proposal) => proposal.to_payload(),
                Err(e) => skill_error_payload(&e),
            },
        }
    }

    /// Execute a pending creation. Only reachable from a user-facing
    /// surface, never from a tool call.
    pub async fn confirm_creation(&self, token: &str) -> CreationOutcome {
        let outcome = self
            .creations
            .confirm(token, self.registry.sandbox().as_ref(), self.install_timeout)
            .await;
        match outcome.error_kind() {
            None => tracing::info!(skill = %outcome.skill_name, "skill created"),
            Some(kind) => tracing::warn!(
                skill = %outcome.skill_name,
                error_kind = ?kind,
                error = ?outcome.error,
                "skill creation failed"
            ),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_every_tool_once() {
        let defs = build_tool_definitions();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "list_skills",
                "get_skill",
                "read_file_in_skill",
                "write_file_in_skill",
                "run_python_script",
                "create_skill",
            ]
        );
        for def in &defs {
            assert_eq!(def.parameters["type"], "object");
        }
    }

    #[test]
    fn create_skill_mentions_confirmation() {
        let defs = build_tool_definitions();
        let create = defs.iter().find(|d| d.name == "create_skill").unwrap();
        assert!(create.description.contains("confirmation"));
        assert_eq!(
            create.parameters["required"],
            json!(["skill_name", "skill_md_content"])
        );
    }

    #[test]
    fn parse_known_tools() {
        assert_eq!(SkillTool::parse("list_skills", "{}").unwrap(), SkillTool::ListSkills);
        assert_eq!(
            SkillTool::parse("get_skill", r#"{"skill_name":"calc"}"#).unwrap(),
            SkillTool::GetSkill {
                skill_name: "calc".into()
            }
        );
        let tool = SkillTool::parse(
            "create_skill",
            r##"{"skill_name":"x","skill_md_content":"# X","requirements":"requests"}"##,
        )
        .unwrap();
        assert_eq!(tool.name(), "create_skill");
        assert_eq!(
            tool,
            SkillTool::CreateSkill {
                skill_name: "x".into(),
                documentation: "# X".into(),
                requirements: Some("requests".into()),
            }
        );
    }

    #[test]
    fn missing_arguments_default_to_empty() {
        assert_eq!(
            SkillTool::parse("read_file_in_skill", "{}").unwrap(),
            SkillTool::ReadFile {
                skill_name: String::new(),
                file_path: String::new(),
            }
        );
        assert_eq!(SkillTool::parse("list_skills", "").unwrap(), SkillTool::ListSkills);
    }

    #[test]
    fn malformed_arguments_are_reported_before_unknown_names() {
        let err = SkillTool::parse("no_such_tool", "{not json").unwrap_err();
        let msg = err["error"].as_str().unwrap();
        assert!(msg.starts_with("Invalid tool arguments: "), "{msg}");

        let err = SkillTool::parse("get_skill", "[1, 2]").unwrap_err();
        assert!(err["error"].as_str().unwrap().starts_with("Invalid tool arguments"));
    }

    #[test]
    fn unknown_tool_is_reported_by_name() {
        let err = SkillTool::parse("delete_everything", "{}").unwrap_err();
        assert_eq!(err, json!({ "error": "Unknown tool: delete_everything" }));
    }
}
