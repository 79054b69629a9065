//! Shared test doubles for integration tests

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use kindling::cluster::ClusterProvider;
use kindling::error::PipelineError;
use kindling::exec::{CommandError, CommandExecutor, CommandOutput, CommandSpec};

/// Executor answering from a scripted table keyed by the rendered command line
pub struct ScriptedExecutor {
    responses: HashMap<String, CommandOutput>,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedExecutor {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, line: &str, status_code: i32, stdout: &str) -> Self {
        self.responses.insert(
            line.to_string(),
            CommandOutput {
                status_code,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(&self, spec: CommandSpec) -> Result<CommandOutput, CommandError> {
        let line = spec.display_line();
        self.calls.lock().unwrap().push(line.clone());
        self.responses
            .get(&line)
            .cloned()
            .ok_or(CommandError::CommandNotFound {
                command: spec.program,
            })
    }
}

/// Cluster provider recording lifecycle calls instead of shelling out
pub struct RecordingProvider {
    pub created: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_delete: bool,
}

#[allow(dead_code)]
impl RecordingProvider {
    pub fn new() -> Self {
        Self {
            created: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            fail_delete: false,
        }
    }

    pub fn failing_delete() -> Self {
        Self {
            fail_delete: true,
            ..Self::new()
        }
    }

    pub fn delete_count(&self) -> usize {
        self.deleted.lock().unwrap().len()
    }
}

#[async_trait]
impl ClusterProvider for RecordingProvider {
    async fn create(&self, name: &str) -> Result<(), PipelineError> {
        self.created.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), PipelineError> {
        self.deleted.lock().unwrap().push(name.to_string());
        if self.fail_delete {
            Err(PipelineError::teardown("forced delete failure"))
        } else {
            Ok(())
        }
    }

    async fn exists(&self, name: &str) -> Result<bool, PipelineError> {
        let created = self
            .created
            .lock()
            .unwrap()
            .iter()
            .filter(|n| *n == name)
            .count();
        let deleted = self
            .deleted
            .lock()
            .unwrap()
            .iter()
            .filter(|n| *n == name)
            .count();
        Ok(created > deleted)
    }
}
