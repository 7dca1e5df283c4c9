//! In-memory fakes for the command runner (testing only)
//!
//! `RecordingRunner` records every invocation instead of spawning it and can
//! simulate toolchain outputs or failures.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{BuildError, Result};
use crate::runner::{CommandRunner, Invocation};

type Effect = Box<dyn Fn(&Invocation) -> std::io::Result<()> + Send + Sync>;

/// Command runner that records invocations.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Invocation>>,
    fail_program: Option<String>,
    effect: Option<Effect>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every invocation of `program` exits with status 1.
    pub fn failing_on(mut self, program: impl Into<String>) -> Self {
        self.fail_program = Some(program.into());
        self
    }

    /// Run `effect` for each successful invocation, e.g. to write the files
    /// a real toolchain would produce.
    pub fn with_effect<F>(mut self, effect: F) -> Self
    where
        F: Fn(&Invocation) -> std::io::Result<()> + Send + Sync + 'static,
    {
        self.effect = Some(Box::new(effect));
        self
    }

    /// Invocations seen so far, in order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// `program arg...` for each invocation, in order.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, invocation: &Invocation) -> Result<()> {
        self.calls.lock().unwrap().push(invocation.clone());

        if self.fail_program.as_deref() == Some(invocation.program.as_str()) {
            return Err(BuildError::CommandFailed {
                command: invocation.to_string(),
                code: Some(1),
            });
        }

        if let Some(effect) = &self.effect {
            effect(invocation).map_err(|source| BuildError::Spawn {
                command: invocation.to_string(),
                source,
            })?;
        }
        Ok(())
    }
}
