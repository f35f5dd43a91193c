use std::collections::VecDeque;

use anyhow::{Result, anyhow};
use inquire::{Confirm, Text};

/// Blocking terminal prompts used before the run starts. Nothing may prompt
/// once the operator listener owns stdin.
pub trait PromptDriver {
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool>;
    fn input(&mut self, message: &str) -> Result<String>;
}

#[derive(Debug, Default)]
pub struct InquirePromptDriver;

impl InquirePromptDriver {
    pub fn new() -> Self {
        Self
    }
}

impl PromptDriver for InquirePromptDriver {
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool> {
        Ok(Confirm::new(message).with_default(default).prompt()?)
    }

    fn input(&mut self, message: &str) -> Result<String> {
        Ok(Text::new(message).prompt()?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedPromptResponse {
    Confirm(bool),
    Input(String),
}

#[derive(Debug, Default)]
pub struct ScriptedPromptDriver {
    responses: VecDeque<ScriptedPromptResponse>,
    messages: Vec<String>,
}

impl ScriptedPromptDriver {
    pub fn new(responses: Vec<ScriptedPromptResponse>) -> Self {
        Self {
            responses: responses.into(),
            messages: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn is_exhausted(&self) -> bool {
        self.responses.is_empty()
    }

    fn next_response(&mut self, message: &str) -> Result<ScriptedPromptResponse> {
        self.messages.push(message.to_string());
        self.responses
            .pop_front()
            .ok_or_else(|| anyhow!("prompt response queue is empty"))
    }
}

impl PromptDriver for ScriptedPromptDriver {
    fn confirm(&mut self, message: &str, _default: bool) -> Result<bool> {
        match self.next_response(message)? {
            ScriptedPromptResponse::Confirm(value) => Ok(value),
            unexpected => Err(anyhow!("expected confirm response, got {unexpected:?}")),
        }
    }

    fn input(&mut self, message: &str) -> Result<String> {
        match self.next_response(message)? {
            ScriptedPromptResponse::Input(value) => Ok(value),
            unexpected => Err(anyhow!("expected input response, got {unexpected:?}")),
        }
    }
}
