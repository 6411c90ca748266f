//! Tool-calling agent loop.
//!
//! Each turn sends the system prompt, the prior transcript and the new user
//! input to the chat model together with the registered tool definitions.
//! While the model answers with tool calls, each call is executed in order
//! and its output fed back as a `tool` message. The first reply without tool
//! calls is the answer. After `max_iterations` rounds of tool calls the turn
//! ends with a fixed notice instead.
//!
//! Tool failures and malformed tool arguments abort the turn with an error.

use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::llm::{AgentMessage, ChatModel, CompletionRequest};
use crate::models::{ChatMessage, Role};
use crate::prompts;
use crate::tools::ToolRegistry;

pub struct AgentExecutor {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    system_prompt: String,
    model_name: String,
    temperature: f32,
    max_iterations: usize,
}

impl AgentExecutor {
    pub fn new(model: Arc<dyn ChatModel>, tools: ToolRegistry, config: &Config) -> Self {
        Self {
            model,
            tools,
            system_prompt: prompts::AGENT_SYSTEM_PROMPT.to_string(),
            model_name: config.llm.chat_model.clone(),
            temperature: config.llm.temperature,
            max_iterations: config.agent.max_iterations,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Answer `input` given the conversation so far.
    pub async fn run(&self, history: &[ChatMessage], input: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(AgentMessage::System(self.system_prompt.clone()));
        messages.extend(history.iter().map(|m| match m.role {
            Role::User => AgentMessage::User(m.content.clone()),
            Role::Assistant => AgentMessage::assistant_text(m.content.clone()),
        }));
        messages.push(AgentMessage::User(input.to_string()));

        let specs = self.tools.specs();

        for iteration in 0..self.max_iterations {
            let request = CompletionRequest::new(self.model_name.clone(), messages.clone())
                .temperature(self.temperature)
                .tools(specs.clone());
            let completion = self.model.complete(&request).await?;

            if completion.tool_calls.is_empty() {
                return Ok(completion.content.unwrap_or_default());
            }

            tracing::debug!(
                iteration,
                calls = completion.tool_calls.len(),
                "agent requested tools"
            );
            messages.push(AgentMessage::Assistant {
                content: completion.content.clone(),
                tool_calls: completion.tool_calls.clone(),
            });

            for call in &completion.tool_calls {
                let output = self.call_tool(&call.name, &call.arguments).await?;
                messages.push(AgentMessage::Tool {
                    tool_call_id: call.id.clone(),
                    content: output,
                });
            }
        }

        tracing::warn!(
            max_iterations = self.max_iterations,
            "agent stopped at iteration limit"
        );
        Ok(prompts::ITERATION_LIMIT_MESSAGE.to_string())
    }

    async fn call_tool(&self, name: &str, arguments: &str) -> Result<String> {
        let Some(tool) = self.tools.find(name) else {
            let available: Vec<&str> = self.tools.tools().iter().map(|t| t.name()).collect();
            return Ok(format!(
                "{} is not a valid tool, try one of [{}].",
                name,
                available.join(", ")
            ));
        };

        let params: Value = if arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(arguments)
                .with_context(|| format!("Invalid arguments for tool {}: {}", name, arguments))?
        };

        let output = tool
            .execute(params)
            .await
            .with_context(|| format!("Tool {} failed", name))?;

        Ok(match output {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }
}
