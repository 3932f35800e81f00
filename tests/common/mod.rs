//! Shared test support: a scripted process runner double and engine
//! context helpers over a temp data root.

// Each test binary uses a subset of these helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use shannon_core::command::CommandInvocation;
use shannon_core::config::CoreConfig;
use shannon_core::error::{CoreError, Result};
use shannon_core::orchestration::EngineContext;
use shannon_core::process::{ProcessOutput, ProcessRunner};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

/// One canned reply for a matched invocation
#[derive(Debug, Clone)]
pub enum Reply {
    /// Zero exit with the given stdout
    Stdout(String),
    /// Non-zero exit carrying stderr for classification
    NonZero { exit_code: i32, stderr: String },
    /// Binary missing / not executable
    SpawnFailed(String),
    /// Zero exit; also writes `content` to the path following
    /// `--output-file` in the argument vector, mimicking the real binary's
    /// result file emission
    StdoutAndOutputFile { stdout: String, content: String },
}

struct Rule {
    matcher: String,
    replies: VecDeque<Reply>,
}

/// Scripted [`ProcessRunner`] double.
///
/// Rules match on a substring of the joined argument vector, first match
/// wins, and each match consumes the next reply in that rule's queue (the
/// last reply is sticky). Unmatched invocations succeed with empty output
/// so incidental probes do not need scripting. Every invocation is
/// recorded for assertions.
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    rules: Arc<Mutex<Vec<Rule>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, matcher: impl Into<String>, replies: Vec<Reply>) -> &Self {
        self.rules.lock().push(Rule {
            matcher: matcher.into(),
            replies: replies.into(),
        });
        self
    }

    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.lock().clone()
    }

    /// Joined argv of every recorded invocation, for absence assertions
    pub fn all_recorded_args(&self) -> String {
        self.invocations()
            .iter()
            .map(|i| i.args.join(" "))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn invocations_matching(&self, needle: &str) -> Vec<CommandInvocation> {
        self.invocations()
            .into_iter()
            .filter(|i| i.args.join(" ").contains(needle))
            .collect()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, invocation: &CommandInvocation) -> Result<ProcessOutput> {
        self.invocations.lock().push(invocation.clone());
        let joined = invocation.args.join(" ");

        let reply = {
            let mut rules = self.rules.lock();
            match rules.iter_mut().find(|r| joined.contains(&r.matcher)) {
                Some(rule) => {
                    if rule.replies.len() > 1 {
                        rule.replies.pop_front().unwrap()
                    } else {
                        rule.replies
                            .front()
                            .cloned()
                            .unwrap_or(Reply::Stdout(String::new()))
                    }
                }
                None => Reply::Stdout(String::new()),
            }
        };

        match reply {
            Reply::Stdout(stdout) => Ok(ProcessOutput {
                exit_code: 0,
                stdout,
                stderr: String::new(),
            }),
            Reply::NonZero { exit_code, stderr } => Err(CoreError::NonZeroExit {
                exit_code,
                stdout: String::new(),
                stderr,
            }),
            Reply::SpawnFailed(message) => Err(CoreError::SpawnFailed {
                program: invocation.program.display().to_string(),
                message,
            }),
            Reply::StdoutAndOutputFile { stdout, content } => {
                let output_path = invocation
                    .args
                    .iter()
                    .position(|a| a == "--output-file")
                    .and_then(|i| invocation.args.get(i + 1))
                    .expect("invocation carries --output-file");
                if let Some(parent) = Path::new(output_path).parent() {
                    std::fs::create_dir_all(parent).unwrap();
                }
                std::fs::write(output_path, content).unwrap();
                Ok(ProcessOutput {
                    exit_code: 0,
                    stdout,
                    stderr: String::new(),
                })
            }
        }
    }
}

/// Config over a temp data root with delays shrunk to zero so tests run
/// without wall-clock waits.
pub fn test_config(data_root: &Path) -> CoreConfig {
    let mut config = CoreConfig::default();
    config.storage.data_root = data_root.to_path_buf();
    config.keyring.home = data_root.join("keyring");
    config.delays.inter_tx_seconds = 0;
    config.delays.retry_backoff_base_seconds = 0;
    config
}

pub fn test_context(config: CoreConfig, runner: ScriptedRunner) -> EngineContext {
    EngineContext::new(Arc::new(config), Arc::new(runner)).expect("engine context")
}

/// JSON key output the binary prints for show/add operations
pub fn key_json(name: &str, address: &str) -> String {
    format!(r#"{{"name":"{name}","type":"local","address":"{address}"}}"#)
}

/// JSON key output including the creation-time mnemonic
pub fn key_json_with_mnemonic(name: &str, address: &str, mnemonic: &str) -> String {
    format!(
        r#"{{"name":"{name}","type":"local","address":"{address}","mnemonic":"{mnemonic}"}}"#
    )
}

/// Broadcast response with a zero code
pub fn tx_ok(txhash: &str) -> String {
    format!(r#"{{"txhash":"{txhash}","code":0,"raw_log":""}}"#)
}
