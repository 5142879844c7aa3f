//! Scripted [`AwsRunner`] for unit tests.

use super::{AwsRunner, CliOutput};
use crate::error::{AwsError, Result};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

/// One scripted reply
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Output(CliOutput),
    Timeout,
    /// Answer with the inner reply after the delay
    Slow(Duration, Box<Reply>),
}

pub(crate) fn ok(stdout: &str) -> Reply {
    Reply::Output(CliOutput {
        exit_code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    })
}

pub(crate) fn fail(stderr: &str) -> Reply {
    Reply::Output(CliOutput {
        exit_code: Some(255),
        stdout: String::new(),
        stderr: stderr.to_string(),
    })
}

pub(crate) fn slow(secs: u64, reply: Reply) -> Reply {
    Reply::Slow(Duration::from_secs(secs), Box::new(reply))
}

pub(crate) fn stack_status(status: &str) -> Reply {
    ok(&format!(
        r#"{{"Stacks":[{{"StackName":"s","StackStatus":"{status}","Outputs":[]}}]}}"#
    ))
}

pub(crate) fn stack_missing() -> Reply {
    fail("An error occurred (ValidationError) when calling the DescribeStacks operation: Stack with id s does not exist")
}

struct Rule {
    tokens: Vec<String>,
    replies: VecDeque<Reply>,
}

/// Matches calls by tokens that must all appear in the argument vector.
/// Rules are checked in insertion order; the last reply of a rule repeats.
#[derive(Default)]
pub(crate) struct FakeAws {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeAws {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on<I>(self, tokens: &[&str], replies: I) -> Self
    where
        I: IntoIterator<Item = Reply>,
    {
        self.rules.lock().unwrap().push(Rule {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            replies: replies.into_iter().collect(),
        });
        self
    }

    pub(crate) fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, tokens: &[&str]) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| tokens.iter().all(|t| call.iter().any(|a| a == t)))
            .count()
    }

    fn next_reply(&self, args: &[String]) -> Option<Reply> {
        let mut rules = self.rules.lock().unwrap();
        let rule = rules
            .iter_mut()
            .find(|r| r.tokens.iter().all(|t| args.iter().any(|a| a == t)))?;
        if rule.replies.len() > 1 {
            rule.replies.pop_front()
        } else {
            rule.replies.front().cloned()
        }
    }
}

impl AwsRunner for FakeAws {
    fn run(&self, args: &[String]) -> impl Future<Output = Result<CliOutput>> + Send {
        self.calls.lock().unwrap().push(args.to_vec());
        let reply = self.next_reply(args);
        let command = super::command_line(args);
        let (delay, reply) = match reply {
            Some(Reply::Slow(delay, inner)) => (Some(delay), Some(*inner)),
            other => (None, other),
        };

        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match reply {
                Some(Reply::Output(out)) => Ok(out),
                Some(Reply::Timeout) => Err(AwsError::TimedOut {
                    command,
                    seconds: 1,
                }
                .into()),
                Some(Reply::Slow(..)) => panic!("nested slow reply for {command}"),
                None => panic!("unscripted aws call: {command}"),
            }
        }
    }
}
