//! Replay scripts
//!
//! A replay script drives the monitor one line at a time:
//!
//! ```text
//! # comment
//! rx eurodomest 101100111010
//! wait 100
//! tx remote 101100111010
//! debounce remote 250 all
//! ```
//!
//! - `rx <signature> <bits>` delivers a received frame on a channel
//! - `tx <subscriber> <bits>` transmits through a subscriber
//! - `wait <ms>` sleeps
//! - `debounce <subscriber> <ms> [all]` arms a manual debounce, for every
//!   subscriber of the signature with `all`

use std::str::FromStr;
use std::time::Duration;

use rf_protocol::{BitFrame, ParseError};
use rf_signal::DebounceScope;
use thiserror::Error;

/// One script instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Wait(Duration),
    Receive {
        signature: String,
        frame: BitFrame,
    },
    Transmit {
        subscriber: String,
        frame: BitFrame,
    },
    Debounce {
        subscriber: String,
        duration: Duration,
        scope: DebounceScope,
    },
}

/// Script parse errors
#[derive(Debug, Error, PartialEq)]
pub enum ScriptError {
    #[error("line {line}: unknown command '{command}'")]
    UnknownCommand { line: usize, command: String },

    #[error("line {line}: expected {expected}")]
    Usage { line: usize, expected: &'static str },

    #[error("line {line}: invalid duration '{value}'")]
    InvalidDuration { line: usize, value: String },

    #[error("line {line}: {source}")]
    InvalidFrame { line: usize, source: ParseError },
}

/// Parsed replay script
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

impl FromStr for Script {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut steps = Vec::new();
        for (index, raw) in s.lines().enumerate() {
            let content = raw.split('#').next().unwrap_or_default().trim();
            if content.is_empty() {
                continue;
            }
            steps.push(parse_step(index + 1, content)?);
        }
        Ok(Self { steps })
    }
}

fn parse_step(line: usize, content: &str) -> Result<Step, ScriptError> {
    let words: Vec<&str> = content.split_whitespace().collect();
    let frame = |bits: &str| {
        bits.parse::<BitFrame>()
            .map_err(|source| ScriptError::InvalidFrame { line, source })
    };
    let duration = |value: &str| {
        value
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ScriptError::InvalidDuration {
                line,
                value: value.to_string(),
            })
    };

    match words.as_slice() {
        ["wait", ms] => Ok(Step::Wait(duration(*ms)?)),
        ["wait", ..] => Err(ScriptError::Usage {
            line,
            expected: "wait <ms>",
        }),
        ["rx", signature, bits] => Ok(Step::Receive {
            signature: signature.to_string(),
            frame: frame(*bits)?,
        }),
        ["rx", ..] => Err(ScriptError::Usage {
            line,
            expected: "rx <signature> <bits>",
        }),
        ["tx", subscriber, bits] => Ok(Step::Transmit {
            subscriber: subscriber.to_string(),
            frame: frame(*bits)?,
        }),
        ["tx", ..] => Err(ScriptError::Usage {
            line,
            expected: "tx <subscriber> <bits>",
        }),
        ["debounce", subscriber, ms] => Ok(Step::Debounce {
            subscriber: subscriber.to_string(),
            duration: duration(*ms)?,
            scope: DebounceScope::Instance,
        }),
        ["debounce", subscriber, ms, "all"] => Ok(Step::Debounce {
            subscriber: subscriber.to_string(),
            duration: duration(*ms)?,
            scope: DebounceScope::AllSubscribers,
        }),
        ["debounce", ..] => Err(ScriptError::Usage {
            line,
            expected: "debounce <subscriber> <ms> [all]",
        }),
        _ => Err(ScriptError::UnknownCommand {
            line,
            command: words.first().copied().unwrap_or_default().to_string(),
        }),
    }
}
