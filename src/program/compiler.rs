//! Wire compiler
//!
//! Serializes a [`Program`] into the device's flat command string:
//!
//! ```text
//! s=ACGTC&l=<lid>&c=start&n=<title>&p=<groups>
//! ```
//!
//! `<groups>` holds one parenthesized group per top-level element. A lone
//! step becomes `([secs|temp|desc])`; a repeat group becomes
//! `(N[secs|temp|desc][secs|temp|desc]...)` with every step listed once. The
//! firmware expands the repeat, never the compiler.

use super::model::{Block, Element, Program, Step};
use crate::error::FormatError;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Signature every command starts with
pub const COMMAND_SIGNATURE: &str = "s=ACGTC";

/// Fixed command that halts the running program
pub const STOP_COMMAND: &str = "s=ACGTC&c=stop";

/// Characters that carry framing meaning inside the command string
pub const RESERVED_CHARS: &[char] = &['|', '[', ']', '(', ')', '&'];

/// What to do with a step description containing [`RESERVED_CHARS`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionPolicy {
    /// Fail compilation with a [`FormatError`]
    #[default]
    Reject,
    /// Copy the description verbatim; the firmware may misparse it
    PassThrough,
}

impl std::fmt::Display for DescriptionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescriptionPolicy::Reject => write!(f, "reject"),
            DescriptionPolicy::PassThrough => write!(f, "pass_through"),
        }
    }
}

/// Compiles programs into wire command strings.
///
/// Holds only its policy, so compiling is a pure function of the program.
#[derive(Debug, Clone, Copy, Default)]
pub struct WireCompiler {
    policy: DescriptionPolicy,
}

impl WireCompiler {
    /// Create a compiler with the given description policy
    pub fn new(policy: DescriptionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DescriptionPolicy {
        self.policy
    }

    /// Compile a program into the full command string
    pub fn compile(&self, program: &Program) -> Result<String, FormatError> {
        if self.policy == DescriptionPolicy::Reject && program.title.contains(&['&', '='][..]) {
            return Err(FormatError::new(format!(
                "title `{}` contains `&` or `=`, which would break the command framing",
                program.title
            )));
        }

        let groups = self.compile_groups(program)?;
        Ok(format!(
            "{}&l={}&c=start&n={}&p={}",
            COMMAND_SIGNATURE, program.lid_temperature, program.title, groups
        ))
    }

    /// Compile only the `p=` payload
    pub fn compile_groups(&self, program: &Program) -> Result<String, FormatError> {
        let mut out = String::new();
        for element in program.elements() {
            match element {
                Element::Step(step) => {
                    out.push('(');
                    self.write_step(&mut out, step)?;
                    out.push(')');
                }
                Element::Block(block) => self.write_group(&mut out, block)?,
            }
        }
        Ok(out)
    }

    fn write_group(&self, out: &mut String, block: &Block) -> Result<(), FormatError> {
        if block.is_empty() {
            return Err(FormatError::new("a top-level group has no steps"));
        }
        out.push('(');
        if let Some(count) = block.repeat_count {
            if count == 0 {
                return Err(FormatError::new("repeat count must be at least 1"));
            }
            let _ = write!(out, "{}", count);
        }
        for child in &block.children {
            match child {
                Element::Step(step) => self.write_step(out, step)?,
                Element::Block(_) => {
                    return Err(FormatError::new(
                        "nested repeat groups are not supported by the device command format",
                    ))
                }
            }
        }
        out.push(')');
        Ok(())
    }

    fn write_step(&self, out: &mut String, step: &Step) -> Result<(), FormatError> {
        if step.duration_secs == 0 {
            return Err(FormatError::new(format!(
                "step `{}` has a zero duration",
                step.description
            )));
        }
        if self.policy == DescriptionPolicy::Reject && step.description.contains(RESERVED_CHARS) {
            return Err(FormatError::new(format!(
                "step description `{}` contains one of `| [ ] ( ) &`",
                step.description
            )));
        }
        let _ = write!(
            out,
            "[{}|{}|{}]",
            step.duration_secs, step.temperature, step.description
        );
        Ok(())
    }
}

/// Compile with the default [`DescriptionPolicy::Reject`]
pub fn compile(program: &Program) -> Result<String, FormatError> {
    WireCompiler::default().compile(program)
}
