//! Device capacity checks
//!
//! The firmware silently truncates or refuses programs that exceed its
//! buffers. These checks run on a compiled program before it is sent so the
//! user sees a warning instead of a half-loaded run.

use super::model::{Element, Program};

/// Largest `p=` payload the firmware accepts, in bytes
pub const MAX_PROGRAM_CHARS: usize = 252;

/// Most top-level groups the firmware can hold
pub const MAX_TOP_LEVEL_GROUPS: usize = 16;

/// Most steps the firmware can hold, counted once per listing
pub const MAX_STEPS: usize = 30;

/// Safe block and lid temperature range in degrees Celsius
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<i32> = 0..=99;

/// A way in which a program exceeds what the device supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitViolation {
    ProgramTooLong { chars: usize, max: usize },
    TooManyGroups { groups: usize, max: usize },
    TooManySteps { steps: usize, max: usize },
    LidTemperature(i32),
    StepTemperature { description: String, temperature: i32 },
}

impl std::fmt::Display for LimitViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitViolation::ProgramTooLong { chars, max } => {
                write!(f, "program payload is {} characters; the device accepts {}", chars, max)
            }
            LimitViolation::TooManyGroups { groups, max } => {
                write!(f, "program has {} top-level groups; the device accepts {}", groups, max)
            }
            LimitViolation::TooManySteps { steps, max } => {
                write!(f, "program has {} steps; the device accepts {}", steps, max)
            }
            LimitViolation::LidTemperature(t) => {
                write!(f, "lid temperature {}C is outside 0-99C", t)
            }
            LimitViolation::StepTemperature {
                description,
                temperature,
            } => write!(
                f,
                "step `{}` at {}C is outside 0-99C",
                description, temperature
            ),
        }
    }
}

/// Capacity figures to check programs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramLimits {
    pub max_program_chars: usize,
    pub max_top_level_groups: usize,
    pub max_steps: usize,
}

impl Default for ProgramLimits {
    fn default() -> Self {
        Self {
            max_program_chars: MAX_PROGRAM_CHARS,
            max_top_level_groups: MAX_TOP_LEVEL_GROUPS,
            max_steps: MAX_STEPS,
        }
    }
}

impl ProgramLimits {
    /// Check a program and its compiled `p=` payload
    pub fn check(&self, program: &Program, groups: &str) -> Vec<LimitViolation> {
        let mut violations = Vec::new();

        if groups.len() > self.max_program_chars {
            violations.push(LimitViolation::ProgramTooLong {
                chars: groups.len(),
                max: self.max_program_chars,
            });
        }

        let group_count = program.elements().len();
        if group_count > self.max_top_level_groups {
            violations.push(LimitViolation::TooManyGroups {
                groups: group_count,
                max: self.max_top_level_groups,
            });
        }

        let steps: usize = program.elements().iter().map(Element::step_count).sum();
        if steps > self.max_steps {
            violations.push(LimitViolation::TooManySteps {
                steps,
                max: self.max_steps,
            });
        }

        if !TEMPERATURE_RANGE.contains(&program.lid_temperature) {
            violations.push(LimitViolation::LidTemperature(program.lid_temperature));
        }

        for step in program.steps() {
            if !TEMPERATURE_RANGE.contains(&step.temperature) {
                violations.push(LimitViolation::StepTemperature {
                    description: step.description.clone(),
                    temperature: step.temperature,
                });
            }
        }

        violations
    }
}
