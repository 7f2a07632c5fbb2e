//! Cycling programs: model, text parser and wire compiler
//!
//! Data flows text → [`parse_program`] → [`Program`] → [`WireCompiler`] →
//! command string. [`ProgramLimits`] checks a compiled program against the
//! device's capacity before it is sent.
//!
//! # Example
//!
//! ```
//! use pcrlink::program::{parse_program, WireCompiler};
//!
//! let text = "Title: Quick\nLid: 95\n\nx2\n  10s @ 95C Melt\n  10s @ 60C Anneal\n";
//! let program = parse_program(text).unwrap();
//! let command = WireCompiler::default().compile(&program).unwrap();
//! assert_eq!(command, "s=ACGTC&l=95&c=start&n=Quick&p=(2[10|95|Melt][10|60|Anneal])");
//! ```

pub mod compiler;
pub mod limits;
pub mod model;
pub mod parser;

pub use compiler::{
    compile, DescriptionPolicy, WireCompiler, COMMAND_SIGNATURE, RESERVED_CHARS, STOP_COMMAND,
};
pub use limits::{LimitViolation, ProgramLimits};
pub use model::{Block, Element, Header, Program, Step, DEFAULT_LID_TEMPERATURE};
pub use parser::parse_program;
