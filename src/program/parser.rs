//! Program text parser
//!
//! Converts the indentation-based program format into a [`Program`]:
//!
//! ```text
//! Title: Canonical PCR
//! Lid: 95
//!
//! 60s @ 95C Burn In
//! x35:
//!     20s @ 95C Denature
//!     15s @ 65C Anneal
//!     30s @ 72C Extend
//! 20s @ 4C Chill
//! ```
//!
//! Headers come first, one `Key: Value` per line, followed by exactly one
//! blank line and the body. Body lines are either steps
//! (`<secs>[s] @ <temp>[C] <description>`) or repeat lines (`x<count>[:]`)
//! that open a block holding the following, deeper-indented lines.
//!
//! Indentation is tracked with an explicit stack of open frames owned by
//! [`parse_program`]; nothing is shared between calls.

use super::model::{Block, Element, Header, Program, Step, DEFAULT_LID_TEMPERATURE};
use crate::error::FormatError;

type ParseResult<T> = std::result::Result<T, FormatError>;

const STEP_PATTERN: &str = "expected `<seconds>[s] @ <temperature>[C] <description>`";
const REPEAT_PATTERN: &str = "expected `x<count>` or `x<count>:`";
const HEADER_PATTERN: &str = "expected `Key: Value`";

/// One line of the body after classification
#[derive(Debug, Clone, PartialEq, Eq)]
enum BodyLine {
    Step(Step),
    Repeat(u32),
}

/// An open block on the indentation stack
struct Frame {
    /// Indentation shared by the block's children, unknown until the first one
    indent: Option<usize>,
    /// Line that opened the block (0 for the root)
    opened_at: usize,
    block: Block,
}

impl Frame {
    fn root() -> Self {
        Self {
            indent: Some(0),
            opened_at: 0,
            block: Block::new(),
        }
    }
}

/// Parse the full text of a program definition
pub fn parse_program(text: &str) -> ParseResult<Program> {
    let lines: Vec<&str> = text.lines().map(|l| l.trim_end()).collect();

    let mut program = Program::new("", DEFAULT_LID_TEMPERATURE);
    let mut lid_seen = false;

    // ---- Header section ----
    let mut idx = 0;
    while idx < lines.len() && !lines[idx].is_empty() {
        let line_no = idx + 1;
        let header = parse_header_line(line_no, lines[idx])?;
        if header.key.eq_ignore_ascii_case("title") {
            program.title = header.value.clone();
        } else if header.key.eq_ignore_ascii_case("lid") {
            program.lid_temperature = parse_lid(line_no, &header.value)?;
            lid_seen = true;
        }
        program.headers.push(header);
        idx += 1;
    }

    if idx >= lines.len() {
        return Err(FormatError::at_line(
            lines.len().max(1),
            "missing blank line between headers and program body",
        ));
    }
    // lines[idx] is the separator
    idx += 1;
    if idx < lines.len() && lines[idx].is_empty() {
        return Err(FormatError::at_line(
            idx + 1,
            "exactly one blank line must separate headers from the program body",
        ));
    }

    if !lid_seen {
        tracing::debug!(
            "No Lid header, using default lid temperature {}",
            DEFAULT_LID_TEMPERATURE
        );
    }

    // ---- Body section ----
    program.body = parse_body(&lines, idx)?;
    Ok(program)
}

fn parse_header_line(line_no: usize, line: &str) -> ParseResult<Header> {
    let trimmed = line.trim();
    let step_like = match trimmed.split_once(':') {
        Some((key, _)) => key.contains('@'),
        None => trimmed.contains('@'),
    };
    if is_indented(line) || step_like || is_repeat_line(trimmed) {
        return Err(FormatError::at_line(
            line_no,
            "program line found in header section; missing blank line between headers and program body",
        ));
    }
    let (key, value) = line
        .split_once(':')
        .ok_or_else(|| FormatError::at_line(line_no, HEADER_PATTERN))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(FormatError::at_line(line_no, HEADER_PATTERN));
    }
    Ok(Header {
        key: key.to_string(),
        value: sanitize_header_value(value.trim()),
    })
}

/// Keep header values from breaking the `key=value&...` wire framing
fn sanitize_header_value(value: &str) -> String {
    value.replace('&', "+").replace('=', ":")
}

fn parse_lid(line_no: usize, value: &str) -> ParseResult<i32> {
    strip_unit(value, 'c').parse::<i32>().map_err(|_| {
        FormatError::at_line(
            line_no,
            format!("lid temperature `{}` is not an integer; expected `Lid: 95C`", value),
        )
    })
}

fn parse_body(lines: &[&str], start: usize) -> ParseResult<Block> {
    let mut stack: Vec<Frame> = vec![Frame::root()];
    let mut saw_line = false;

    for (offset, raw) in lines[start..].iter().enumerate() {
        let line_no = start + offset + 1;
        if raw.trim().is_empty() {
            continue;
        }
        saw_line = true;
        let indent = indent_width(raw);

        settle_indent(&mut stack, indent, line_no)?;

        let content = raw.trim();
        match parse_body_line(line_no, content)? {
            BodyLine::Step(step) => top(&mut stack).block.push(step),
            BodyLine::Repeat(count) => stack.push(Frame {
                indent: None,
                opened_at: line_no,
                block: Block::repeated(count),
            }),
        }
    }

    if !saw_line {
        return Err(FormatError::at_line(
            lines.len().max(1),
            "program body is empty",
        ));
    }

    while stack.len() > 1 {
        close_frame(&mut stack)?;
    }
    Ok(stack.pop().map(|f| f.block).unwrap_or_default())
}

/// Align the stack with a line at `indent`, opening or closing frames.
///
/// A fresh repeat frame takes the line as its first child when the line is
/// deeper than the enclosing block. A shallower line closes every frame whose
/// indentation exceeds it and must then land exactly on an open level.
fn settle_indent(stack: &mut Vec<Frame>, indent: usize, line_no: usize) -> ParseResult<()> {
    if top(stack).indent.is_none() {
        let parent_indent = stack[stack.len() - 2].indent.unwrap_or(0);
        if indent > parent_indent {
            top(stack).indent = Some(indent);
            return Ok(());
        }
        // The repeat line is followed by a line at or above its own level
        close_frame(stack)?;
    }

    let current = top(stack).indent.unwrap_or(0);
    if indent > current {
        return Err(FormatError::at_line(
            line_no,
            "unexpected indentation; only lines under a repeat line may be indented further",
        ));
    }

    while indent < top(stack).indent.unwrap_or(0) {
        close_frame(stack)?;
    }

    if top(stack).indent != Some(indent) {
        return Err(FormatError::at_line(
            line_no,
            "inconsistent indentation; line does not match any open block",
        ));
    }
    Ok(())
}

/// Pop the top frame and attach its block to the parent
fn close_frame(stack: &mut Vec<Frame>) -> ParseResult<()> {
    let Some(frame) = stack.pop() else {
        return Ok(());
    };
    if frame.block.is_empty() {
        return Err(FormatError::at_line(
            frame.opened_at,
            "repeat line has no indented steps below it",
        ));
    }
    if let Some(parent) = stack.last_mut() {
        parent.block.push(Element::Block(frame.block));
    }
    Ok(())
}

fn top(stack: &mut [Frame]) -> &mut Frame {
    // The root frame is never popped while lines remain
    let last = stack.len() - 1;
    &mut stack[last]
}

fn parse_body_line(line_no: usize, content: &str) -> ParseResult<BodyLine> {
    if let Some(rest) = content.strip_prefix('x') {
        if !content.contains('@') {
            return parse_repeat(line_no, rest).map(BodyLine::Repeat);
        }
    }
    parse_step(line_no, content).map(BodyLine::Step)
}

fn is_repeat_line(content: &str) -> bool {
    let Some(rest) = content.strip_prefix('x') else {
        return false;
    };
    let digits = rest.strip_suffix(':').unwrap_or(rest);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn parse_repeat(line_no: usize, rest: &str) -> ParseResult<u32> {
    let digits = rest.strip_suffix(':').unwrap_or(rest).trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FormatError::at_line(line_no, REPEAT_PATTERN));
    }
    let count: u32 = digits
        .parse()
        .map_err(|_| FormatError::at_line(line_no, "repeat count is too large"))?;
    if count == 0 {
        return Err(FormatError::at_line(line_no, "repeat count must be at least 1"));
    }
    Ok(count)
}

fn parse_step(line_no: usize, content: &str) -> ParseResult<Step> {
    let (time, rest) = content
        .split_once('@')
        .ok_or_else(|| FormatError::at_line(line_no, STEP_PATTERN))?;

    let time = strip_unit(time.trim(), 's');
    let duration_secs: u32 = time.parse().map_err(|_| {
        FormatError::at_line(line_no, format!("invalid duration `{}`; {}", time, STEP_PATTERN))
    })?;
    if duration_secs == 0 {
        return Err(FormatError::at_line(line_no, "step duration must be positive"));
    }

    let rest = rest.trim();
    let (temp, description) = match rest.split_once(char::is_whitespace) {
        Some((temp, description)) => (temp, description.trim()),
        None => (rest, ""),
    };
    let temp = strip_unit(temp, 'c');
    let temperature: i32 = temp.parse().map_err(|_| {
        FormatError::at_line(line_no, format!("invalid temperature `{}`; {}", temp, STEP_PATTERN))
    })?;

    Ok(Step::new(duration_secs, temperature, description))
}

/// Drop a trailing cosmetic unit letter, either case
fn strip_unit(value: &str, unit: char) -> &str {
    value
        .strip_suffix(unit)
        .or_else(|| value.strip_suffix(unit.to_ascii_uppercase()))
        .unwrap_or(value)
        .trim_end()
}

fn indent_width(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

fn is_indented(line: &str) -> bool {
    line.starts_with(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = "Title: Canonical PCR
Lid: 95

60s @ 95C Burn In
x35:
    20s @ 95C Denature
    15s @ 65C Anneal
    30s @ 72C Extend
20s @ 4C Chill
";

    #[test]
    fn test_parse_canonical_program() {
        let program = parse_program(CANONICAL).unwrap();
        assert_eq!(program.title, "Canonical PCR");
        assert_eq!(program.lid_temperature, 95);

        let elements = program.elements();
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0], Element::Step(Step::new(60, 95, "Burn In")));
        match &elements[1] {
            Element::Block(block) => {
                assert_eq!(block.repeat_count, Some(35));
                assert_eq!(block.children.len(), 3);
                assert_eq!(block.children[1], Element::Step(Step::new(15, 65, "Anneal")));
            }
            other => panic!("expected block, got {:?}", other),
        }
        assert_eq!(elements[2], Element::Step(Step::new(20, 4, "Chill")));
    }

    #[test]
    fn test_units_and_spacing_are_cosmetic() {
        let text = "Lid: 100c\n\n30@72 Extend it\n45s@-4c\n";
        let program = parse_program(text).unwrap();
        assert_eq!(program.lid_temperature, 100);
        assert_eq!(program.title, "");
        let steps: Vec<&Step> = program.steps().collect();
        assert_eq!(*steps[0], Step::new(30, 72, "Extend it"));
        assert_eq!(*steps[1], Step::new(45, -4, ""));
    }

    #[test]
    fn test_unknown_headers_are_retained() {
        let text = "title: T\nCustom: Ignored\nLID: 90\n\n10s @ 50C\n";
        let program = parse_program(text).unwrap();
        assert_eq!(program.title, "T");
        assert_eq!(program.lid_temperature, 90);
        assert_eq!(program.header("custom"), Some("Ignored"));
        assert_eq!(program.headers.len(), 3);
    }

    #[test]
    fn test_header_values_are_sanitized() {
        let text = "Title: A&B=C\n\n10s @ 50C\n";
        let program = parse_program(text).unwrap();
        assert_eq!(program.title, "A+B:C");
    }

    #[test]
    fn test_header_value_may_contain_at_sign() {
        let text = "Title: run@lab\n\n10s @ 50C\n";
        let program = parse_program(text).unwrap();
        assert_eq!(program.title, "run@lab");
    }

    #[test]
    fn test_zero_headers_start_with_blank_line() {
        let program = parse_program("\n10s @ 50C Hold\n").unwrap();
        assert_eq!(program.lid_temperature, DEFAULT_LID_TEMPERATURE);
        assert_eq!(program.body.step_count(), 1);
    }

    #[test]
    fn test_missing_blank_line_is_error() {
        let text = "Title: T\nLid: 95\n60s @ 95C Burn In\n";
        let err = parse_program(text).unwrap_err();
        assert_eq!(err.line, Some(3));

        let err = parse_program("Title: T\nLid: 95\n").unwrap_err();
        assert!(err.reason.contains("blank line"));
    }

    #[test]
    fn test_duplicate_blank_line_is_error() {
        let text = "Title: T\n\n\n60s @ 95C Burn In\n";
        let err = parse_program(text).unwrap_err();
        assert_eq!(err.line, Some(3));
        assert!(err.reason.contains("exactly one blank line"));
    }

    #[test]
    fn test_zero_repeat_is_error() {
        let text = "Lid: 95\n\nx0\n  10s @ 50C\n";
        let err = parse_program(text).unwrap_err();
        assert_eq!(err.line, Some(3));
    }

    #[test]
    fn test_repeat_without_children_is_error() {
        let err = parse_program("Lid: 95\n\nx3\n10s @ 50C\n").unwrap_err();
        assert_eq!(err.line, Some(3));
        let err = parse_program("Lid: 95\n\n10s @ 50C\nx3:\n").unwrap_err();
        assert_eq!(err.line, Some(4));
    }

    #[test]
    fn test_indent_after_step_is_error() {
        let err = parse_program("Lid: 95\n\n10s @ 50C\n  10s @ 60C\n").unwrap_err();
        assert_eq!(err.line, Some(4));
    }

    #[test]
    fn test_inconsistent_dedent_is_error() {
        let text = "Lid: 95\n\nx2\n    10s @ 50C\n  10s @ 60C\n";
        let err = parse_program(text).unwrap_err();
        assert_eq!(err.line, Some(5));
        assert!(err.reason.contains("inconsistent indentation"));
    }

    #[test]
    fn test_dedent_closes_only_deeper_blocks() {
        let text = "Lid: 95

x2
  10s @ 90C A
  x3
    10s @ 60C B
  10s @ 70C C
10s @ 4C D
";
        let program = parse_program(text).unwrap();
        assert_eq!(program.elements().len(), 2);
        let Element::Block(outer) = &program.elements()[0] else {
            panic!("expected outer block");
        };
        assert_eq!(outer.repeat_count, Some(2));
        assert_eq!(outer.children.len(), 3);
        let Element::Block(inner) = &outer.children[1] else {
            panic!("expected inner block");
        };
        assert_eq!(inner.repeat_count, Some(3));
        assert_eq!(inner.children, vec![Element::Step(Step::new(10, 60, "B"))]);
        assert_eq!(outer.children[2], Element::Step(Step::new(10, 70, "C")));
    }

    #[test]
    fn test_bad_step_lines() {
        for line in ["abc @ 50C", "10s 50C", "10s @ hot", "0s @ 50C"] {
            let text = format!("Lid: 95\n\n{}\n", line);
            let err = parse_program(&text).unwrap_err();
            assert_eq!(err.line, Some(3), "line `{}`", line);
        }
    }

    #[test]
    fn test_bad_lid() {
        let err = parse_program("Lid: warm\n\n10s @ 50C\n").unwrap_err();
        assert_eq!(err.line, Some(1));
    }

    #[test]
    fn test_empty_body_is_error() {
        assert!(parse_program("Lid: 95\n\n").is_err());
        assert!(parse_program("").is_err());
    }

    #[test]
    fn test_repeat_line_with_text_is_error() {
        let err = parse_program("Lid: 95\n\nx3 times\n  10s @ 50C\n").unwrap_err();
        assert_eq!(err.line, Some(3));
    }
}
