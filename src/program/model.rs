//! In-memory representation of a cycling program
//!
//! A [`Program`] owns a root [`Block`] whose children are the top-level
//! groups of the run. Each child is either a single [`Step`] or a nested
//! [`Block`]. Programs are built once by the parser (or by hand) and are not
//! mutated afterwards.

use serde::{Deserialize, Serialize};

/// Lid temperature used when the program text has no `Lid` header
pub const DEFAULT_LID_TEMPERATURE: i32 = 95;

/// A single hold: keep the block at `temperature` for `duration_secs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Hold time in seconds (always positive)
    pub duration_secs: u32,
    /// Target block temperature in degrees Celsius
    pub temperature: i32,
    /// Free text shown on the device display (may be empty)
    pub description: String,
}

impl Step {
    /// Create a new step
    pub fn new(duration_secs: u32, temperature: i32, description: impl Into<String>) -> Self {
        Self {
            duration_secs,
            temperature,
            description: description.into(),
        }
    }
}

/// One entry of a [`Block`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Element {
    Step(Step),
    Block(Block),
}

impl Element {
    /// Total number of steps under this element, counted once per listing
    pub fn step_count(&self) -> usize {
        match self {
            Element::Step(_) => 1,
            Element::Block(block) => block.step_count(),
        }
    }
}

impl From<Step> for Element {
    fn from(step: Step) -> Self {
        Element::Step(step)
    }
}

impl From<Block> for Element {
    fn from(block: Block) -> Self {
        Element::Block(block)
    }
}

/// An ordered group of steps and nested blocks.
///
/// `repeat_count` of `None` means "run once, not a repeat group", which the
/// wire format encodes differently from `Some(1)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub repeat_count: Option<u32>,
    pub children: Vec<Element>,
}

impl Block {
    /// Create an unflagged block (the program root uses this)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repeat group
    pub fn repeated(count: u32) -> Self {
        Self {
            repeat_count: Some(count),
            children: Vec::new(),
        }
    }

    /// Append a child, builder style
    pub fn with(mut self, child: impl Into<Element>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Append a child
    pub fn push(&mut self, child: impl Into<Element>) {
        self.children.push(child.into());
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of steps listed under this block, not multiplied by repeats
    pub fn step_count(&self) -> usize {
        self.children.iter().map(Element::step_count).sum()
    }

    /// Nesting depth of blocks below this one (0 if it holds only steps)
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                Element::Step(_) => 0,
                Element::Block(block) => 1 + block.depth(),
            })
            .max()
            .unwrap_or(0)
    }
}

/// A `Key: Value` line from the program header section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub key: String,
    pub value: String,
}

/// A complete cycling program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Program name sent to the device
    pub title: String,
    /// Heated lid temperature in degrees Celsius
    pub lid_temperature: i32,
    /// Every header line in source order, including unrecognized keys
    pub headers: Vec<Header>,
    /// Root block; each child becomes one top-level group
    pub body: Block,
}

impl Program {
    /// Create an empty program
    pub fn new(title: impl Into<String>, lid_temperature: i32) -> Self {
        Self {
            title: title.into(),
            lid_temperature,
            headers: Vec::new(),
            body: Block::new(),
        }
    }

    /// Append a top-level element, builder style
    pub fn with(mut self, element: impl Into<Element>) -> Self {
        self.body.push(element);
        self
    }

    /// Top-level elements in order
    pub fn elements(&self) -> &[Element] {
        &self.body.children
    }

    /// Look up a header value by case-insensitive key
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.key.eq_ignore_ascii_case(key))
            .map(|h| h.value.as_str())
    }

    /// Iterate every step in listing order, depth first
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        let mut stack: Vec<std::slice::Iter<'_, Element>> = vec![self.body.children.iter()];
        std::iter::from_fn(move || loop {
            let top = stack.last_mut()?;
            match top.next() {
                Some(Element::Step(step)) => return Some(step),
                Some(Element::Block(block)) => stack.push(block.children.iter()),
                None => {
                    stack.pop();
                }
            }
        })
    }
}
