//! Test data builders for creating test objects

use pcrlink::program::{Block, Program, Step};

/// Builds a program and its source text side by side
pub struct ProgramBuilder {
    title: String,
    lid: i32,
    program: Program,
    body: Vec<String>,
}

impl ProgramBuilder {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            lid: 95,
            program: Program::new(title, 95),
            body: Vec::new(),
        }
    }

    pub fn lid(mut self, lid: i32) -> Self {
        self.lid = lid;
        self.program.lid_temperature = lid;
        self
    }

    /// Append a top-level step
    pub fn step(mut self, secs: u32, temp: i32, desc: &str) -> Self {
        self.body.push(step_line(secs, temp, desc));
        self.program.body.push(Step::new(secs, temp, desc));
        self
    }

    /// Append a repeat block of steps
    pub fn repeat(mut self, count: u32, steps: &[(u32, i32, &str)]) -> Self {
        self.body.push(format!("x{}:", count));
        let mut block = Block::repeated(count);
        for &(secs, temp, desc) in steps {
            self.body.push(format!("  {}", step_line(secs, temp, desc)));
            block.push(Step::new(secs, temp, desc));
        }
        self.program.body.push(block);
        self
    }

    /// Program text in the hand-authored file format
    pub fn text(&self) -> String {
        format!(
            "Title: {}\nLid: {}\n\n{}\n",
            self.title,
            self.lid,
            self.body.join("\n")
        )
    }

    /// The program the text should parse into, without header bookkeeping
    pub fn build(&self) -> Program {
        self.program.clone()
    }
}

fn step_line(secs: u32, temp: i32, desc: &str) -> String {
    format!("{}s @ {}C {}", secs, temp, desc).trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_builder() {
        let builder = ProgramBuilder::new("Demo")
            .lid(100)
            .step(60, 95, "Start")
            .repeat(3, &[(10, 90, "Hot"), (10, 50, "Cold")]);

        let program = builder.build();
        assert_eq!(program.lid_temperature, 100);
        assert_eq!(program.elements().len(), 2);
        assert_eq!(
            builder.text(),
            "Title: Demo\nLid: 100\n\n60s @ 95C Start\nx3:\n  10s @ 90C Hot\n  10s @ 50C Cold\n"
        );
    }
}
