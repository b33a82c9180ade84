//! Textual disassembly of compiled frames.

use std::fmt::Write;

use crate::instruction::FrameTemplate;

/// Render one frame as `Frame 'name' (args: n)` followed by indexed
/// instructions, one per line.
pub fn disassemble(template: &FrameTemplate) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Frame '{}' (args: {})", template.name, template.arg_count);
    for (i, instr) in template.instructions.iter().enumerate() {
        let _ = writeln!(out, "  {:>4}: {}", i, instr);
    }
    out
}

/// Render a whole program, frames sorted by name so output is stable.
pub fn disassemble_program<'a>(templates: impl Iterator<Item = &'a FrameTemplate>) -> String {
    let mut frames: Vec<&FrameTemplate> = templates.collect();
    frames.sort_by(|a, b| a.name.cmp(&b.name));
    let mut out = String::new();
    for t in frames {
        out.push_str(&disassemble(t));
        out.push('\n');
    }
    out
}
