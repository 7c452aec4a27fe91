use crate::heap::SymbolicMemoryGraph;
use std::fmt::{Display, Formatter};

impl Display for SymbolicMemoryGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "globals:")?;
        for (name, object) in self.globals() {
            writeln!(f, "  {} = {}", name, object)?;
        }
        for frame in self.stack() {
            writeln!(f, "frame {}:", frame.function())?;
            for (name, object) in frame.variables() {
                writeln!(f, "  {} = {}", name, object)?;
            }
            if let Some(ret) = frame.return_object() {
                writeln!(f, "  <return> = {}", ret)?;
            }
        }
        writeln!(f, "objects:")?;
        for (id, object) in self.objects() {
            let heap = if self.is_heap_object(id) { " heap" } else { "" };
            let valid = if object.is_valid() { "" } else { " invalid" };
            writeln!(
                f,
                "  {} '{}' size={} level={} {}{}{}",
                id,
                object.label(),
                object.size(),
                object.level(),
                object.kind(),
                heap,
                valid
            )?;
            for edge in self.fields_of(id) {
                write!(f, "    +{}:{} = {}", edge.offset, edge.width, edge.value)?;
                match self.points_to(edge.value) {
                    Some(pt) if !pt.target.is_null() => {
                        writeln!(f, " -> {}+{} ({})", pt.target, pt.offset, pt.specifier)?
                    }
                    _ => writeln!(f)?,
                }
            }
        }
        Ok(())
    }
}
