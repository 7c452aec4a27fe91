use crate::heap::{ObjectId, SymbolicMemoryGraph, VarName};
use internment::Intern;
use std::collections::{BTreeMap, VecDeque};
use std::fmt::{Display, Formatter};

/// The variable a [`MemoryPath`] starts at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathRoot {
    Global(VarName),
    Local { function: VarName, name: VarName },
    Return { function: VarName },
}

/// A sequence of field offsets leading from a variable to a memory location.
///
/// The first offset selects a field of the variable's object; every following offset
/// selects a field of the object the previous field points to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemoryPath {
    root: PathRoot,
    offsets: Vec<u64>,
}

impl MemoryPath {
    pub fn new(root: PathRoot) -> Self {
        Self {
            root,
            offsets: vec![],
        }
    }

    pub fn global(name: &str) -> Self {
        Self::new(PathRoot::Global(Intern::new(name.to_string())))
    }

    pub fn local(function: &str, name: &str) -> Self {
        Self::new(PathRoot::Local {
            function: Intern::new(function.to_string()),
            name: Intern::new(name.to_string()),
        })
    }

    /// Extend the path by one field.
    pub fn field(&self, offset: u64) -> Self {
        let mut offsets = self.offsets.clone();
        offsets.push(offset);
        Self {
            root: self.root.clone(),
            offsets,
        }
    }

    pub fn root(&self) -> &PathRoot {
        &self.root
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }
}

impl Display for MemoryPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.root {
            PathRoot::Global(name) => write!(f, "{}", name)?,
            PathRoot::Local { function, name } => write!(f, "{}::{}", function, name)?,
            PathRoot::Return { function } => write!(f, "{}::<return>", function)?,
        }
        for (i, offset) in self.offsets.iter().enumerate() {
            if i == 0 {
                write!(f, "+{}", offset)?;
            } else {
                write!(f, "->+{}", offset)?;
            }
        }
        Ok(())
    }
}

impl SymbolicMemoryGraph {
    /// The shortest memory path to every object reachable from a variable.
    ///
    /// Globals are visited before locals and outer frames before inner ones, so the
    /// result is deterministic.
    pub fn object_paths(&self) -> BTreeMap<ObjectId, MemoryPath> {
        let mut paths = BTreeMap::new();
        let mut queue = VecDeque::new();
        let mut roots: Vec<(ObjectId, PathRoot)> = self
            .globals()
            .iter()
            .map(|(name, o)| (*o, PathRoot::Global(*name)))
            .collect();
        for frame in self.stack() {
            let function = frame.function();
            roots.extend(
                frame
                    .variables()
                    .iter()
                    .map(|(name, o)| (*o, PathRoot::Local { function, name: *name })),
            );
            roots.extend(
                frame
                    .return_object()
                    .map(|o| (o, PathRoot::Return { function })),
            );
        }
        for (object, root) in roots {
            if let std::collections::btree_map::Entry::Vacant(e) = paths.entry(object) {
                e.insert(MemoryPath::new(root));
                queue.push_back(object);
            }
        }
        while let Some(object) = queue.pop_front() {
            let path = paths[&object].clone();
            for edge in self.fields_of(object) {
                let Some(pt) = self.points_to(edge.value) else {
                    continue;
                };
                if pt.target.is_null() || paths.contains_key(&pt.target) {
                    continue;
                }
                paths.insert(pt.target, path.field(edge.offset));
                queue.push_back(pt.target);
            }
        }
        paths
    }

    /// The shortest memory path of every has-value edge reachable from a variable,
    /// keyed by `(object, offset)`.
    pub fn field_paths(&self) -> BTreeMap<(ObjectId, u64), MemoryPath> {
        let object_paths = self.object_paths();
        let mut result = BTreeMap::new();
        for (object, path) in &object_paths {
            for edge in self.fields_of(*object) {
                result.insert((*object, edge.offset), path.field(edge.offset));
            }
        }
        result
    }
}
