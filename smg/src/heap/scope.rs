use crate::heap::ObjectId;
use internment::Intern;
use std::collections::BTreeMap;

pub type VarName = Intern<String>;

/// Local variables of one function invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    function: VarName,
    variables: BTreeMap<VarName, ObjectId>,
    return_object: Option<ObjectId>,
}

impl StackFrame {
    pub fn new(function: VarName) -> Self {
        Self {
            function,
            variables: BTreeMap::new(),
            return_object: None,
        }
    }

    pub fn function(&self) -> VarName {
        self.function
    }

    pub fn variables(&self) -> &BTreeMap<VarName, ObjectId> {
        &self.variables
    }

    pub fn variable(&self, name: &VarName) -> Option<ObjectId> {
        self.variables.get(name).copied()
    }

    pub fn return_object(&self) -> Option<ObjectId> {
        self.return_object
    }

    /// All objects owned by this frame, including the return object.
    pub fn objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.variables.values().copied().chain(self.return_object)
    }

    pub(crate) fn insert(&mut self, name: VarName, object: ObjectId) -> Option<ObjectId> {
        self.variables.insert(name, object)
    }

    pub(crate) fn remove(&mut self, name: &VarName) -> Option<ObjectId> {
        self.variables.remove(name)
    }

    pub(crate) fn set_return_object(&mut self, object: ObjectId) {
        self.return_object = Some(object);
    }
}
