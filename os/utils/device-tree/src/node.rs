use crate::Property;
use alloc::string::String;
use alloc::vec::Vec;

/// A device-tree node: a name, ordered properties and ordered children.
///
/// Property names are unique within a node; [`Node::set_property`] replaces
/// an existing value in place so the original ordering is kept.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Node {
    name: String,
    properties: Vec<Property>,
    children: Vec<Node>,
}

impl Node {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// An unnamed root node.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_property(mut self, property: Property) -> Self {
        self.set_property(property);
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.add_child(child);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[must_use]
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Insert `property`, replacing a same-named one in place.
    pub fn set_property(&mut self, property: Property) {
        match self.properties.iter_mut().find(|p| p.name() == property.name()) {
            Some(slot) => *slot = property,
            None => self.properties.push(property),
        }
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Property> {
        let index = self.properties.iter().position(|p| p.name() == name)?;
        Some(self.properties.remove(index))
    }

    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Self> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Append `child`, even if a sibling of the same name exists.
    pub fn add_child(&mut self, child: Self) {
        self.children.push(child);
    }

    /// Replace the first child named like `child` in place, or append it.
    pub fn upsert_child(&mut self, child: Self) {
        match self.child_mut(&child.name) {
            Some(slot) => *slot = child,
            None => self.children.push(child),
        }
    }

    pub fn remove_child(&mut self, name: &str) -> Option<Self> {
        let index = self.children.iter().position(|c| c.name == name)?;
        Some(self.children.remove(index))
    }
}
