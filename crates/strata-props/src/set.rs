use serde::{Deserialize, Serialize};

/// Named multi-valued string properties, in first-definition order.
///
/// A property with no values does not exist: assigning an empty list removes
/// it, and [`PropertySet::values`] of an unknown name is empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySet {
    entries: Vec<(String, Vec<String>)>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all values of `name`. An empty list removes the property;
    /// an existing property keeps its position.
    pub fn set(&mut self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        let position = self.entries.iter().position(|(n, _)| *n == name);
        match (position, values.is_empty()) {
            (Some(i), true) => {
                self.entries.remove(i);
            }
            (Some(i), false) => self.entries[i].1 = values,
            (None, true) => {}
            (None, false) => self.entries.push((name, values)),
        }
    }

    /// Builder form of [`PropertySet::set`].
    pub fn with<S: Into<String>>(mut self, name: &str, values: impl IntoIterator<Item = S>) -> Self {
        self.set(name, values.into_iter().map(Into::into).collect());
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        let i = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(i).1)
    }

    /// Values of `name`, empty when absent.
    pub fn values(&self, name: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
