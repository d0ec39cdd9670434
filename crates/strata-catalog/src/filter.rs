//! Predicates over entity properties.

use std::fmt;
use std::sync::Arc;

use strata_props::PropertySet;

type Predicate = dyn Fn(&PropertySet) -> bool + Send + Sync;

/// A named predicate an entity's properties must satisfy to be listed.
#[derive(Clone)]
pub struct PropertyFilter {
    label: String,
    test: Arc<Predicate>,
}

impl PropertyFilter {
    /// `name` has exactly the single value `value`.
    pub fn equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        let (name, value) = (name.into(), value.into());
        Self {
            label: format!("{name} == {value:?}"),
            test: Arc::new(move |set: &PropertySet| matches!(set.values(&name), [v] if *v == value)),
        }
    }

    /// `name` has at least one value.
    pub fn has(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: format!("has {name}"),
            test: Arc::new(move |set: &PropertySet| set.contains(&name)),
        }
    }

    /// At least one value of `name` is among `values`.
    pub fn any_of<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        Self {
            label: format!("{name} in {values:?}"),
            test: Arc::new(move |set: &PropertySet| set.values(&name).iter().any(|v| values.contains(v))),
        }
    }

    /// An arbitrary predicate, identified by `label` in debug output.
    pub fn custom<F>(label: impl Into<String>, test: F) -> Self
    where
        F: Fn(&PropertySet) -> bool + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            test: Arc::new(test),
        }
    }

    pub fn matches(&self, set: &PropertySet) -> bool {
        (self.test)(set)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for PropertyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertyFilter").field(&self.label).finish()
    }
}
