//! Engine identity collected during the handshake.

use serde::Serialize;
use std::collections::HashMap;

/// One declared engine option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionEntry {
    pub name: String,
    pub value: String,
}

/// What the engine told us about itself during identification.
///
/// Built incrementally by the handshake state machine and handed out only
/// once the engine has sent its completion token, so partially-populated
/// identities are never observable. Immutable afterwards: the only
/// mutators are crate-private.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineIdentity {
    name: Option<String>,
    author: Option<String>,
    options: Vec<OptionEntry>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl EngineIdentity {
    /// Engine name from `id name`, if the engine sent one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Engine author from `id author`, if the engine sent one.
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Declared value for `name`, if the engine announced that option.
    pub fn option(&self, name: &str) -> Option<&str> {
        self.index
            .get(name)
            .map(|&i| self.options[i].value.as_str())
    }

    /// Declared options in the order the engine first announced them.
    pub fn options(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options
            .iter()
            .map(|entry| (entry.name.as_str(), entry.value.as_str()))
    }

    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    // Engines resend id lines; last write wins.
    pub(crate) fn set_name(&mut self, value: String) {
        self.name = Some(value);
    }

    pub(crate) fn set_author(&mut self, value: String) {
        self.author = Some(value);
    }

    /// Insert or overwrite an option. Repeats update the value in place,
    /// keeping the first-seen position.
    pub(crate) fn set_option(&mut self, name: String, value: String) {
        match self.index.get(&name) {
            Some(&i) => self.options[i].value = value,
            None => {
                self.index.insert(name.clone(), self.options.len());
                self.options.push(OptionEntry { name, value });
            }
        }
    }
}
