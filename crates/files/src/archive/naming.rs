use std::collections::HashSet;

pub const CONFLICT_SUFFIX: &str = " Conflicted";

/// Names already used within one archive.
///
/// The first collision on a name appends [`CONFLICT_SUFFIX`]; any further
/// collision also appends a counter (` Conflicted (2)`, ` Conflicted (3)`, ...)
/// so that no two entries ever share a name.
#[derive(Debug, Default)]
pub struct EntryNames {
    used: HashSet<String>,
}
impl EntryNames {
    /// Reserve a unique name derived from `name`.
    pub fn claim(&mut self, name: String) -> String {
        let name = if self.used.contains(&name) { self.disambiguate(&name) } else { name };
        self.used.insert(name.clone());
        name
    }

    fn disambiguate(&self, name: &str) -> String {
        let conflicted = format!("{name}{CONFLICT_SUFFIX}");
        if !self.used.contains(&conflicted) {
            return conflicted;
        }
        let mut counter = 2;
        loop {
            let candidate = format!("{conflicted} ({counter})");
            if !self.used.contains(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}
