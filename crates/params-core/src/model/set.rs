//! The parameter set: every category a device exposes at a point in time.

use std::collections::HashMap;

use crate::model::category::ParameterCategory;
use crate::model::parameter::Parameter;

/// The full ordered collection of parameter categories for one device.
///
/// `version` is a schema tag chosen by the embedding application; `source`
/// is a free-form provenance tag naming the device that produced the data.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    pub version: String,
    pub source: String,
    pub categories: Vec<ParameterCategory>,
}

impl ParameterSet {
    pub fn new(version: &str, source: &str) -> Self {
        Self {
            version: version.to_string(),
            source: source.to_string(),
            categories: Vec::new(),
        }
    }

    /// Builder-style category append.
    pub fn with(mut self, category: ParameterCategory) -> Self {
        self.categories.push(category);
        self
    }

    /// All parameters flattened in category order, then entry order.
    pub fn all_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.categories.iter().flat_map(|c| c.entries.iter())
    }

    /// Map from uuid to parameter. If two parameters share a uuid the later
    /// one (in flattened order) wins.
    pub fn by_uuid(&self) -> HashMap<String, &Parameter> {
        let mut map = HashMap::new();
        for parameter in self.all_parameters() {
            map.insert(parameter.uuid(), parameter);
        }
        map
    }

    /// Looks up a parameter by uuid. On a uuid collision the last match in
    /// flattened order is returned, mirroring [`by_uuid`](Self::by_uuid).
    pub fn get(&self, uuid: &str) -> Option<&Parameter> {
        self.all_parameters().filter(|p| p.uuid() == uuid).last()
    }

    /// Mutable lookup by uuid, same collision rule as [`get`](Self::get).
    pub fn get_mut(&mut self, uuid: &str) -> Option<&mut Parameter> {
        self.categories
            .iter_mut()
            .flat_map(|c| c.entries.iter_mut())
            .filter(|p| p.uuid() == uuid)
            .last()
    }

    /// Total number of parameters across all categories.
    pub fn len(&self) -> usize {
        self.categories.iter().map(|c| c.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merges a decoded remote set into this one, uuid-keyed,
    /// last-write-wins. Matching local parameters take the remote payload
    /// (observers survive and are notified); remote parameters with no
    /// local match are appended to the same-named category, which is
    /// created at the end of the category list if absent. Adopts the remote
    /// `source` tag and returns the number of parameters applied.
    pub fn merge_from(&mut self, remote: ParameterSet) -> usize {
        let mut applied = 0;
        for category in remote.categories {
            for parameter in category.entries {
                let uuid = parameter.uuid();
                match self.position_of(&uuid) {
                    Some((c, e)) => {
                        let local = &mut self.categories[c].entries[e];
                        if local.data_type() == parameter.data_type() {
                            // Same variant: keep the local parameter (and
                            // its observers), take the remote payload.
                            local.persisted = parameter.persisted;
                            let value = parameter.value().clone();
                            if local.replace_value(value).is_ok() {
                                applied += 1;
                            }
                        } else {
                            // Variant changed remotely: replace the entry.
                            *local = parameter;
                            applied += 1;
                        }
                    }
                    None => {
                        self.category_mut_or_insert(&category.name)
                            .entries
                            .push(parameter);
                        applied += 1;
                    }
                }
            }
        }
        self.source = remote.source;
        applied
    }

    /// Position of the last parameter with this uuid, mirroring the
    /// last-write-wins rule of [`by_uuid`](Self::by_uuid).
    fn position_of(&self, uuid: &str) -> Option<(usize, usize)> {
        let mut found = None;
        for (c, category) in self.categories.iter().enumerate() {
            for (e, parameter) in category.entries.iter().enumerate() {
                if parameter.uuid() == uuid {
                    found = Some((c, e));
                }
            }
        }
        found
    }

    fn category_mut_or_insert(&mut self, name: &str) -> &mut ParameterCategory {
        if let Some(idx) = self.categories.iter().position(|c| c.name == name) {
            &mut self.categories[idx]
        } else {
            self.categories.push(ParameterCategory::new(name));
            self.categories.last_mut().expect("just pushed")
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
