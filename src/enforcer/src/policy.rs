//! In-memory rule index
//!
//! Rules are grouped by ptype (`p`, `p2`, `g`, ...). Within a ptype they keep
//! insertion order and are de-duplicated.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A policy or grouping rule: an ordered, fixed-arity sequence of fields
pub type Rule = Vec<String>;

/// Rules of every ptype, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySet {
    sections: IndexMap<String, IndexSet<Rule>>,
}

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(ptype, rule)` pairs, dropping duplicates
    pub fn from_rules<I>(rules: I) -> Self
    where
        I: IntoIterator<Item = (String, Rule)>,
    {
        let mut set = Self::new();
        for (ptype, rule) in rules {
            set.add(&ptype, rule);
        }
        set
    }

    /// Append `rule` unless present. Returns whether it was inserted.
    pub fn add(&mut self, ptype: &str, rule: Rule) -> bool {
        self.sections.entry(ptype.to_string()).or_default().insert(rule)
    }

    /// Append every absent rule, returning the ones inserted
    pub fn add_all(&mut self, ptype: &str, rules: &[Rule]) -> Vec<Rule> {
        let section = self.sections.entry(ptype.to_string()).or_default();
        rules
            .iter()
            .filter(|rule| section.insert((*rule).clone()))
            .cloned()
            .collect()
    }

    /// Remove `rule` keeping the order of the remaining rules
    pub fn remove(&mut self, ptype: &str, rule: &[String]) -> bool {
        self.sections
            .get_mut(ptype)
            .map(|section| section.shift_remove(rule))
            .unwrap_or(false)
    }

    /// Replace `old` with `new` in place.
    ///
    /// Returns `false` without changes if `old` is absent. The caller checks
    /// that `new` is not already present elsewhere in the section.
    pub fn replace(&mut self, ptype: &str, old: &[String], new: &Rule) -> bool {
        self.replace_all(ptype, &[(old.to_vec(), new.clone())])
    }

    /// Replace several rules in one pass, each keeping its position.
    ///
    /// Returns `false` without changes if any old rule is absent.
    pub fn replace_all(&mut self, ptype: &str, replacements: &[(Rule, Rule)]) -> bool {
        let Some(section) = self.sections.get_mut(ptype) else {
            return false;
        };
        if !replacements.iter().all(|(old, _)| section.contains(old)) {
            return false;
        }

        let mapping: HashMap<&Rule, &Rule> =
            replacements.iter().map(|(old, new)| (old, new)).collect();
        *section = section
            .iter()
            .map(|rule| (*mapping.get(rule).unwrap_or(&rule)).clone())
            .collect();
        true
    }

    /// Remove every rule whose fields starting at `field_index` equal
    /// `values`; an empty value matches anything. Returns the removed rules.
    pub fn remove_filtered(
        &mut self,
        ptype: &str,
        field_index: usize,
        values: &[String],
    ) -> Vec<Rule> {
        let Some(section) = self.sections.get_mut(ptype) else {
            return Vec::new();
        };

        let mut removed = Vec::new();
        section.retain(|rule| {
            if rule_matches_filter(rule, field_index, values) {
                removed.push(rule.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn contains(&self, ptype: &str, rule: &[String]) -> bool {
        self.sections
            .get(ptype)
            .map(|section| section.contains(rule))
            .unwrap_or(false)
    }

    /// Rules of one ptype in insertion order
    pub fn get(&self, ptype: &str) -> Vec<Rule> {
        self.sections
            .get(ptype)
            .map(|section| section.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Borrowing iterator over one ptype
    pub fn iter(&self, ptype: &str) -> impl Iterator<Item = &Rule> {
        self.sections.get(ptype).into_iter().flat_map(|section| section.iter())
    }

    /// Number of rules in one ptype
    pub fn len(&self, ptype: &str) -> usize {
        self.sections.get(ptype).map(IndexSet::len).unwrap_or(0)
    }

    /// Number of rules across every ptype
    pub fn total_len(&self) -> usize {
        self.sections.values().map(IndexSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.values().all(IndexSet::is_empty)
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }

    /// Every `(ptype, rule)` pair, section by section
    pub fn snapshot(&self) -> Vec<(String, Rule)> {
        self.sections
            .iter()
            .flat_map(|(ptype, section)| {
                section.iter().map(move |rule| (ptype.clone(), rule.clone()))
            })
            .collect()
    }
}

/// Whether `rule[field_index + i] == values[i]` for every non-empty value
pub fn rule_matches_filter(rule: &[String], field_index: usize, values: &[String]) -> bool {
    let fields = rule.get(field_index..).unwrap_or_default();
    values.iter().enumerate().all(|(i, value)| {
        value.is_empty() || fields.get(i).map(|field| field == value).unwrap_or(false)
    })
}
