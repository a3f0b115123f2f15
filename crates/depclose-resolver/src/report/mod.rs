//! Output assembly
//!
//! Pure projections of resolved sources into sorted documents. Keys and
//! requester lists are always sorted so identical inputs produce
//! byte-identical output.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use depclose_core::error::DepcloseError;

use crate::ResolverResult;

/// Source name -> sorted requester names
pub type SourceClosure = BTreeMap<String, Vec<String>>;

/// Project an attribution map into a sorted closure
pub fn assemble(resolved: &BTreeMap<String, BTreeSet<String>>) -> SourceClosure {
    resolved
        .iter()
        .map(|(source, requesters)| (source.clone(), requesters.iter().cloned().collect()))
        .collect()
}

/// Requesters of one source, per dependency class
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buildreq: Option<Vec<String>>,
}

impl PackageEntry {
    pub fn is_empty(&self) -> bool {
        self.runtime.is_none() && self.buildreq.is_none()
    }
}

/// Serializable output document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReportDocument {
    /// One class requested: `{source: [requester, ...]}`
    Single(SourceClosure),
    /// Both classes requested: `{source: {runtime: [...], buildreq: [...]}}`
    Combined(BTreeMap<String, PackageEntry>),
    /// A single source's entry
    Package(PackageEntry),
}

impl ReportDocument {
    /// Pretty JSON rendering with a trailing newline
    pub fn to_json(&self) -> ResolverResult<String> {
        let mut out = serde_json::to_string_pretty(self).map_err(|e| DepcloseError::Serialization {
            what: "dependency report".to_string(),
            message: e.to_string(),
        })?;
        out.push('\n');
        Ok(out)
    }
}

/// Closures of the enabled dependency classes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyReport {
    pub runtime: Option<SourceClosure>,
    pub buildreq: Option<SourceClosure>,
}

impl DependencyReport {
    pub fn new(runtime: Option<SourceClosure>, buildreq: Option<SourceClosure>) -> Self {
        Self { runtime, buildreq }
    }

    /// Every source in any enabled closure, sorted
    pub fn sources(&self) -> BTreeSet<&str> {
        self.runtime
            .iter()
            .chain(self.buildreq.iter())
            .flat_map(|closure| closure.keys().map(String::as_str))
            .collect()
    }

    /// Entry of one source across both classes
    pub fn entry(&self, source: &str) -> PackageEntry {
        PackageEntry {
            runtime: self.runtime.as_ref().and_then(|c| c.get(source).cloned()),
            buildreq: self.buildreq.as_ref().and_then(|c| c.get(source).cloned()),
        }
    }

    /// `{source: {runtime, buildreq}}` over every source
    pub fn combined(&self) -> BTreeMap<String, PackageEntry> {
        self.sources()
            .into_iter()
            .map(|source| (source.to_string(), self.entry(source)))
            .collect()
    }

    /// Document shape for the enabled classes
    pub fn document(&self) -> ReportDocument {
        match (&self.runtime, &self.buildreq) {
            (Some(_), Some(_)) => ReportDocument::Combined(self.combined()),
            (Some(closure), None) | (None, Some(closure)) => ReportDocument::Single(closure.clone()),
            (None, None) => ReportDocument::Single(SourceClosure::new()),
        }
    }

    /// Document restricted to one source
    pub fn for_package(&self, source: &str) -> ReportDocument {
        ReportDocument::Package(self.entry(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closure(entries: &[(&str, &[&str])]) -> SourceClosure {
        entries
            .iter()
            .map(|(source, requesters)| {
                (
                    source.to_string(),
                    requesters.iter().map(|r| r.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_assemble_sorts() {
        let mut resolved = BTreeMap::new();
        resolved.insert(
            "zeta".to_string(),
            ["b", "a"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        );
        resolved.insert("alpha".to_string(), BTreeSet::from(["x".to_string()]));

        let out = assemble(&resolved);
        let keys: Vec<_> = out.keys().cloned().collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
        assert_eq!(out["zeta"], vec!["a", "b"]);
    }

    #[test]
    fn test_single_class_document() {
        let report = DependencyReport::new(Some(closure(&[("foo-src", &["A"])])), None);
        let json = report.document().to_json().unwrap();
        assert_eq!(json, "{\n  \"foo-src\": [\n    \"A\"\n  ]\n}\n");
    }

    #[test]
    fn test_combined_document() {
        let report = DependencyReport::new(
            Some(closure(&[("foo-src", &["A"]), ("bar-src", &["B"])])),
            Some(closure(&[("foo-src", &["a-src"]), ("gcc", &["a-src"])])),
        );

        let combined = report.combined();
        assert_eq!(
            combined.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["bar-src", "foo-src", "gcc"]
        );
        assert_eq!(combined["bar-src"].buildreq, None);
        assert_eq!(combined["gcc"].runtime, None);
        assert_eq!(combined["foo-src"].runtime, Some(vec!["A".to_string()]));

        let value: serde_json::Value =
            serde_json::from_str(&report.document().to_json().unwrap()).unwrap();
        assert_eq!(value["foo-src"]["buildreq"][0], "a-src");
        assert!(value["gcc"].get("runtime").is_none());
    }

    #[test]
    fn test_for_package_and_empty() {
        let report = DependencyReport::new(Some(closure(&[("foo-src", &["A"])])), None);
        assert_eq!(
            report.for_package("foo-src"),
            ReportDocument::Package(PackageEntry {
                runtime: Some(vec!["A".to_string()]),
                buildreq: None
            })
        );
        assert!(report.entry("missing").is_empty());

        let none = DependencyReport::default();
        assert_eq!(none.document().to_json().unwrap(), "{}\n");
    }
}
