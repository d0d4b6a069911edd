//! # PaNET Technique Controlled Vocabulary
//!
//! This module provides the controlled vocabulary used to turn free-text
//! technique tokens (`"saxs"`, `"PaNET01098"`, `"x-ray diffraction"`) into
//! canonical catalog records `{name, pid}` whose PID is a PaNET ontology URI.
//!
//! The vocabulary is an immutable table built once (usually with
//! [`TechniqueVocabulary::panet`]) and lent to a [`TechniqueResolver`].
//!
//! ## Reference
//! - PaNET ontology: https://doi.org/10.5281/zenodo.4806026
//! - Browser: http://purl.org/pan-science/PaNET/

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Namespace of PaNET term URIs
pub const PANET_NAMESPACE: &str = "http://purl.org/pan-science/PaNET/";

/// A technique term of the vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TechniqueTerm {
    /// Ontology accession (e.g., "PaNET01188")
    pub accession: &'static str,
    /// Canonical technique name
    pub name: &'static str,
    /// Short codes and NeXus application definition names
    pub codes: &'static [&'static str],
}

impl TechniqueTerm {
    /// Persistent identifier URI of the term
    pub fn pid(&self) -> String {
        format!("{}{}", PANET_NAMESPACE, self.accession)
    }
}

impl fmt::Display for TechniqueTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}: {}]", self.accession, self.name)
    }
}

/// Catalog technique record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Technique {
    /// Technique name
    pub name: String,
    /// Persistent identifier
    pub pid: String,
}

impl Technique {
    /// Create a technique record
    pub fn new(name: impl Into<String>, pid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pid: pid.into(),
        }
    }
}

impl From<&TechniqueTerm> for Technique {
    fn from(term: &TechniqueTerm) -> Self {
        Technique::new(term.name, term.pid())
    }
}

/// PaNET techniques known to the catalog
pub static PANET_TECHNIQUES: &[TechniqueTerm] = &[
    TechniqueTerm { accession: "PaNET01188", name: "small angle x-ray scattering", codes: &["saxs", "sas"] },
    TechniqueTerm { accession: "PaNET01191", name: "wide angle x-ray scattering", codes: &["waxs"] },
    TechniqueTerm { accession: "PaNET01098", name: "grazing incidence diffraction", codes: &["gid", "gixd"] },
    TechniqueTerm { accession: "PaNET01189", name: "grazing incidence small angle x-ray scattering", codes: &["gisaxs"] },
    TechniqueTerm { accession: "PaNET01190", name: "grazing incidence wide angle x-ray scattering", codes: &["giwaxs"] },
    TechniqueTerm { accession: "PaNET01174", name: "small angle neutron scattering", codes: &["sans"] },
    TechniqueTerm { accession: "PaNET01196", name: "x-ray absorption spectroscopy", codes: &["xas"] },
    TechniqueTerm { accession: "PaNET01195", name: "x-ray absorption near edge structure", codes: &["xanes"] },
    TechniqueTerm { accession: "PaNET01200", name: "extended x-ray absorption fine structure", codes: &["exafs"] },
    TechniqueTerm { accession: "PaNET01199", name: "x-ray emission spectroscopy", codes: &["xes"] },
    TechniqueTerm { accession: "PaNET01223", name: "x-ray fluorescence", codes: &["xrf"] },
    TechniqueTerm { accession: "PaNET01208", name: "x-ray photoelectron spectroscopy", codes: &["xps"] },
    TechniqueTerm { accession: "PaNET01202", name: "angle resolved photoemission spectroscopy", codes: &["arpes"] },
    TechniqueTerm { accession: "PaNET01145", name: "x-ray magnetic circular dichroism", codes: &["xmcd"] },
    TechniqueTerm { accession: "PaNET01228", name: "x-ray diffraction", codes: &["xrd"] },
    TechniqueTerm { accession: "PaNET01231", name: "powder diffraction", codes: &["pd", "xrpd"] },
    TechniqueTerm { accession: "PaNET01113", name: "single crystal diffraction", codes: &["scd", "xrot"] },
    TechniqueTerm { accession: "PaNET01117", name: "macromolecular crystallography", codes: &["mx"] },
    TechniqueTerm { accession: "PaNET01102", name: "diffuse scattering", codes: &["ds"] },
    TechniqueTerm { accession: "PaNET01216", name: "resonant inelastic x-ray scattering", codes: &["rixs"] },
    TechniqueTerm { accession: "PaNET01101", name: "inelastic x-ray scattering", codes: &["ixs"] },
    TechniqueTerm { accession: "PaNET01238", name: "nuclear resonance scattering", codes: &["nrs"] },
    TechniqueTerm { accession: "PaNET01277", name: "x-ray reflectivity", codes: &["xrr", "refscan"] },
    TechniqueTerm { accession: "PaNET01217", name: "x-ray standing wave", codes: &["xsw"] },
    TechniqueTerm { accession: "PaNET01220", name: "x-ray photon correlation spectroscopy", codes: &["xpcs"] },
    TechniqueTerm { accession: "PaNET01230", name: "coherent diffraction imaging", codes: &["cdi"] },
    TechniqueTerm { accession: "PaNET01229", name: "ptychography", codes: &["ptycho"] },
    TechniqueTerm { accession: "PaNET01114", name: "tomography", codes: &["tomo", "ct"] },
    TechniqueTerm { accession: "PaNET01173", name: "scanning transmission x-ray microscopy", codes: &["stxm"] },
];

/// Immutable technique lookup table
///
/// Lookups are case-insensitive over accessions, PID URIs, names and codes.
#[derive(Debug, Clone)]
pub struct TechniqueVocabulary {
    terms: &'static [TechniqueTerm],
    index: HashMap<String, usize>,
}

impl TechniqueVocabulary {
    /// Build a vocabulary over a term table
    pub fn new(terms: &'static [TechniqueTerm]) -> Self {
        let mut index = HashMap::new();
        for (i, term) in terms.iter().enumerate() {
            let keys = [term.accession, term.name]
                .into_iter()
                .chain(term.codes.iter().copied());
            for key in keys {
                index.entry(key.to_lowercase()).or_insert(i);
            }
            index.entry(term.pid().to_lowercase()).or_insert(i);
        }
        Self { terms, index }
    }

    /// The PaNET vocabulary
    pub fn panet() -> Self {
        Self::new(PANET_TECHNIQUES)
    }

    /// Find the term for a token
    ///
    /// NeXus application definition names are accepted with or without
    /// their `NX` prefix (`"NXsaxs"` finds `"saxs"`).
    pub fn lookup(&self, token: &str) -> Option<&TechniqueTerm> {
        let key = token.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }
        let found = self.index.get(&key).or_else(|| {
            key.strip_prefix("nx")
                .and_then(|stripped| self.index.get(stripped))
        });
        found.map(|&i| &self.terms[i])
    }

    /// Iterate over all terms
    pub fn iter(&self) -> impl Iterator<Item = &TechniqueTerm> {
        self.terms.iter()
    }

    /// Number of terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Check if the vocabulary is empty
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl Default for TechniqueVocabulary {
    fn default() -> Self {
        Self::panet()
    }
}

/// Resolves technique tokens against a vocabulary
#[derive(Debug, Clone, Copy)]
pub struct TechniqueResolver<'a> {
    vocabulary: &'a TechniqueVocabulary,
}

impl<'a> TechniqueResolver<'a> {
    /// Create a resolver borrowing a vocabulary
    pub fn new(vocabulary: &'a TechniqueVocabulary) -> Self {
        Self { vocabulary }
    }

    /// Resolve a comma/newline separated token list
    pub fn resolve_list(&self, text: &str) -> Vec<Technique> {
        self.resolve(&split_tokens(text), None)
    }

    /// Resolve tokens in order
    ///
    /// `pids`, when given, overrides the PID of the token at the same
    /// position; such tokens are kept even if the vocabulary does not know
    /// them. Other unknown tokens are dropped.
    pub fn resolve<S: AsRef<str>>(&self, tokens: &[S], pids: Option<&[Option<String>]>) -> Vec<Technique> {
        tokens
            .iter()
            .enumerate()
            .filter_map(|(i, token)| {
                let token = token.as_ref().trim();
                let custom = pids
                    .and_then(|p| p.get(i))
                    .and_then(|p| p.as_deref())
                    .filter(|p| !p.is_empty());
                let term = self.vocabulary.lookup(token);
                match (term, custom) {
                    (Some(term), Some(pid)) => Some(Technique::new(term.name, pid)),
                    (None, Some(pid)) if !token.is_empty() => Some(Technique::new(token, pid)),
                    (Some(term), None) => Some(Technique::from(term)),
                    _ => {
                        log::debug!("Dropping unknown technique '{}'", token);
                        None
                    }
                }
            })
            .collect()
    }
}

/// Split a technique list on commas and newlines
pub fn split_tokens(text: &str) -> Vec<String> {
    text.split([',', '\n'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_codes_in_order() {
        let vocabulary = TechniqueVocabulary::panet();
        let resolver = TechniqueResolver::new(&vocabulary);

        let techniques = resolver.resolve_list("waxs,saxs,PaNET01098");
        let names: Vec<_> = techniques.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "wide angle x-ray scattering",
                "small angle x-ray scattering",
                "grazing incidence diffraction"
            ]
        );
        for technique in &techniques {
            assert!(technique.pid.starts_with(PANET_NAMESPACE));
        }
        assert_eq!(
            techniques[2].pid,
            "http://purl.org/pan-science/PaNET/PaNET01098"
        );
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let vocabulary = TechniqueVocabulary::panet();
        let by_code = vocabulary.lookup("SAXS").unwrap();
        let by_name = vocabulary.lookup("Small Angle X-Ray Scattering").unwrap();
        let by_pid = vocabulary
            .lookup("http://purl.org/pan-science/PaNET/PaNET01188")
            .unwrap();
        let by_definition = vocabulary.lookup("NXsaxs").unwrap();
        assert_eq!(by_code, by_name);
        assert_eq!(by_code, by_pid);
        assert_eq!(by_code, by_definition);
        assert_eq!(by_code.to_string(), "[PaNET01188: small angle x-ray scattering]");
    }

    #[test]
    fn test_unknown_tokens_are_dropped() {
        let vocabulary = TechniqueVocabulary::panet();
        let resolver = TechniqueResolver::new(&vocabulary);
        let techniques = resolver.resolve_list("saxs, magic, ,xas\nsaxs");
        let names: Vec<_> = techniques.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "small angle x-ray scattering",
                "x-ray absorption spectroscopy",
                "small angle x-ray scattering"
            ]
        );
    }

    #[test]
    fn test_custom_pids_override_by_position() {
        let vocabulary = TechniqueVocabulary::panet();
        let resolver = TechniqueResolver::new(&vocabulary);
        let pids = vec![None, Some("http://example.org/custom".to_string())];
        let techniques = resolver.resolve(&["saxs", "my technique"], Some(pids.as_slice()));
        assert_eq!(
            techniques,
            vec![
                Technique::new(
                    "small angle x-ray scattering",
                    "http://purl.org/pan-science/PaNET/PaNET01188"
                ),
                Technique::new("my technique", "http://example.org/custom"),
            ]
        );
    }

    #[test]
    fn test_vocabulary_keys_are_unique() {
        let vocabulary = TechniqueVocabulary::panet();
        let mut seen = std::collections::HashSet::new();
        for term in vocabulary.iter() {
            assert!(seen.insert(term.accession), "duplicate {}", term.accession);
            for code in term.codes {
                assert_eq!(vocabulary.lookup(code), Some(term));
            }
        }
        assert_eq!(vocabulary.len(), PANET_TECHNIQUES.len());
    }
}
