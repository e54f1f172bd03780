//! Barrel (C4): an ordered per-document (or per-class) metadata array
//! paired with a [`crate::wi2dvf::InvertedIndex`].

use std::collections::HashMap;

use crate::wi2dvf::InvertedIndex;

/// Role assigned to a document by the split/tag engine (C5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Train,
    Test,
    Unlabeled,
    Validation,
    Ignore,
    Untagged,
    Pool,
    Waiting,
}

impl Default for Tag {
    fn default() -> Self {
        Tag::Untagged
    }
}

/// Bidirectional class-name ↔ class-id mapping.
#[derive(Debug, Clone, Default)]
pub struct ClassNames {
    forward: Vec<String>,
    by_name: HashMap<String, u32>,
}

impl ClassNames {
    pub fn intern(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = self.forward.len() as u32;
        self.forward.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.forward.get(id as usize).map(String::as_str)
    }

    pub fn id(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.forward.iter().enumerate().map(|(i, n)| (i as u32, n.as_str()))
    }
}

/// Per-document (or per-class) metadata entry.
#[derive(Debug, Clone)]
pub struct CDoc {
    pub tag: Tag,
    pub class: u32,
    /// Additional class ids beyond `class`, from list-file mode (`cis[]`).
    pub extra_classes: Vec<u32>,
    /// Negative means the document is logically deleted (§4.10).
    pub word_count: i64,
    pub filename: String,
    pub normalizer: f64,
    pub prior: f64,
    /// Soft posterior over classes, maintained by EM (C11). `None` until an
    /// EM run initializes it.
    pub class_probs: Option<Vec<f64>>,
}

impl CDoc {
    pub fn new(filename: impl Into<String>, class: u32) -> Self {
        CDoc {
            tag: Tag::Untagged,
            class,
            extra_classes: Vec::new(),
            word_count: 0,
            filename: filename.into(),
            normalizer: 1.0,
            prior: 0.0,
            class_probs: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.word_count < 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrelKind {
    Document,
    Class,
}

/// Pairs a `cdocs` array with an inverted index; either a *document* barrel
/// (one entry per document) or a *class* barrel (one entry per class, with
/// `cdocs[ci].class == ci`).
pub struct Barrel {
    pub kind: BarrelKind,
    pub cdocs: Vec<CDoc>,
    pub index: InvertedIndex,
    pub classes: Option<ClassNames>,
}

impl Barrel {
    pub fn new_document_barrel(classes: ClassNames) -> Self {
        Barrel { kind: BarrelKind::Document, cdocs: Vec::new(), index: InvertedIndex::new(), classes: Some(classes) }
    }

    pub fn push_document(&mut self, cdoc: CDoc) -> u32 {
        debug_assert_eq!(self.kind, BarrelKind::Document);
        if let Some(classes) = &self.classes {
            crate::contracts::check_class_in_range(cdoc.class, classes.len());
        }
        let id = self.cdocs.len() as u32;
        self.cdocs.push(cdoc);
        id
    }

    pub fn num_classes(&self) -> usize {
        self.classes.as_ref().map(ClassNames::len).unwrap_or(0)
    }

    pub fn docs_with_tag(&self, tag: Tag) -> impl Iterator<Item = (u32, &CDoc)> {
        self.cdocs
            .iter()
            .enumerate()
            .filter(move |(_, d)| d.tag == tag)
            .map(|(i, d)| (i as u32, d))
    }
}
