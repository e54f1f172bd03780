//! Barrel construction from the filesystem (C4 §4.4): a directory tree of
//! per-class subdirectories, or a list file naming `filepath class...`
//! lines. File IO and lexing are parallelized with `rayon` (behind the
//! `parallel` feature, `indicatif` for progress); interning into the shared
//! dictionary/PV/index stays single-threaded, per the session's
//! single-writer concurrency model (§5).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::barrel::{Barrel, CDoc, ClassNames, Tag};
use crate::dictionary::TermId;
use crate::lexer::looks_like_text;
use crate::session::Session;

struct RawDoc {
    class_name: String,
    path: PathBuf,
    content: String,
}

fn collect_class_files(root: &Path) -> Result<Vec<(String, PathBuf)>, String> {
    let mut out = Vec::new();
    let top = fs::read_dir(root).map_err(|e| format!("reading {}: {e}", root.display()))?;
    let mut class_dirs: Vec<PathBuf> = top
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    class_dirs.sort();
    for class_dir in class_dirs {
        let class_name = class_dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| format!("non-utf8 class directory name under {}", root.display()))?
            .to_string();
        let mut stack = vec![class_dir];
        while let Some(dir) = stack.pop() {
            let entries = fs::read_dir(&dir).map_err(|e| format!("reading {}: {e}", dir.display()))?;
            for entry in entries.filter_map(Result::ok) {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    out.push((class_name.clone(), path));
                }
            }
        }
    }
    Ok(out)
}

fn read_text_files(files: &[(String, PathBuf)]) -> Vec<Option<RawDoc>> {
    let read_one = |(class_name, path): &(String, PathBuf)| -> Option<RawDoc> {
        let bytes = fs::read(path).ok()?;
        if !looks_like_text(&bytes[..bytes.len().min(4096)]) {
            return None;
        }
        let content = String::from_utf8_lossy(&bytes).into_owned();
        Some(RawDoc { class_name: class_name.clone(), path: path.clone(), content })
    };

    #[cfg(feature = "parallel")]
    {
        use indicatif::{ProgressBar, ProgressStyle};
        use rayon::prelude::*;
        let bar = ProgressBar::new(files.len() as u64);
        if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} files lexed") {
            bar.set_style(style);
        }
        let out: Vec<Option<RawDoc>> = files
            .par_iter()
            .map(|f| {
                let doc = read_one(f);
                bar.inc(1);
                doc
            })
            .collect();
        bar.finish_and_clear();
        out
    }
    #[cfg(not(feature = "parallel"))]
    {
        files.iter().map(read_one).collect()
    }
}

/// Builds a document barrel from `root`'s immediate subdirectories (class
/// names) recursively. `prune_below` triggers the two-pass
/// prune-by-occurrence mode (§4.4): pass 1 only populates dictionary
/// occurrence counts, pass 2 rebuilds with the pruned, frozen vocabulary.
pub fn build_barrel_from_directory(
    session: &mut Session,
    root: &Path,
    prune_below: Option<u64>,
) -> Result<Barrel, String> {
    let files = collect_class_files(root)?;
    let mut seen_paths = std::collections::HashSet::new();
    for (_, path) in &files {
        if !seen_paths.insert(path.clone()) {
            return Err(format!("duplicate pathname during index: {}", path.display()));
        }
    }

    let docs: Vec<RawDoc> = read_text_files(&files).into_iter().flatten().collect();

    if let Some(min_count) = prune_below {
        for doc in &docs {
            let _ = session.lex_and_intern(&doc.content);
        }
        let (pruned, _remap) = session.dictionary.prune_below(min_count);
        session.dictionary = pruned;
        session.dictionary.freeze();
    }

    let mut classes = ClassNames::default();
    let mut barrel = Barrel::new_document_barrel(ClassNames::default());
    for doc in &docs {
        classes.intern(&doc.class_name);
    }
    barrel.classes = Some(classes);

    for doc in &docs {
        let class_id = barrel.classes.as_ref().unwrap().id(&doc.class_name).unwrap();
        let doc_id = barrel.cdocs.len() as u32;
        let mut cdoc = CDoc::new(doc.path.display().to_string(), class_id);
        cdoc.tag = Tag::Train;

        let ids = session.lex_and_intern(&doc.content);
        let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
        let mut word_count = 0i64;
        for (pos, id) in ids.iter().enumerate() {
            if id.is_unknown() {
                continue;
            }
            session
                .pv_add_pair(*id, doc_id, pos as u32)
                .map_err(|e| format!("writing postings for {}: {e}", doc.path.display()))?;
            *counts.entry(id.0).or_insert(0) += 1;
            word_count += 1;
        }
        for (term, count) in counts {
            barrel.index.add(TermId(term), doc_id, count, count as f64);
        }
        cdoc.word_count = word_count;
        barrel.push_document(cdoc);
    }

    Ok(barrel)
}

/// Builds a document barrel from a list file: one line per document,
/// `filepath class1 class2 …`. The primary class is drawn uniformly at
/// random from the classes named on each line; the rest attach as
/// `extra_classes`.
pub fn build_barrel_from_list_file<R: Rng>(
    session: &mut Session,
    rng: &mut R,
    path: &Path,
) -> Result<Barrel, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
    let mut classes = ClassNames::default();
    let mut barrel = Barrel::new_document_barrel(ClassNames::default());

    struct Line {
        filepath: String,
        class_ids: Vec<u32>,
    }
    let mut lines_parsed = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let filepath = parts.next().ok_or_else(|| format!("empty line in {}", path.display()))?.to_string();
        let class_ids: Vec<u32> = parts.map(|c| classes.intern(c)).collect();
        if class_ids.is_empty() {
            return Err(format!("list file line for {filepath} names no class"));
        }
        lines_parsed.push(Line { filepath, class_ids });
    }
    barrel.classes = Some(classes);

    for line in lines_parsed {
        let primary_idx = rng.gen_range(0..line.class_ids.len());
        let primary = line.class_ids[primary_idx];
        let extra: Vec<u32> = line
            .class_ids
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != primary_idx)
            .map(|(_, c)| *c)
            .collect();

        let doc_id = barrel.cdocs.len() as u32;
        let content = fs::read_to_string(&line.filepath).map_err(|e| format!("reading {}: {e}", line.filepath))?;
        let mut cdoc = CDoc::new(line.filepath.clone(), primary);
        cdoc.extra_classes = extra;
        cdoc.tag = Tag::Train;

        let ids = session.lex_and_intern(&content);
        let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
        let mut word_count = 0i64;
        for (pos, id) in ids.iter().enumerate() {
            if id.is_unknown() {
                continue;
            }
            session
                .pv_add_pair(*id, doc_id, pos as u32)
                .map_err(|e| format!("writing postings for {}: {e}", line.filepath))?;
            *counts.entry(id.0).or_insert(0) += 1;
            word_count += 1;
        }
        for (term, count) in counts {
            barrel.index.add(TermId(term), doc_id, count, count as f64);
        }
        cdoc.word_count = word_count;
        barrel.push_document(cdoc);
    }

    Ok(barrel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let p = dir.join(name);
        let mut f = fs::File::create(&p).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        p
    }

    #[test]
    fn builds_barrel_from_two_class_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let class_a = tmp.path().join("alpha");
        let class_b = tmp.path().join("beta");
        fs::create_dir(&class_a).unwrap();
        fs::create_dir(&class_b).unwrap();
        write_file(&class_a, "d0.txt", "alpha beta gamma");
        write_file(&class_b, "d1.txt", "beta gamma delta");

        let mut session = Session::new(SessionConfig::default());
        let barrel = build_barrel_from_directory(&mut session, tmp.path(), None).unwrap();
        assert_eq!(barrel.cdocs.len(), 2);
        assert_eq!(barrel.num_classes(), 2);
    }

    #[test]
    fn duplicate_pathnames_are_fatal() {
        let files = vec![
            ("a".to_string(), PathBuf::from("/tmp/x")),
            ("b".to_string(), PathBuf::from("/tmp/x")),
        ];
        let mut seen = std::collections::HashSet::new();
        let mut dup = false;
        for (_, p) in &files {
            if !seen.insert(p.clone()) {
                dup = true;
            }
        }
        assert!(dup);
    }
}
