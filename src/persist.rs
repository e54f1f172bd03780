//! On-disk data directory (§6): `vocabulary` (dictionary), `wi2pv`/`barrel`
//! (per-document metadata + WI2DVF), and `pv` (raw PV segments, prefixed
//! with a small term → segment-chain-head table since a position vector's
//! read cursor needs that anchor reconstructed after a reload — the
//! original keeps it in the in-core `word` struct, which we don't have).

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::barrel::{Barrel, BarrelKind, CDoc, ClassNames, Tag};
use crate::dictionary::{Dictionary, TermId};
use crate::pv::PvStore;
use crate::session::Session;

const WI2PV_VERSION: u8 = 1;

fn write_string<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    w.write_all(&(s.len() as u32).to_be_bytes())?;
    w.write_all(s.as_bytes())
}

fn read_string<R: Read>(r: &mut R) -> io::Result<String> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "non-utf8 string"))
}

fn tag_to_u8(tag: Tag) -> u8 {
    match tag {
        Tag::Train => 0,
        Tag::Test => 1,
        Tag::Unlabeled => 2,
        Tag::Validation => 3,
        Tag::Ignore => 4,
        Tag::Untagged => 5,
        Tag::Pool => 6,
        Tag::Waiting => 7,
    }
}

fn u8_to_tag(b: u8) -> io::Result<Tag> {
    Ok(match b {
        0 => Tag::Train,
        1 => Tag::Test,
        2 => Tag::Unlabeled,
        3 => Tag::Validation,
        4 => Tag::Ignore,
        5 => Tag::Untagged,
        6 => Tag::Pool,
        7 => Tag::Waiting,
        _ => return Err(io::Error::new(io::ErrorKind::InvalidData, "bad tag byte")),
    })
}

/// Writes the `wi2pv`/`barrel` file: version byte, kind byte, smoothing
/// method name, per-document metadata array, the class-name dictionary (if
/// any), then the WI2DVF payload.
pub fn save_barrel<W: Write>(barrel: &Barrel, method_name: &str, mut w: W) -> io::Result<()> {
    w.write_all(&[WI2PV_VERSION])?;
    w.write_all(&[match barrel.kind {
        BarrelKind::Document => 0,
        BarrelKind::Class => 1,
    }])?;
    write_string(&mut w, method_name)?;

    w.write_all(&(barrel.cdocs.len() as u32).to_be_bytes())?;
    for cdoc in &barrel.cdocs {
        w.write_all(&[tag_to_u8(cdoc.tag)])?;
        w.write_all(&cdoc.normalizer.to_be_bytes())?;
        w.write_all(&cdoc.prior.to_be_bytes())?;
        w.write_all(&cdoc.word_count.to_be_bytes())?;
        write_string(&mut w, &cdoc.filename)?;
        w.write_all(&cdoc.class.to_be_bytes())?;
        w.write_all(&(cdoc.extra_classes.len() as u32).to_be_bytes())?;
        for &c in &cdoc.extra_classes {
            w.write_all(&c.to_be_bytes())?;
        }
    }

    match &barrel.classes {
        Some(classes) => {
            w.write_all(&[1])?;
            w.write_all(&(classes.len() as u32).to_be_bytes())?;
            for (_, name) in classes.iter() {
                write_string(&mut w, name)?;
            }
        }
        None => w.write_all(&[0])?,
    }

    barrel.index.write_to(&mut w)
}

pub fn load_barrel<R: Read>(mut r: R) -> io::Result<(Barrel, String)> {
    let mut version = [0u8; 1];
    r.read_exact(&mut version)?;
    if version[0] != WI2PV_VERSION {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "unsupported wi2pv version"));
    }
    let mut kind_byte = [0u8; 1];
    r.read_exact(&mut kind_byte)?;
    let kind = match kind_byte[0] {
        0 => BarrelKind::Document,
        1 => BarrelKind::Class,
        _ => return Err(io::Error::new(io::ErrorKind::InvalidData, "bad barrel kind byte")),
    };
    let method_name = read_string(&mut r)?;

    let mut count_buf = [0u8; 4];
    r.read_exact(&mut count_buf)?;
    let count = u32::from_be_bytes(count_buf) as usize;
    let mut cdocs = Vec::with_capacity(count);
    for _ in 0..count {
        let mut tag_byte = [0u8; 1];
        r.read_exact(&mut tag_byte)?;
        let tag = u8_to_tag(tag_byte[0])?;
        let mut f8 = [0u8; 8];
        r.read_exact(&mut f8)?;
        let normalizer = f64::from_be_bytes(f8);
        r.read_exact(&mut f8)?;
        let prior = f64::from_be_bytes(f8);
        r.read_exact(&mut f8)?;
        let word_count = i64::from_be_bytes(f8);
        let filename = read_string(&mut r)?;
        let mut class_buf = [0u8; 4];
        r.read_exact(&mut class_buf)?;
        let class = u32::from_be_bytes(class_buf);
        let mut extra_len_buf = [0u8; 4];
        r.read_exact(&mut extra_len_buf)?;
        let extra_len = u32::from_be_bytes(extra_len_buf) as usize;
        let mut extra_classes = Vec::with_capacity(extra_len);
        for _ in 0..extra_len {
            r.read_exact(&mut class_buf)?;
            extra_classes.push(u32::from_be_bytes(class_buf));
        }
        let mut cdoc = CDoc::new(filename, class);
        cdoc.tag = tag;
        cdoc.normalizer = normalizer;
        cdoc.prior = prior;
        cdoc.word_count = word_count;
        cdoc.extra_classes = extra_classes;
        cdocs.push(cdoc);
    }

    let mut has_classes = [0u8; 1];
    r.read_exact(&mut has_classes)?;
    let classes = if has_classes[0] == 1 {
        let mut n_buf = [0u8; 4];
        r.read_exact(&mut n_buf)?;
        let n = u32::from_be_bytes(n_buf);
        let mut classes = ClassNames::default();
        for _ in 0..n {
            classes.intern(&read_string(&mut r)?);
        }
        Some(classes)
    } else {
        None
    };

    let index = crate::wi2dvf::InvertedIndex::read_from(&mut r)?;
    Ok((Barrel { kind, cdocs, index, classes }, method_name))
}

/// Writes the `pv` file: a `term_id → first-segment-offset` anchor table,
/// then the raw segment bytes.
pub fn save_pv<W: Write>(session: &Session, store: &PvStore, mut w: W) -> io::Result<()> {
    let anchors: Vec<(u32, i64)> = session
        .pv_first_segments()
        .map(|(term, offset)| (term.0, offset.map(|o| o as i64).unwrap_or(-1)))
        .collect();
    w.write_all(&(anchors.len() as u32).to_be_bytes())?;
    for (term, offset) in anchors {
        w.write_all(&term.to_be_bytes())?;
        w.write_all(&offset.to_be_bytes())?;
    }
    w.write_all(store.as_bytes())
}

pub fn load_pv<R: Read>(mut r: R) -> io::Result<(PvStore, HashMap<TermId, Option<u64>>)> {
    let mut n_buf = [0u8; 4];
    r.read_exact(&mut n_buf)?;
    let n = u32::from_be_bytes(n_buf) as usize;
    let mut anchors = HashMap::with_capacity(n);
    for _ in 0..n {
        let mut term_buf = [0u8; 4];
        r.read_exact(&mut term_buf)?;
        let term = u32::from_be_bytes(term_buf);
        let mut off_buf = [0u8; 8];
        r.read_exact(&mut off_buf)?;
        let offset = i64::from_be_bytes(off_buf);
        anchors.insert(TermId(term), if offset < 0 { None } else { Some(offset as u64) });
    }
    let mut raw = Vec::new();
    r.read_to_end(&mut raw)?;
    Ok((PvStore::from_bytes(raw), anchors))
}

/// Saves the whole data directory: `vocabulary`, `barrel`, and `pv`. Flushes
/// every in-memory PV buffer first (§5: segments must be on disk before the
/// anchor table is written).
pub fn save_data_dir(dir: &Path, session: &mut Session, barrel: &Barrel, method_name: &str) -> io::Result<()> {
    session.flush_all()?;
    std::fs::create_dir_all(dir)?;
    session.dictionary.write_to(BufWriter::new(File::create(dir.join("vocabulary"))?))?;
    save_barrel(barrel, method_name, BufWriter::new(File::create(dir.join("barrel"))?))?;
    save_pv(session, &session.pv_store, BufWriter::new(File::create(dir.join("pv"))?))?;
    Ok(())
}

/// Loads a data directory back into a fresh `Session` (admitting no new
/// terms) and its barrel.
pub fn load_data_dir(dir: &Path, config: crate::config::SessionConfig) -> io::Result<(Session, Barrel, String)> {
    let dictionary = Dictionary::read_from(BufReader::new(File::open(dir.join("vocabulary"))?))?;
    let (barrel, method_name) = load_barrel(BufReader::new(File::open(dir.join("barrel"))?))?;
    let (store, anchors) = load_pv(BufReader::new(File::open(dir.join("pv"))?))?;

    let mut session = Session::new(config);
    session.dictionary = dictionary;
    session.dictionary.freeze();
    session.pv_store = store;
    session.restore_pvs(anchors);
    Ok((session, barrel, method_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;

    #[test]
    fn data_directory_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = Session::new(SessionConfig::default());
        let mut barrel = Barrel::new_document_barrel(ClassNames::default());
        let mut classes = ClassNames::default();
        classes.intern("alpha");
        barrel.classes = Some(classes);

        let ids = session.lex_and_intern("alpha beta alpha");
        for (pos, id) in ids.iter().enumerate() {
            session.pv_add_pair(*id, 0, pos as u32).unwrap();
            barrel.index.add(*id, 0, 1, 1.0);
        }
        let mut cdoc = CDoc::new("doc0", 0);
        cdoc.word_count = 3;
        barrel.push_document(cdoc);

        save_data_dir(tmp.path(), &mut session, &barrel, "laplace").unwrap();
        let (loaded_session, loaded_barrel, method_name) = load_data_dir(tmp.path(), SessionConfig::default()).unwrap();

        assert_eq!(method_name, "laplace");
        assert_eq!(loaded_barrel.cdocs.len(), 1);
        assert_eq!(loaded_barrel.cdocs[0].filename, "doc0");
        assert!(loaded_session.dictionary.is_frozen());
        let alpha_id = loaded_session.dictionary.lookup("alpha").unwrap();
        let pv = loaded_session.pv(alpha_id).unwrap();
        let mut cursor = pv.clone();
        cursor.rewind();
        let mut seen = Vec::new();
        while let Some(p) = cursor.next(&loaded_session.pv_store).unwrap() {
            seen.push(p);
        }
        assert_eq!(seen, vec![(0, 0), (0, 2)]);
    }
}
