//! Query-server line protocol (§6): commands start with `,` (post-fork) or
//! `;` (pre-fork); any other non-empty line is a retrieval query. Kept as a
//! pure `handle_line` state machine, independent of any actual socket
//! plumbing, so the protocol is unit-testable without a listener.

use crate::barrel::Barrel;
use crate::query::{run_query, ScoringMode};
use crate::session::Session;

pub enum Command {
    SetHits(usize),
    Index(String),
    Delete(String),
    Archive,
    Quit,
    Query(String),
}

pub fn parse_line(line: &str) -> Option<Command> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return None;
    }
    if let Some(rest) = line.strip_prefix(',') {
        let rest = rest.trim();
        if let Some(n) = rest.strip_prefix("HITS").map(str::trim) {
            return n.parse().ok().map(Command::SetHits);
        }
        return None;
    }
    if let Some(rest) = line.strip_prefix(';') {
        let rest = rest.trim();
        if let Some(path) = rest.strip_prefix("INDEX").map(str::trim) {
            return Some(Command::Index(path.to_string()));
        }
        if let Some(path) = rest.strip_prefix("DELETE").map(str::trim) {
            return Some(Command::Delete(path.to_string()));
        }
        if rest == "ARCHIVE" {
            return Some(Command::Archive);
        }
        if rest == "QUIT" {
            return Some(Command::Quit);
        }
        return None;
    }
    Some(Command::Query(line.to_string()))
}

/// Mutable per-connection state: the current hit-count limit and whether
/// the session has been told to quit (the caller drives actual socket
/// shutdown; this only tracks protocol state).
pub struct QuerySession {
    pub num_hits: usize,
    pub scoring_mode: ScoringMode,
    pub max_query_atoms: usize,
    pub should_quit: bool,
    pub pending_deletes: Vec<String>,
    pub pending_indexes: Vec<String>,
}

impl QuerySession {
    pub fn new(default_hits: usize, scoring_mode: ScoringMode, max_query_atoms: usize) -> Self {
        QuerySession {
            num_hits: default_hits,
            scoring_mode,
            max_query_atoms,
            should_quit: false,
            pending_deletes: Vec::new(),
            pending_indexes: Vec::new(),
        }
    }

    /// Processes one input line against `session`/`barrel`, returning the
    /// text to write back to the client (empty string for commands that
    /// produce no response).
    pub fn handle_line(&mut self, session: &Session, barrel: &Barrel, line: &str) -> String {
        match parse_line(line) {
            None => String::new(),
            Some(Command::SetHits(n)) => {
                self.num_hits = n;
                String::new()
            }
            Some(Command::Index(path)) => {
                self.pending_indexes.push(path);
                String::new()
            }
            Some(Command::Delete(path)) => {
                self.pending_deletes.push(path);
                String::new()
            }
            Some(Command::Archive) => String::new(),
            Some(Command::Quit) => {
                self.should_quit = true;
                String::new()
            }
            Some(Command::Query(q)) => self.render_query_response(session, barrel, &q),
        }
    }

    fn render_query_response(&self, session: &Session, barrel: &Barrel, query_text: &str) -> String {
        let (hits, _truncated) = run_query(session, barrel, query_text, self.max_query_atoms, self.scoring_mode);
        let mut out = String::new();
        let shown: Vec<_> = hits.into_iter().take(self.num_hits).collect();
        out.push_str(&format!(",HITCOUNT {}\n", shown.len()));
        for hit in shown {
            let filename = barrel.cdocs.get(hit.doc as usize).map(|c| c.filename.as_str()).unwrap_or("");
            out.push_str(&format!("{} {} {}\n", filename, hit.score, hit.matching_words.join(",")));
        }
        out.push_str(".\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrel::{CDoc, ClassNames};
    use crate::config::SessionConfig;

    fn session_with_one_doc() -> (Session, Barrel) {
        let mut session = Session::new(SessionConfig::default());
        let mut barrel = Barrel::new_document_barrel(ClassNames::default());
        let ids = session.lex_and_intern("alpha beta");
        for (pos, id) in ids.iter().enumerate() {
            session.pv_add_pair(*id, 0, pos as u32).unwrap();
        }
        session.flush_all().unwrap();
        let mut cdoc = CDoc::new("doc0.txt", 0);
        cdoc.word_count = 2;
        barrel.push_document(cdoc);
        (session, barrel)
    }

    #[test]
    fn hits_command_changes_result_limit() {
        let mut qs = QuerySession::new(10, ScoringMode::Raw, 50);
        let (session, barrel) = session_with_one_doc();
        assert_eq!(qs.handle_line(&session, &barrel, ",HITS 1"), "");
        assert_eq!(qs.num_hits, 1);
    }

    #[test]
    fn quit_command_sets_flag_and_produces_no_output() {
        let mut qs = QuerySession::new(10, ScoringMode::Raw, 50);
        let (session, barrel) = session_with_one_doc();
        assert_eq!(qs.handle_line(&session, &barrel, ";QUIT"), "");
        assert!(qs.should_quit);
    }

    #[test]
    fn query_line_produces_hitcount_and_terminator() {
        let mut qs = QuerySession::new(10, ScoringMode::Raw, 50);
        let (session, barrel) = session_with_one_doc();
        let response = qs.handle_line(&session, &barrel, "alpha");
        assert!(response.starts_with(",HITCOUNT"));
        assert!(response.trim_end().ends_with('.'));
        assert!(response.contains("doc0.txt"));
    }

    #[test]
    fn index_and_delete_commands_queue_paths() {
        let mut qs = QuerySession::new(10, ScoringMode::Raw, 50);
        let (session, barrel) = session_with_one_doc();
        qs.handle_line(&session, &barrel, ";INDEX /tmp/new.txt");
        qs.handle_line(&session, &barrel, ";DELETE /tmp/old.txt");
        assert_eq!(qs.pending_indexes, vec!["/tmp/new.txt"]);
        assert_eq!(qs.pending_deletes, vec!["/tmp/old.txt"]);
    }
}
