// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use crate::error::UploadError;
use crate::protocol::{COMMENT_PREFIX, DEFAULT_SUFFIX};

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Skipping lines until one contains the start marker
    Searching,
    Active,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Single { start: Option<String>, stop: Option<String> },
    Multi,
}

struct Source {
    path: PathBuf,
    reader: Box<dyn BufRead + Send>,
}

/// Source files being turned into the ordered lines of one upload
pub struct UploadJob {
    sources: Vec<Source>,
    index: usize,
    mode: Mode,
    phase: Phase,
    lines_sent: usize,
    buf: Vec<u8>,
}

// ============================================================================
// Construction
// ============================================================================

/// Append the default source suffix to paths given without an extension
pub fn with_default_suffix(path: &str) -> PathBuf {
    let mut path = PathBuf::from(path);
    if path.extension().is_none() {
        path.set_extension(DEFAULT_SUFFIX);
    }
    path
}

fn open_source(path: &Path) -> Result<Source, UploadError> {
    let file = File::open(path).map_err(|source| UploadError::Open { path: path.to_path_buf(), source })?;
    Ok(Source { path: path.to_path_buf(), reader: Box::new(BufReader::new(file)) })
}

fn marker(m: Option<&str>) -> Option<String> {
    m.filter(|s| !s.is_empty()).map(str::to_string)
}

/// Strip any trailing CR and LF bytes
pub fn trim_line_end(line: &[u8]) -> &[u8] {
    let end = line.iter().rposition(|&b| b != b'\r' && b != b'\n').map_or(0, |i| i + 1);
    &line[..end]
}

fn contains(line: &[u8], marker: &str) -> bool {
    let marker = marker.as_bytes();
    line.windows(marker.len()).any(|w| w == marker)
}

impl UploadJob {
    /// Upload one file, optionally from the first line containing `start`
    /// up to the line before the next one containing `stop`
    pub fn open_single(path: &Path, start: Option<&str>, stop: Option<&str>) -> Result<Self, UploadError> {
        let source = open_source(path)?;
        Ok(Self::new(vec![source], Mode::Single { start: marker(start), stop: marker(stop) }))
    }

    /// Upload several files back to back. The first file that cannot be
    /// opened cancels the whole batch.
    pub fn open_many(paths: &[PathBuf]) -> Result<Self, UploadError> {
        if paths.is_empty() {
            return Err(UploadError::NoFiles);
        }
        let sources = paths
            .iter()
            .map(|p| open_source(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(sources, Mode::Multi))
    }

    fn new(sources: Vec<Source>, mode: Mode) -> Self {
        let phase = match &mode {
            Mode::Single { start: Some(_), .. } => Phase::Searching,
            _ => Phase::Active,
        };
        let job = UploadJob { sources, index: 0, mode, phase, lines_sent: 0, buf: Vec::new() };
        info!(files = job.sources.len(), phase = ?job.phase, "upload started");
        job
    }

    #[cfg(test)]
    fn from_readers(readers: Vec<(&str, Box<dyn BufRead + Send>)>, single: Option<(Option<&str>, Option<&str>)>) -> Self {
        let sources = readers
            .into_iter()
            .map(|(name, reader)| Source { path: PathBuf::from(name), reader })
            .collect();
        let mode = match single {
            Some((start, stop)) => Mode::Single { start: marker(start), stop: marker(stop) },
            None => Mode::Multi,
        };
        Self::new(sources, mode)
    }
}

// ============================================================================
// Line Sequencing
// ============================================================================

impl UploadJob {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn lines_sent(&self) -> usize {
        self.lines_sent
    }

    /// (current file number, file count)
    pub fn progress(&self) -> (usize, usize) {
        ((self.index + 1).min(self.sources.len()), self.sources.len())
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.sources.get(self.index).map(|s| s.path.as_path())
    }

    /// Next line to transmit as raw file bytes, without its line
    /// terminator. `None` once every source is exhausted or the stop
    /// marker was reached.
    pub fn next_line(&mut self) -> Result<Option<Vec<u8>>, UploadError> {
        loop {
            if self.phase == Phase::Finished {
                return Ok(None);
            }

            let source = &mut self.sources[self.index];
            self.buf.clear();
            let n = source
                .reader
                .read_until(b'\n', &mut self.buf)
                .map_err(|e| UploadError::Read { path: source.path.clone(), source: e })?;

            if n == 0 {
                self.end_of_source();
                continue;
            }

            let line = trim_line_end(&self.buf);
            if line.starts_with(COMMENT_PREFIX.as_bytes()) {
                continue;
            }

            if let Mode::Single { start, stop } = &self.mode {
                if self.phase == Phase::Searching {
                    if !start.as_deref().is_some_and(|s| contains(line, s)) {
                        continue;
                    }
                    debug!("start marker found");
                    self.phase = Phase::Active;
                } else if stop.as_deref().is_some_and(|s| contains(line, s)) {
                    debug!("stop marker found");
                    self.finish();
                    return Ok(None);
                }
            }

            self.lines_sent += 1;
            return Ok(Some(line.to_vec()));
        }
    }

    fn end_of_source(&mut self) {
        if let Some(source) = self.sources.get(self.index) {
            debug!(file = %source.path.display(), "end of file");
        }
        self.index += 1;
        if self.mode != Mode::Multi || self.index >= self.sources.len() {
            self.finish();
        } else {
            let (n, total) = self.progress();
            info!(file = n, of = total, "next file");
        }
    }

    /// Close every source and mark the job finished
    pub fn finish(&mut self) {
        if self.phase != Phase::Finished {
            info!(lines = self.lines_sent, "upload finished");
        }
        self.phase = Phase::Finished;
        self.sources.clear();
        self.index = 0;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(text: &str) -> Box<dyn BufRead + Send> {
        Box::new(Cursor::new(text.as_bytes().to_vec()))
    }

    fn collect(job: &mut UploadJob) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = job.next_line().unwrap() {
            lines.push(String::from_utf8(line).unwrap());
        }
        assert_eq!(job.phase(), Phase::Finished);
        lines
    }

    const PROGRAM: &str = "\\ led blinker\nmarker -blink\n: on 1 portb mset ;\n: off 1 portb mclr ;\n\\ end\n: blink on off ;\n";

    #[test]
    fn test_comment_lines_never_sent() {
        let mut job = UploadJob::from_readers(vec![("a.fs", reader(PROGRAM))], Some((None, None)));
        let lines = collect(&mut job);
        assert!(lines.iter().all(|l| !l.starts_with("\\ ")));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_single_file_end_to_end() {
        let mut job = UploadJob::from_readers(
            vec![("foo.fs", reader("\\ comment line\n: foo 1 2 + . ;\n"))],
            Some((None, None)),
        );
        assert_eq!(job.phase(), Phase::Active);
        assert_eq!(job.next_line().unwrap().as_deref(), Some(b": foo 1 2 + . ;".as_slice()));
        assert_eq!(job.next_line().unwrap(), None);
        assert_eq!(job.phase(), Phase::Finished);
        assert_eq!(job.lines_sent(), 1);
    }

    #[test]
    fn test_start_and_stop_markers() {
        let text = "a\nstart here\nb\nc\nstop here\nd\n";
        let mut job = UploadJob::from_readers(vec![("m.fs", reader(text))], Some((Some("start"), Some("stop"))));
        assert_eq!(job.phase(), Phase::Searching);
        assert_eq!(collect(&mut job), vec!["start here", "b", "c"]);
    }

    #[test]
    fn test_empty_markers_cover_whole_file() {
        let text = "a\nb\nc\n";
        let mut job = UploadJob::from_readers(vec![("m.fs", reader(text))], Some((Some(""), Some(""))));
        assert_eq!(job.phase(), Phase::Active);
        assert_eq!(collect(&mut job), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_stop_marker_without_start() {
        let text = "a\nb\nEND\nc\n";
        let mut job = UploadJob::from_readers(vec![("m.fs", reader(text))], Some((None, Some("END"))));
        assert_eq!(collect(&mut job), vec!["a", "b"]);
    }

    #[test]
    fn test_start_line_is_not_checked_for_stop() {
        let text = "x\nbegin..end\ny\nend\nz\n";
        let mut job = UploadJob::from_readers(vec![("m.fs", reader(text))], Some((Some("begin"), Some("end"))));
        assert_eq!(collect(&mut job), vec!["begin..end", "y"]);
    }

    #[test]
    fn test_commented_marker_does_not_start() {
        let text = "\\ start\nskipped\nstart\nsent\n";
        let mut job = UploadJob::from_readers(vec![("m.fs", reader(text))], Some((Some("start"), None)));
        assert_eq!(collect(&mut job), vec!["start", "sent"]);
    }

    #[test]
    fn test_missing_start_marker_sends_nothing() {
        let mut job = UploadJob::from_readers(vec![("m.fs", reader("a\nb\n"))], Some((Some("nowhere"), None)));
        assert!(collect(&mut job).is_empty());
    }

    #[test]
    fn test_line_endings_stripped_and_blank_lines_kept() {
        let text = "one\r\n\r\ntwo\r\r\nlast";
        let mut job = UploadJob::from_readers(vec![("m.fs", reader(text))], Some((None, None)));
        assert_eq!(collect(&mut job), vec!["one", "", "two", "last"]);
    }

    #[test]
    fn test_non_utf8_bytes_pass_through() {
        let text: &[u8] = b"\\ \xb0C note\n22 constant t\xb0C\r\n\xff\n";
        let mut job = UploadJob::from_readers(
            vec![("latin1.fs", Box::new(Cursor::new(text.to_vec())))],
            Some((None, None)),
        );
        assert_eq!(job.next_line().unwrap().as_deref(), Some(b"22 constant t\xb0C".as_slice()));
        assert_eq!(job.next_line().unwrap().as_deref(), Some(b"\xff".as_slice()));
        assert_eq!(job.next_line().unwrap(), None);
    }

    #[test]
    fn test_markers_found_next_to_non_utf8_bytes() {
        let text: &[u8] = b"skip\n\xb0start\nkeep \xe9\n\xb0stop\nafter\n";
        let mut job = UploadJob::from_readers(
            vec![("m.fs", Box::new(Cursor::new(text.to_vec())))],
            Some((Some("start"), Some("stop"))),
        );
        assert_eq!(job.next_line().unwrap().as_deref(), Some(b"\xb0start".as_slice()));
        assert_eq!(job.next_line().unwrap().as_deref(), Some(b"keep \xe9".as_slice()));
        assert_eq!(job.next_line().unwrap(), None);
    }

    #[test]
    fn test_trim_line_end() {
        assert_eq!(trim_line_end(b"a b\r\n"), b"a b");
        assert_eq!(trim_line_end(b"x\r\r\n"), b"x");
        assert_eq!(trim_line_end(b"\r\n"), b"");
        assert_eq!(trim_line_end(b""), b"");
    }

    #[test]
    fn test_multi_file_concatenates_in_order() {
        let mut job = UploadJob::from_readers(
            vec![
                ("a.fs", reader("a1\n\\ note\na2\n")),
                ("b.fs", reader("")),
                ("c.fs", reader("c1\nc2\n")),
            ],
            None,
        );
        assert_eq!(job.progress(), (1, 3));
        assert_eq!(collect(&mut job), vec!["a1", "a2", "c1", "c2"]);
        assert_eq!(job.current_path(), None);
    }

    #[test]
    fn test_multi_file_ignores_markers() {
        let mut job = UploadJob::from_readers(vec![("a.fs", reader("stop\nstart\n"))], None);
        assert_eq!(collect(&mut job), vec!["stop", "start"]);
    }

    #[test]
    fn test_finish_closes_sources() {
        let mut job = UploadJob::from_readers(vec![("a.fs", reader("a\n")), ("b.fs", reader("b\n"))], None);
        job.finish();
        assert_eq!(job.next_line().unwrap(), None);
        assert_eq!(job.progress(), (0, 0));
    }

    #[test]
    fn test_default_suffix() {
        assert_eq!(with_default_suffix("blink"), PathBuf::from("blink.fs"));
        assert_eq!(with_default_suffix("lib/math"), PathBuf::from("lib/math.fs"));
        assert_eq!(with_default_suffix("blink.txt"), PathBuf::from("blink.txt"));
        assert_eq!(with_default_suffix("core.fs"), PathBuf::from("core.fs"));
    }

    #[test]
    fn test_open_files_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.fs");
        let b = dir.path().join("b.fs");
        std::fs::write(&a, "1 2 +\n").unwrap();
        std::fs::write(&b, "3 4 *\n").unwrap();

        let mut job = UploadJob::open_many(&[a.clone(), b]).unwrap();
        assert_eq!(job.current_path(), Some(a.as_path()));
        assert_eq!(collect(&mut job), vec!["1 2 +", "3 4 *"]);

        let mut job = UploadJob::open_single(&a, None, None).unwrap();
        assert_eq!(collect(&mut job), vec!["1 2 +"]);
    }

    #[test]
    fn test_open_failure_cancels_batch() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.fs");
        std::fs::write(&present, "words\n").unwrap();
        let missing = dir.path().join("missing.fs");

        match UploadJob::open_many(&[missing.clone(), present]) {
            Err(UploadError::Open { path, .. }) => assert_eq!(path, missing),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("batch started with a missing file"),
        }
        assert!(matches!(UploadJob::open_many(&[]), Err(UploadError::NoFiles)));
        assert!(matches!(UploadJob::open_single(&missing, None, None), Err(UploadError::Open { .. })));
    }
}
