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

//! Shell directives typed on the interactive prompt

use std::path::PathBuf;
use crate::upload::with_default_suffix;

pub const ABORT: &str = "#abort";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `#send file [start] [stop]`
    Send { path: PathBuf, start: Option<String>, stop: Option<String> },
    /// `#sendm file1 file2,file3 ...`
    SendMany(Vec<PathBuf>),
    /// `#warm`
    Warm,
    /// `##`
    Escape,
    /// `#abort`
    Abort,
}

impl Directive {
    /// `None` for anything that is not exactly a directive. FlashForth
    /// uses `#` for decimal literals and words like `#s`, so those lines
    /// belong to the device.
    pub fn parse(line: &str) -> Option<Directive> {
        let mut args = line.split_whitespace();
        let cmd = args.next()?;
        let rest: Vec<&str> = args.collect();

        let directive = match (cmd, rest.as_slice()) {
            // Words after the stop marker are ignored
            ("#send", [path, markers @ ..]) => Directive::Send {
                path: with_default_suffix(path),
                start: markers.first().map(|s| s.to_string()),
                stop: markers.get(1).map(|s| s.to_string()),
            },
            ("#sendm", files) if !files.is_empty() => Directive::SendMany(
                files
                    .iter()
                    .flat_map(|f| f.split(','))
                    .filter(|f| !f.is_empty())
                    .map(with_default_suffix)
                    .collect(),
            ),
            ("#warm", []) => Directive::Warm,
            ("##", []) => Directive::Escape,
            (ABORT, []) => Directive::Abort,
            _ => return None,
        };
        Some(directive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_text_is_not_a_directive() {
        assert_eq!(Directive::parse(": sq dup * ;"), None);
        assert_eq!(Directive::parse(""), None);
        assert_eq!(Directive::parse("   "), None);
    }

    #[test]
    fn test_send() {
        assert_eq!(
            Directive::parse("#send blink"),
            Some(Directive::Send { path: PathBuf::from("blink.fs"), start: None, stop: None })
        );
        assert_eq!(
            Directive::parse("#send lib.txt -init ;end"),
            Some(Directive::Send {
                path: PathBuf::from("lib.txt"),
                start: Some("-init".to_string()),
                stop: Some(";end".to_string()),
            })
        );
        assert_eq!(Directive::parse("#send"), None);
    }

    #[test]
    fn test_send_ignores_words_after_stop_marker() {
        assert_eq!(
            Directive::parse("#send a b c d e"),
            Some(Directive::Send {
                path: PathBuf::from("a.fs"),
                start: Some("b".to_string()),
                stop: Some("c".to_string()),
            })
        );
    }

    #[test]
    fn test_sendm_accepts_commas_and_spaces() {
        assert_eq!(
            Directive::parse("#sendm a,b c.fs"),
            Some(Directive::SendMany(vec![
                PathBuf::from("a.fs"),
                PathBuf::from("b.fs"),
                PathBuf::from("c.fs"),
            ]))
        );
        assert_eq!(Directive::parse("#sendm"), None);
    }

    #[test]
    fn test_control_directives() {
        assert_eq!(Directive::parse("#warm"), Some(Directive::Warm));
        assert_eq!(Directive::parse("##"), Some(Directive::Escape));
        assert_eq!(Directive::parse(" #abort "), Some(Directive::Abort));
        assert_eq!(Directive::parse("#warm now"), None);
    }

    #[test]
    fn test_forth_number_prefix_is_program_text() {
        assert_eq!(Directive::parse("#100 ms"), None);
        assert_eq!(Directive::parse("#10 emit"), None);
        assert_eq!(Directive::parse("0 <# #s #> type"), None);
        assert_eq!(Directive::parse("#s"), None);
        assert_eq!(Directive::parse("#ls /tmp"), None);
    }
}
