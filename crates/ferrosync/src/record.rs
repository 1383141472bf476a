//! Line-oriented tokenizer for the synctex text stream.
//!
//! Every record occupies one line. Content records start with a
//! single-character sigil followed by colon/comma-packed integer fields;
//! preamble and postamble records are `Key:value` lines. The lexer is a
//! lazy forward-only iterator yielding `(byte_offset, Record)` pairs and
//! knows nothing about sections or nesting; that is the builder's job.

use crate::error::Error;
use crate::num::{IntPolicy, parse_int_with};

/// Source link carried by every content record: owning tag, line, and an
/// optional column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub tag: i32,
    pub line: i32,
    pub column: Option<i32>,
}

/// A point in the enclosing box's coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub h: i32,
    pub v: i32,
}

/// Box dimensions, local to the record that carries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub width: i32,
    pub height: i32,
    pub depth: i32,
}

/// `tag,line[,col]:h,v`: the shape of glue, kerns, math and anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafSpec {
    pub link: Link,
    pub point: Point,
}

/// `tag,line[,col]:h,v:w,ht,dp`: the shape of box records and rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxSpec {
    pub link: Link,
    pub point: Point,
    pub extent: Extent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Version(i32),
    Input { tag: i32, path: String },
    Output(String),
    Magnification(i32),
    Unit(i32),
    XOffset(i32),
    YOffset(i32),
    Content,
    SheetBegin { page: i32 },
    SheetEnd { page: i32 },
    VBoxBegin(BoxSpec),
    VBoxEnd,
    HBoxBegin(BoxSpec),
    HBoxEnd,
    VoidVBox(BoxSpec),
    VoidHBox(BoxSpec),
    Glue(LeafSpec),
    Kern { leaf: LeafSpec, width: i32 },
    Math(LeafSpec),
    Anchor(LeafSpec),
    Rule { spec: BoxSpec, payload: Option<String> },
    Text { leaf: LeafSpec, payload: String },
    /// `!<n>` byte-count anchor, informational only.
    ByteCount(i32),
    Postamble,
    Count(i32),
    PostScriptum,
}

/// Tokenizes a decoded synctex stream.
pub struct RecordLexer<'a> {
    input: &'a str,
    offset: usize,
    policy: IntPolicy,
}

impl<'a> RecordLexer<'a> {
    pub fn new(input: &'a str, policy: IntPolicy) -> Self {
        Self {
            input,
            offset: 0,
            policy,
        }
    }

    fn malformed(&self, offset: usize, reason: &str) -> Error {
        Error::Malformed {
            offset,
            reason: reason.to_string(),
        }
    }

    fn int<'b>(&self, rest: &'b str) -> Option<(i32, &'b str)> {
        let (value, after) = parse_int_with(rest, self.policy);
        if after.len() == rest.len() {
            None
        } else {
            Some((value, after))
        }
    }

    /// `tag,line[,col]` up to the next `:`.
    fn link<'b>(&self, rest: &'b str) -> Option<(Link, &'b str)> {
        let (tag, rest) = self.int(rest)?;
        let rest = rest.strip_prefix(',')?;
        let (line, rest) = self.int(rest)?;
        let (column, rest) = match rest.strip_prefix(',') {
            Some(after) => {
                let (column, rest) = self.int(after)?;
                (Some(column), rest)
            }
            None => (None, rest),
        };
        Some((Link { tag, line, column }, rest))
    }

    fn point<'b>(&self, rest: &'b str) -> Option<(Point, &'b str)> {
        let (h, rest) = self.int(rest)?;
        let rest = rest.strip_prefix(',')?;
        let (v, rest) = self.int(rest)?;
        Some((Point { h, v }, rest))
    }

    fn extent<'b>(&self, rest: &'b str) -> Option<(Extent, &'b str)> {
        let (width, rest) = self.int(rest)?;
        let rest = rest.strip_prefix(',')?;
        let (height, rest) = self.int(rest)?;
        let rest = rest.strip_prefix(',')?;
        let (depth, rest) = self.int(rest)?;
        Some((Extent {
            width,
            height,
            depth,
        }, rest))
    }

    fn leaf_spec<'b>(&self, rest: &'b str) -> Option<(LeafSpec, &'b str)> {
        let (link, rest) = self.link(rest)?;
        let rest = rest.strip_prefix(':')?;
        let (point, rest) = self.point(rest)?;
        Some((LeafSpec { link, point }, rest))
    }

    fn box_spec<'b>(&self, rest: &'b str) -> Option<(BoxSpec, &'b str)> {
        let (leaf, rest) = self.leaf_spec(rest)?;
        let rest = rest.strip_prefix(':')?;
        let (extent, rest) = self.extent(rest)?;
        Some((BoxSpec {
            link: leaf.link,
            point: leaf.point,
            extent,
        }, rest))
    }

    /// A field list must be fully consumed; trailing junk is malformed.
    fn finish(&self, offset: usize, record: Record, rest: &str) -> Result<Record, Error> {
        if rest.is_empty() {
            Ok(record)
        } else {
            Err(self.malformed(offset, "trailing characters after record fields"))
        }
    }

    fn lex_line(&self, offset: usize, line: &str) -> Result<Record, Error> {
        // Key:value lines first; `Input` may also appear mid-content.
        if let Some(rest) = line.strip_prefix("SyncTeX Version:") {
            let (version, rest) = self
                .int(rest)
                .ok_or_else(|| self.malformed(offset, "bad version number"))?;
            return self.finish(offset, Record::Version(version), rest);
        }
        if let Some(rest) = line.strip_prefix("Input:") {
            let (tag, rest) = self
                .int(rest)
                .ok_or_else(|| self.malformed(offset, "bad input tag"))?;
            let path = rest
                .strip_prefix(':')
                .ok_or_else(|| self.malformed(offset, "missing path in input record"))?;
            return Ok(Record::Input {
                tag,
                path: path.to_string(),
            });
        }
        if let Some(rest) = line.strip_prefix("Output:") {
            return Ok(Record::Output(rest.to_string()));
        }
        if let Some(rest) = line.strip_prefix("Magnification:") {
            let (value, rest) = self
                .int(rest)
                .ok_or_else(|| self.malformed(offset, "bad magnification"))?;
            return self.finish(offset, Record::Magnification(value), rest);
        }
        if let Some(rest) = line.strip_prefix("Unit:") {
            let (value, rest) = self
                .int(rest)
                .ok_or_else(|| self.malformed(offset, "bad unit"))?;
            return self.finish(offset, Record::Unit(value), rest);
        }
        if let Some(rest) = line.strip_prefix("X Offset:") {
            let (value, rest) = self
                .int(rest)
                .ok_or_else(|| self.malformed(offset, "bad x offset"))?;
            return self.finish(offset, Record::XOffset(value), rest);
        }
        if let Some(rest) = line.strip_prefix("Y Offset:") {
            let (value, rest) = self
                .int(rest)
                .ok_or_else(|| self.malformed(offset, "bad y offset"))?;
            return self.finish(offset, Record::YOffset(value), rest);
        }
        if line == "Content:" {
            return Ok(Record::Content);
        }
        if line == "Postamble:" {
            return Ok(Record::Postamble);
        }
        if let Some(rest) = line.strip_prefix("Count:") {
            let (value, rest) = self
                .int(rest)
                .ok_or_else(|| self.malformed(offset, "bad count"))?;
            return self.finish(offset, Record::Count(value), rest);
        }
        if line == "Post scriptum:" {
            return Ok(Record::PostScriptum);
        }

        let mut chars = line.chars();
        let sigil = chars
            .next()
            .ok_or_else(|| self.malformed(offset, "empty record"))?;
        let rest = chars.as_str();
        match sigil {
            '{' => {
                let (page, rest) = self
                    .int(rest)
                    .ok_or_else(|| self.malformed(offset, "bad sheet page"))?;
                self.finish(offset, Record::SheetBegin { page }, rest)
            }
            '}' => {
                let (page, rest) = self
                    .int(rest)
                    .ok_or_else(|| self.malformed(offset, "bad sheet page"))?;
                self.finish(offset, Record::SheetEnd { page }, rest)
            }
            '[' => {
                let (spec, rest) = self
                    .box_spec(rest)
                    .ok_or_else(|| self.malformed(offset, "bad vbox record"))?;
                self.finish(offset, Record::VBoxBegin(spec), rest)
            }
            ']' => self.finish(offset, Record::VBoxEnd, rest),
            '(' => {
                let (spec, rest) = self
                    .box_spec(rest)
                    .ok_or_else(|| self.malformed(offset, "bad hbox record"))?;
                self.finish(offset, Record::HBoxBegin(spec), rest)
            }
            ')' => self.finish(offset, Record::HBoxEnd, rest),
            'v' => {
                let (spec, rest) = self
                    .box_spec(rest)
                    .ok_or_else(|| self.malformed(offset, "bad void vbox record"))?;
                self.finish(offset, Record::VoidVBox(spec), rest)
            }
            'h' => {
                let (spec, rest) = self
                    .box_spec(rest)
                    .ok_or_else(|| self.malformed(offset, "bad void hbox record"))?;
                self.finish(offset, Record::VoidHBox(spec), rest)
            }
            'g' => {
                let (leaf, rest) = self
                    .leaf_spec(rest)
                    .ok_or_else(|| self.malformed(offset, "bad glue record"))?;
                self.finish(offset, Record::Glue(leaf), rest)
            }
            'k' => {
                let (leaf, rest) = self
                    .leaf_spec(rest)
                    .ok_or_else(|| self.malformed(offset, "bad kern record"))?;
                let rest = rest
                    .strip_prefix(':')
                    .ok_or_else(|| self.malformed(offset, "missing kern width"))?;
                let (width, rest) = self
                    .int(rest)
                    .ok_or_else(|| self.malformed(offset, "bad kern width"))?;
                self.finish(offset, Record::Kern { leaf, width }, rest)
            }
            '$' => {
                let (leaf, rest) = self
                    .leaf_spec(rest)
                    .ok_or_else(|| self.malformed(offset, "bad math record"))?;
                self.finish(offset, Record::Math(leaf), rest)
            }
            'x' => {
                let (leaf, rest) = self
                    .leaf_spec(rest)
                    .ok_or_else(|| self.malformed(offset, "bad anchor record"))?;
                self.finish(offset, Record::Anchor(leaf), rest)
            }
            'r' => {
                let (spec, rest) = self
                    .box_spec(rest)
                    .ok_or_else(|| self.malformed(offset, "bad rule record"))?;
                let payload = match rest.strip_prefix(':') {
                    Some(payload) => Some(payload.to_string()),
                    None if rest.is_empty() => None,
                    None => {
                        return Err(self.malformed(offset, "trailing characters after rule"));
                    }
                };
                Ok(Record::Rule { spec, payload })
            }
            't' => {
                let (leaf, rest) = self
                    .leaf_spec(rest)
                    .ok_or_else(|| self.malformed(offset, "bad text record"))?;
                let payload = rest
                    .strip_prefix(':')
                    .ok_or_else(|| self.malformed(offset, "missing text payload"))?;
                Ok(Record::Text {
                    leaf,
                    payload: payload.to_string(),
                })
            }
            '!' => {
                let (value, rest) = self
                    .int(rest)
                    .ok_or_else(|| self.malformed(offset, "bad byte count"))?;
                self.finish(offset, Record::ByteCount(value), rest)
            }
            _ => Err(self.malformed(offset, "unknown record sigil")),
        }
    }
}

impl Iterator for RecordLexer<'_> {
    type Item = (usize, Result<Record, Error>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.offset >= self.input.len() {
                return None;
            }
            let start = self.offset;
            let rest = &self.input[start..];
            let (line, consumed) = match rest.find('\n') {
                Some(nl) => (&rest[..nl], nl + 1),
                None => (rest, rest.len()),
            };
            self.offset += consumed;
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                continue;
            }
            return Some((start, self.lex_line(start, line)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Record> {
        RecordLexer::new(input, IntPolicy::Strict)
            .map(|(_, r)| r.expect("record should lex"))
            .collect()
    }

    #[test]
    fn preamble_records() {
        let records = lex(
            "SyncTeX Version:1\nInput:1:./main.tex\nOutput:pdf\nMagnification:1000\nUnit:1\nX Offset:0\nY Offset:0\nContent:\n",
        );
        assert_eq!(
            records,
            vec![
                Record::Version(1),
                Record::Input {
                    tag: 1,
                    path: "./main.tex".to_string()
                },
                Record::Output("pdf".to_string()),
                Record::Magnification(1000),
                Record::Unit(1),
                Record::XOffset(0),
                Record::YOffset(0),
                Record::Content,
            ]
        );
    }

    #[test]
    fn box_and_leaf_records() {
        let records = lex("{1\n[1,5:0,0:400,600,0\n(1,5:10,20:100,10,2\ng1,6:15,25\nk1,6:20,25:5\n$1,8:40,25\nx1,7:30,25\n)\n]\n}1\n");
        assert_eq!(records.len(), 10);
        assert_eq!(records[0], Record::SheetBegin { page: 1 });
        assert_eq!(
            records[2],
            Record::HBoxBegin(BoxSpec {
                link: Link {
                    tag: 1,
                    line: 5,
                    column: None
                },
                point: Point { h: 10, v: 20 },
                extent: Extent {
                    width: 100,
                    height: 10,
                    depth: 2
                },
            })
        );
        assert_eq!(
            records[4],
            Record::Kern {
                leaf: LeafSpec {
                    link: Link {
                        tag: 1,
                        line: 6,
                        column: None
                    },
                    point: Point { h: 20, v: 25 },
                },
                width: 5,
            }
        );
        assert_eq!(records[9], Record::SheetEnd { page: 1 });
    }

    #[test]
    fn optional_column_is_scanned() {
        let records = lex("t1,8,3:50,25:Hello world\n");
        assert_eq!(
            records[0],
            Record::Text {
                leaf: LeafSpec {
                    link: Link {
                        tag: 1,
                        line: 8,
                        column: Some(3)
                    },
                    point: Point { h: 50, v: 25 },
                },
                payload: "Hello world".to_string(),
            }
        );
    }

    #[test]
    fn rule_payload_is_optional() {
        let records = lex("r1,9:60,40:30,5,0\nr1,9:60,40:30,5,0:hrule\n");
        assert!(matches!(&records[0], Record::Rule { payload: None, .. }));
        assert!(matches!(
            &records[1],
            Record::Rule { payload: Some(p), .. } if p == "hrule"
        ));
    }

    #[test]
    fn malformed_record_carries_line_offset() {
        let mut lexer = RecordLexer::new("{1\nq99\n}1\n", IntPolicy::Strict);
        assert!(lexer.next().unwrap().1.is_ok());
        let (offset, err) = lexer.next().unwrap();
        assert_eq!(offset, 3);
        match err {
            Err(Error::Malformed { offset, .. }) => assert_eq!(offset, 3),
            other => panic!("expected Malformed, got {other:?}"),
        }
        assert!(lexer.next().unwrap().1.is_ok());
    }

    #[test]
    fn wrong_field_count_is_malformed() {
        let mut lexer = RecordLexer::new("(1,5:10,20:100,10\n", IntPolicy::Strict);
        assert!(lexer.next().unwrap().1.is_err());
    }

    #[test]
    fn crlf_and_blank_lines_are_tolerated() {
        let records = lex("{1\r\n\r\n}1\r\n");
        assert_eq!(
            records,
            vec![Record::SheetBegin { page: 1 }, Record::SheetEnd { page: 1 }]
        );
    }
}
