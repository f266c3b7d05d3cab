//! Script minification stage.
//!
//! A conservative whitespace-safe minifier: strips line and block comments
//! outside of string, template and regex literals, trims trailing whitespace
//! and collapses blank lines. It never rewrites identifiers or reflows
//! statements, so the output stays line-compatible with readable debugging.

use super::{artifact_text, Stage, StageError};
use crate::pipeline::Artifact;

/// Strip-minify a script artifact and insert the naming suffix handled by
/// the pipeline's naming policy.
///
/// The incoming source map (from concatenation) no longer aligns once blank
/// lines are dropped, so it is discarded; the plain bundle carries the map.
pub struct JsMinify;

impl Stage for JsMinify {
    fn name(&self) -> &'static str {
        "js-minify"
    }

    fn apply(&self, artifact: Artifact) -> Result<Artifact, StageError> {
        let source = artifact_text(&artifact)?;
        let stripped = strip_js(source);

        let mut artifact = artifact;
        artifact.bytes = stripped.into_bytes();
        artifact.map = None;
        Ok(artifact)
    }
}

#[derive(PartialEq)]
enum State {
    Code,
    SingleQuote,
    DoubleQuote,
    Template,
    Regex,
    RegexClass,
    LineComment,
    BlockComment,
}

/// Whether a `/` following this code character starts a regex literal
/// rather than a division.
///
/// After an operator or opening punctuation only a value can follow, so a
/// `/` there opens a regex. After an identifier, literal or closing bracket
/// it is division. `return /re/` is the known blind spot: the preceding
/// `n` reads as an identifier, so such a regex must not contain `//`.
fn allows_regex(c: char) -> bool {
    matches!(
        c,
        '=' | '(' | '[' | '{' | ',' | ';' | ':' | '!' | '&' | '|' | '?' | '+' | '-' | '*'
            | '%' | '^' | '~' | '<' | '>'
    )
}

/// Remove comments and excess whitespace while preserving all code, string
/// and regex contents verbatim.
///
/// Blank-line dropping and trailing-whitespace trimming happen only at
/// newlines seen outside string and template literals, so multi-line
/// template contents are never touched.
pub fn strip_js(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut line_start = 0;
    // whether a `/` at this point would open a regex literal
    let mut regex_ok = true;
    let mut chars = source.chars().peekable();

    // Finish the current output line: trim trailing whitespace, drop it
    // entirely if nothing but whitespace remains.
    fn end_code_line(out: &mut String, line_start: &mut usize) {
        let line_is_blank = out[*line_start..].trim().is_empty();
        if line_is_blank {
            out.truncate(*line_start);
        } else {
            let trimmed_len = out.trim_end_matches([' ', '\t']).len();
            out.truncate(trimmed_len);
            out.push('\n');
        }
        *line_start = out.len();
    }

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '\'' => {
                    state = State::SingleQuote;
                    out.push(c);
                }
                '"' => {
                    state = State::DoubleQuote;
                    out.push(c);
                }
                '`' => {
                    state = State::Template;
                    out.push(c);
                }
                '\n' => end_code_line(&mut out, &mut line_start),
                '/' => match chars.peek() {
                    Some('/') => {
                        chars.next();
                        state = State::LineComment;
                    }
                    Some('*') => {
                        chars.next();
                        state = State::BlockComment;
                    }
                    _ => {
                        out.push(c);
                        if regex_ok {
                            state = State::Regex;
                        } else {
                            // division operator, a value follows
                            regex_ok = true;
                        }
                    }
                },
                _ => {
                    out.push(c);
                    if !c.is_whitespace() {
                        regex_ok = allows_regex(c);
                    }
                }
            },
            State::SingleQuote | State::DoubleQuote | State::Template => {
                out.push(c);
                if c == '\n' {
                    // literal newline inside a template, keep verbatim
                    line_start = out.len();
                } else if c == '\\' {
                    // escaped character, copy it through unexamined
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else {
                    let closing = match state {
                        State::SingleQuote => '\'',
                        State::DoubleQuote => '"',
                        _ => '`',
                    };
                    if c == closing {
                        state = State::Code;
                        regex_ok = false;
                    }
                }
            }
            State::Regex | State::RegexClass => {
                out.push(c);
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else if state == State::RegexClass {
                    if c == ']' {
                        state = State::Regex;
                    }
                } else if c == '[' {
                    state = State::RegexClass;
                } else if c == '/' {
                    state = State::Code;
                    regex_ok = false;
                } else if c == '\n' {
                    // not a regex after all (unterminated), resume code
                    state = State::Code;
                    line_start = out.len();
                }
            }
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                    end_code_line(&mut out, &mut line_start);
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                }
            }
        }
    }

    // Close out a final line with no trailing newline.
    if matches!(state, State::Code | State::LineComment) && out.len() > line_start {
        end_code_line(&mut out, &mut line_start);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_strips_line_comments() {
        let out = strip_js("var a = 1; // the answer\nvar b = 2;\n");
        assert_eq!(out, "var a = 1;\nvar b = 2;\n");
    }

    #[test]
    fn test_strips_block_comments() {
        let out = strip_js("/* header */\nvar a = 1; /* inline */ var b = 2;\n");
        assert_eq!(out, "var a = 1;  var b = 2;\n");
    }

    #[test]
    fn test_keeps_comment_markers_inside_strings() {
        let out = strip_js("var url = 'http://example.com'; // real comment\n");
        assert_eq!(out, "var url = 'http://example.com';\n");

        let out = strip_js("var s = \"a /* not a comment */ b\";\n");
        assert_eq!(out, "var s = \"a /* not a comment */ b\";\n");
    }

    #[test]
    fn test_keeps_template_literals() {
        let out = strip_js("var t = `line // one\nline /* two */`;\n");
        assert_eq!(out, "var t = `line // one\nline /* two */`;\n");
    }

    #[test]
    fn test_handles_escaped_quotes() {
        let out = strip_js("var s = 'it\\'s // fine';\n");
        assert_eq!(out, "var s = 'it\\'s // fine';\n");
    }

    #[test]
    fn test_keeps_regex_literal_with_slashes() {
        let out = strip_js("var re = /https?:\\/\\//; var after = 1;\n");
        assert_eq!(out, "var re = /https?:\\/\\//; var after = 1;\n");
    }

    #[test]
    fn test_keeps_regex_with_comment_markers() {
        let out = strip_js("if (/\\/\\*|\\/\\//.test(s)) { mark(s); } // check\n");
        assert_eq!(out, "if (/\\/\\*|\\/\\//.test(s)) { mark(s); }\n");
    }

    #[test]
    fn test_regex_character_class_slash() {
        let out = strip_js("var re = /[/]+/g; // slashes\n");
        assert_eq!(out, "var re = /[/]+/g;\n");
    }

    #[test]
    fn test_division_is_not_regex() {
        let out = strip_js("var half = total / 2; // half\nvar third = (a + b) / 3;\n");
        assert_eq!(out, "var half = total / 2;\nvar third = (a + b) / 3;\n");
    }

    #[test]
    fn test_chained_division() {
        let out = strip_js("var x = a / b / c; // chained\n");
        assert_eq!(out, "var x = a / b / c;\n");
    }

    #[test]
    fn test_drops_blank_lines() {
        let out = strip_js("var a = 1;\n\n\nvar b = 2;   \n");
        assert_eq!(out, "var a = 1;\nvar b = 2;\n");
    }

    #[test]
    fn test_multiline_block_comment() {
        let out = strip_js("var a = 1;\n/*\n * long\n * comment\n */\nvar b = 2;\n");
        assert_eq!(out, "var a = 1;\nvar b = 2;\n");
    }

    #[test]
    fn test_idempotent() {
        let src = "function f() { return 'x'; } // note\n";
        let once = strip_js(src);
        let twice = strip_js(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_stage_drops_stale_map() {
        let mut artifact = Artifact::new(PathBuf::from("app.js"), b"var a = 1; // c\n".to_vec());
        artifact.map = Some("{}".to_string());

        let out = JsMinify.apply(artifact).unwrap();
        assert!(out.map.is_none());
        assert_eq!(out.bytes, b"var a = 1;\n");
    }
}
