//! # Template Parsing
//!
//! Turns a pattern into a tree of text, actions and `if`/`with`/`range`
//! blocks. Accepted inside actions: field chains, `$variables`, string and
//! integer literals, parenthesised calls and `|` pipelines. A pipeline may
//! start with `$x :=` (declare) or `$x =` (assign); `range` also takes
//! `$i, $v :=`.
//!
//! Variables are resolved here, so a reference to an undeclared variable is a
//! parse error. A declaration is visible until the `end` of the block that
//! encloses it.

use super::functions::Function;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Text(String),
    Action(Pipeline),
    Control(Box<Control>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Keyword {
    If,
    With,
    Range,
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::If => "if",
            Self::With => "with",
            Self::Range => "range",
        })
    }
}

/// `{{ if|with|range pipeline }} body {{ else }} otherwise {{ end }}`
///
/// `else if` and `else with` are stored as a single nested block in `otherwise`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Control {
    pub keyword: Keyword,
    pub pipeline: Pipeline,
    pub body: Vec<Segment>,
    pub otherwise: Vec<Segment>,
}

/// `cmd | cmd | ...`; each command receives the previous result as its last argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Pipeline {
    pub binding: Option<Binding>,
    pub commands: Vec<Command>,
}

/// Variable names are stored without the leading `$`; `$` itself is `""`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Binding {
    /// `$x :=`, or `$i, $v :=` in a range
    Declare(Vec<String>),
    /// `$x =`
    Assign(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Call { function: Function, args: Vec<Term> },
    Operand(Term),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Term {
    /// `.` on its own
    Dot,
    /// `.A.B.C`, relative to dot
    Field(Vec<String>),
    /// `$name.A.B`
    Variable { name: String, path: Vec<String> },
    Str(String),
    Int(i64),
    Nested(Box<Pipeline>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Dot,
    Field(Vec<String>),
    Variable { name: String, path: Vec<String> },
    Ident(String),
    Str(String),
    Int(i64),
    LParen,
    RParen,
    Pipe,
    Comma,
    Declare,
    Assign,
}

enum Item {
    Text(String),
    Action(Vec<Token>),
}

pub(crate) fn parse(pattern: &str) -> Result<Vec<Segment>, String> {
    let mut tree = Tree {
        items: split(pattern)?.into_iter(),
        vars: vec![String::new()],
    };
    match tree.list()? {
        (segments, Stop::Eof) => Ok(segments),
        (_, Stop::End) => Err("unexpected {{end}}".to_string()),
        (_, Stop::Else(_)) => Err("unexpected {{else}}".to_string()),
    }
}

/// Cuts the pattern into text and lexed actions, applying trim markers.
fn split(pattern: &str) -> Result<Vec<Item>, String> {
    let mut items = Vec::new();
    let mut rest = pattern;
    let mut trim_next_text = false;

    while let Some(open) = rest.find("{{") {
        let mut text = &rest[..open];
        if trim_next_text {
            text = text.trim_start();
        }
        let after_open = &rest[open + 2..];
        let close = after_open
            .find("}}")
            .ok_or_else(|| format!("unclosed action starting at {:?}", &rest[open..]))?;
        let mut inner = &after_open[..close];

        if let Some(stripped) = strip_trim_marker_left(inner) {
            text = text.trim_end();
            inner = stripped;
        }
        trim_next_text = false;
        if let Some(stripped) = strip_trim_marker_right(inner) {
            trim_next_text = true;
            inner = stripped;
        }

        if !text.is_empty() {
            items.push(Item::Text(text.to_string()));
        }

        let tokens = lex(inner)?;
        if tokens.is_empty() {
            return Err("missing value for action".to_string());
        }
        items.push(Item::Action(tokens));

        rest = &after_open[close + 2..];
    }

    let tail = if trim_next_text { rest.trim_start() } else { rest };
    if !tail.is_empty() {
        items.push(Item::Text(tail.to_string()));
    }
    Ok(items)
}

fn strip_trim_marker_left(inner: &str) -> Option<&str> {
    let stripped = inner.strip_prefix('-')?;
    stripped.starts_with(char::is_whitespace).then_some(stripped)
}

fn strip_trim_marker_right(inner: &str) -> Option<&str> {
    let stripped = inner.strip_suffix('-')?;
    stripped.ends_with(char::is_whitespace).then_some(stripped)
}

fn lex(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            ':' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Declare);
                i += 2;
            }
            '=' => {
                tokens.push(Token::Assign);
                i += 1;
            }
            '.' => {
                let (path, next) = lex_path(&chars, i);
                i = next;
                if path.is_empty() {
                    tokens.push(Token::Dot);
                } else {
                    tokens.push(Token::Field(path));
                }
            }
            '$' => {
                let start = i + 1;
                i = start;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let name = chars[start..i].iter().collect();
                let (path, next) = lex_path(&chars, i);
                if next > i && path.is_empty() {
                    return Err("unexpected . after term".to_string());
                }
                i = next;
                tokens.push(Token::Variable { name, path });
            }
            '"' => {
                let (value, next) = lex_quoted(&chars, i + 1)?;
                tokens.push(Token::Str(value));
                i = next;
            }
            '`' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == '`')
                    .ok_or("unterminated raw string")?;
                tokens.push(Token::Str(chars[start..start + end].iter().collect()));
                i = start + end + 1;
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<i64>()
                    .map_err(|e| format!("invalid number {literal}: {e}"))?;
                tokens.push(Token::Int(value));
            }
            c if is_ident_char(c) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character {other:?}")),
        }
    }
    Ok(tokens)
}

/// Reads `.A.B.C` starting at `i`; stops at the first `.` not followed by a name.
fn lex_path(chars: &[char], mut i: usize) -> (Vec<String>, usize) {
    let mut path = Vec::new();
    while i < chars.len() && chars[i] == '.' {
        i += 1;
        let start = i;
        while i < chars.len() && is_ident_char(chars[i]) {
            i += 1;
        }
        if start == i {
            break;
        }
        path.push(chars[start..i].iter().collect());
    }
    (path, i)
}

fn lex_quoted(chars: &[char], mut i: usize) -> Result<(String, usize), String> {
    let mut value = String::new();
    while i < chars.len() {
        match chars[i] {
            '"' => return Ok((value, i + 1)),
            '\\' => {
                let escaped = chars.get(i + 1).ok_or("unterminated quoted string")?;
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '"' => '"',
                    '\\' => '\\',
                    other => return Err(format!("unknown escape sequence \\{other}")),
                });
                i += 2;
            }
            ch => {
                value.push(ch);
                i += 1;
            }
        }
    }
    Err("unterminated quoted string".to_string())
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[derive(Clone, Copy)]
enum Word {
    Control(Keyword),
    Else,
    End,
}

fn leading_word(tokens: &[Token]) -> Option<Word> {
    let Some(Token::Ident(word)) = tokens.first() else {
        return None;
    };
    match word.as_str() {
        "if" => Some(Word::Control(Keyword::If)),
        "with" => Some(Word::Control(Keyword::With)),
        "range" => Some(Word::Control(Keyword::Range)),
        "else" => Some(Word::Else),
        "end" => Some(Word::End),
        _ => None,
    }
}

/// What ended a list of segments.
enum Stop {
    End,
    /// Tokens following `else`
    Else(Vec<Token>),
    Eof,
}

struct Tree {
    items: std::vec::IntoIter<Item>,
    /// Declared variable names, innermost last
    vars: Vec<String>,
}

impl Tree {
    fn list(&mut self) -> Result<(Vec<Segment>, Stop), String> {
        let mut segments = Vec::new();
        while let Some(item) = self.items.next() {
            let mut tokens = match item {
                Item::Text(text) => {
                    segments.push(Segment::Text(text));
                    continue;
                }
                Item::Action(tokens) => tokens,
            };
            match leading_word(&tokens) {
                Some(Word::End) if tokens.len() == 1 => return Ok((segments, Stop::End)),
                Some(Word::End) => return Err("unexpected tokens after end".to_string()),
                Some(Word::Else) => {
                    tokens.remove(0);
                    return Ok((segments, Stop::Else(tokens)));
                }
                Some(Word::Control(keyword)) => {
                    tokens.remove(0);
                    segments.push(self.control(keyword, tokens)?);
                }
                None => segments.push(Segment::Action(self.pipeline(tokens, "action", false)?)),
            }
        }
        Ok((segments, Stop::Eof))
    }

    fn control(&mut self, keyword: Keyword, tokens: Vec<Token>) -> Result<Segment, String> {
        let mark = self.vars.len();
        let pipeline = self.pipeline(tokens, &keyword.to_string(), keyword == Keyword::Range)?;
        let missing_end = || format!("unexpected EOF, missing {{{{end}}}} for {keyword}");

        let (body, stop) = self.list()?;
        let otherwise = match stop {
            Stop::End => Vec::new(),
            Stop::Eof => return Err(missing_end()),
            Stop::Else(rest) if rest.is_empty() => match self.list()? {
                (otherwise, Stop::End) => otherwise,
                (_, Stop::Else(_)) => return Err(format!("expected end; found {{{{else}}}} in {keyword}")),
                (_, Stop::Eof) => return Err(missing_end()),
            },
            Stop::Else(mut rest) => match leading_word(&rest) {
                // `else if` / `else with` share the enclosing `end`
                Some(Word::Control(chained)) if chained == keyword && keyword != Keyword::Range => {
                    rest.remove(0);
                    vec![self.control(chained, rest)?]
                }
                _ => return Err(format!("unexpected tokens after else in {keyword}")),
            },
        };

        self.vars.truncate(mark);
        Ok(Segment::Control(Box::new(Control {
            keyword,
            pipeline,
            body,
            otherwise,
        })))
    }

    fn pipeline(&mut self, tokens: Vec<Token>, context: &str, ranging: bool) -> Result<Pipeline, String> {
        if tokens.is_empty() {
            return Err(format!("missing value for {context}"));
        }
        let (binding, start) = self.binding(&tokens, ranging)?;
        let mut parser = Parser {
            tokens,
            pos: start,
            vars: &self.vars,
        };
        let mut pipeline = parser.pipeline()?;
        if let Some(token) = parser.peek() {
            return Err(format!("unexpected {token:?} in {context}"));
        }

        if let Some(Binding::Declare(names)) = &binding {
            self.vars.extend(names.iter().cloned());
        }
        pipeline.binding = binding;
        Ok(pipeline)
    }

    /// Recognises a leading declaration or assignment; returns where the commands start.
    fn binding(&self, tokens: &[Token], ranging: bool) -> Result<(Option<Binding>, usize), String> {
        let bare = |token: &Token| match token {
            Token::Variable { name, path } if path.is_empty() => Some(name.clone()),
            _ => None,
        };

        match tokens {
            [first, Token::Declare, ..] => {
                let name = bare(first).ok_or("unexpected := after non-variable")?;
                if name.is_empty() {
                    return Err("cannot declare $".to_string());
                }
                Ok((Some(Binding::Declare(vec![name])), 2))
            }
            [first, Token::Assign, ..] => {
                let name = bare(first).ok_or("unexpected = after non-variable")?;
                if !self.vars.contains(&name) {
                    return Err(format!("undefined variable \"${name}\""));
                }
                Ok((Some(Binding::Assign(name)), 2))
            }
            [first, Token::Comma, second, Token::Declare, ..] if ranging => {
                let names = bare(first).zip(bare(second)).ok_or("range can only declare variables")?;
                Ok((Some(Binding::Declare(vec![names.0, names.1])), 4))
            }
            _ => Ok((None, 0)),
        }
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    vars: &'a [String],
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn pipeline(&mut self) -> Result<Pipeline, String> {
        let mut commands = vec![self.command()?];
        while self.peek() == Some(&Token::Pipe) {
            self.pos += 1;
            commands.push(self.command()?);
        }
        Ok(Pipeline {
            binding: None,
            commands,
        })
    }

    fn command(&mut self) -> Result<Command, String> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let function = Function::lookup(name)
                    .ok_or_else(|| format!("function {name:?} not defined"))?;
                self.pos += 1;
                let mut args = Vec::new();
                while let Some(token) = self.peek() {
                    if matches!(token, Token::Pipe | Token::RParen) {
                        break;
                    }
                    args.push(self.term()?);
                }
                Ok(Command::Call { function, args })
            }
            Some(_) => {
                let term = self.term()?;
                match self.peek() {
                    None | Some(Token::Pipe | Token::RParen) => Ok(Command::Operand(term)),
                    Some(token) => Err(format!("unexpected {token:?} after operand")),
                }
            }
            None => Err("missing command".to_string()),
        }
    }

    fn term(&mut self) -> Result<Term, String> {
        match self.next() {
            Some(Token::Dot) => Ok(Term::Dot),
            Some(Token::Field(path)) => Ok(Term::Field(path)),
            Some(Token::Variable { name, path }) => {
                if !self.vars.contains(&name) {
                    return Err(format!("undefined variable \"${name}\""));
                }
                Ok(Term::Variable { name, path })
            }
            Some(Token::Str(s)) => Ok(Term::Str(s)),
            Some(Token::Int(n)) => Ok(Term::Int(n)),
            Some(Token::LParen) => {
                let inner = self.pipeline()?;
                match self.next() {
                    Some(Token::RParen) => Ok(Term::Nested(Box::new(inner))),
                    _ => Err("unclosed left paren".to_string()),
                }
            }
            Some(Token::Ident(name)) => {
                // A bare function name in argument position is a call without arguments
                let function = Function::lookup(&name)
                    .ok_or_else(|| format!("function {name:?} not defined"))?;
                Ok(Term::Nested(Box::new(Pipeline {
                    binding: None,
                    commands: vec![Command::Call {
                        function,
                        args: Vec::new(),
                    }],
                })))
            }
            Some(token) => Err(format!("unexpected {token:?}")),
            None => Err("unexpected end of action".to_string()),
        }
    }
}

/// Whether any field chain in the segments reads the secret data.
pub(crate) fn references_data(segments: &[Segment]) -> bool {
    fn in_pipeline(pipeline: &Pipeline) -> bool {
        pipeline.commands.iter().any(|command| match command {
            Command::Call { args, .. } => args.iter().any(in_term),
            Command::Operand(term) => in_term(term),
        })
    }
    fn in_term(term: &Term) -> bool {
        match term {
            Term::Field(path) | Term::Variable { path, .. } => {
                path.iter().any(|p| p == "Data" || p == "StringData")
            }
            Term::Nested(pipeline) => in_pipeline(pipeline),
            Term::Dot | Term::Str(_) | Term::Int(_) => false,
        }
    }

    segments.iter().any(|segment| match segment {
        Segment::Text(_) => false,
        Segment::Action(pipeline) => in_pipeline(pipeline),
        Segment::Control(control) => {
            in_pipeline(&control.pipeline)
                || references_data(&control.body)
                || references_data(&control.otherwise)
        }
    })
}
