//! A small Turtle reader covering the subset the CIDOC-CRM exports use:
//! prefix and base declarations, predicate-object and object lists, blank
//! nodes (labelled and anonymous), collections, and plain / language /
//! datatyped literals.

use hashbrown::HashMap;
use thiserror::Error;

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const RDF_FIRST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#first";
const RDF_REST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#rest";
const RDF_NIL: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#nil";
const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";

#[derive(Debug, Error)]
#[error("turtle parse error at line {line}: {message}")]
pub struct TurtleError {
    pub line: usize,
    pub message: String,
}

/// An RDF term in object position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Iri(String),
    Blank(String),
    Literal {
        value: String,
        lang: Option<String>,
        datatype: Option<String>,
    },
}

impl Term {
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// Lexical form: the IRI, the blank label, or the literal value.
    pub fn lexical(&self) -> &str {
        match self {
            Term::Iri(iri) => iri,
            Term::Blank(label) => label,
            Term::Literal { value, .. } => value,
        }
    }

    /// Node key usable as a triple subject (`_:label` for blanks).
    pub fn node_key(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            Term::Blank(label) => Some(label),
            Term::Literal { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Triple {
    /// IRI or `_:label` blank key.
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

/// Parse a complete Turtle document into triples.
pub fn parse_turtle(input: &str) -> Result<Vec<Triple>, TurtleError> {
    let mut parser = Parser::new(input);
    parser.parse_document()?;
    Ok(parser.triples)
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    prefixes: HashMap<String, String>,
    base: Option<String>,
    blank_seq: usize,
    triples: Vec<Triple>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            line: 1,
            prefixes: HashMap::new(),
            base: None,
            blank_seq: 0,
            triples: Vec::new(),
        }
    }

    fn err<T>(&self, message: impl Into<String>) -> Result<T, TurtleError> {
        Err(TurtleError {
            line: self.line,
            message: message.into(),
        })
    }

    fn eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        if b == b'\n' {
            self.line += 1;
        }
        self.pos += 1;
        Some(b)
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.bump();
                }
                b'#' => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn expect(&mut self, expected: u8) -> Result<(), TurtleError> {
        match self.peek() {
            Some(b) if b == expected => {
                self.bump();
                Ok(())
            }
            other => self.err(format!(
                "expected '{}', found {:?}",
                expected as char,
                other.map(|b| b as char)
            )),
        }
    }

    fn starts_with_keyword(&self, keyword: &str, case_insensitive: bool) -> bool {
        let end = self.pos + keyword.len();
        if end > self.bytes.len() {
            return false;
        }
        let slice = &self.input[self.pos..end];
        let matches = if case_insensitive {
            slice.eq_ignore_ascii_case(keyword)
        } else {
            slice == keyword
        };
        // The keyword must end at a token boundary.
        matches
            && self.bytes.get(end).map_or(true, |b| {
                b.is_ascii_whitespace() || matches!(b, b'.' | b',' | b';' | b')' | b']')
            })
    }

    fn parse_document(&mut self) -> Result<(), TurtleError> {
        loop {
            self.skip_ws();
            if self.eof() {
                return Ok(());
            }
            if self.starts_with_keyword("@prefix", false) {
                self.pos += "@prefix".len();
                self.parse_prefix_decl(true)?;
            } else if self.starts_with_keyword("@base", false) {
                self.pos += "@base".len();
                self.parse_base_decl(true)?;
            } else if self.starts_with_keyword("PREFIX", true) {
                self.pos += "PREFIX".len();
                self.parse_prefix_decl(false)?;
            } else if self.starts_with_keyword("BASE", true) {
                self.pos += "BASE".len();
                self.parse_base_decl(false)?;
            } else {
                let subject = self.parse_subject()?;
                self.skip_ws();
                // A bare anonymous subject may close immediately.
                if self.peek() != Some(b'.') {
                    self.parse_predicate_object_list(&subject)?;
                }
                self.skip_ws();
                self.expect(b'.')?;
            }
        }
    }

    fn parse_prefix_decl(&mut self, dotted: bool) -> Result<(), TurtleError> {
        self.skip_ws();
        let prefix = self.read_prefix_label()?;
        self.expect(b':')?;
        self.skip_ws();
        let iri = self.parse_iri_ref()?;
        self.prefixes.insert(prefix, iri);
        if dotted {
            self.skip_ws();
            self.expect(b'.')?;
        }
        Ok(())
    }

    fn parse_base_decl(&mut self, dotted: bool) -> Result<(), TurtleError> {
        self.skip_ws();
        let iri = self.parse_iri_ref()?;
        self.base = Some(iri);
        if dotted {
            self.skip_ws();
            self.expect(b'.')?;
        }
        Ok(())
    }

    fn read_prefix_label(&mut self) -> Result<String, TurtleError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.' {
                self.bump();
            } else {
                break;
            }
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn fresh_blank(&mut self) -> String {
        self.blank_seq += 1;
        format!("_:anon{}", self.blank_seq)
    }

    fn parse_subject(&mut self) -> Result<String, TurtleError> {
        self.skip_ws();
        match self.peek() {
            Some(b'<') => self.parse_iri_ref(),
            Some(b'_') => self.parse_blank_label(),
            Some(b'[') => self.parse_anon_node(),
            Some(b'(') => self.parse_collection().map(|t| t.lexical().to_string()),
            Some(_) => self.parse_prefixed_name(),
            None => self.err("unexpected end of input in subject position"),
        }
    }

    fn parse_predicate(&mut self) -> Result<String, TurtleError> {
        self.skip_ws();
        if self.peek() == Some(b'a') {
            let next = self.bytes.get(self.pos + 1).copied();
            if next.map_or(true, |b| b.is_ascii_whitespace() || b == b'<' || b == b'[') {
                self.bump();
                return Ok(RDF_TYPE.to_string());
            }
        }
        match self.peek() {
            Some(b'<') => self.parse_iri_ref(),
            Some(_) => self.parse_prefixed_name(),
            None => self.err("unexpected end of input in predicate position"),
        }
    }

    fn parse_predicate_object_list(&mut self, subject: &str) -> Result<(), TurtleError> {
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'.') | Some(b']') | None => return Ok(()),
                _ => {}
            }
            let predicate = self.parse_predicate()?;
            loop {
                let object = self.parse_object()?;
                self.triples.push(Triple {
                    subject: subject.to_string(),
                    predicate: predicate.clone(),
                    object,
                });
                self.skip_ws();
                if self.peek() == Some(b',') {
                    self.bump();
                } else {
                    break;
                }
            }
            self.skip_ws();
            if self.peek() == Some(b';') {
                while self.peek() == Some(b';') {
                    self.bump();
                    self.skip_ws();
                }
            } else {
                return Ok(());
            }
        }
    }

    fn parse_object(&mut self) -> Result<Term, TurtleError> {
        self.skip_ws();
        match self.peek() {
            Some(b'<') => Ok(Term::Iri(self.parse_iri_ref()?)),
            Some(b'_') => Ok(Term::Blank(self.parse_blank_label()?)),
            Some(b'[') => Ok(Term::Blank(self.parse_anon_node()?)),
            Some(b'(') => self.parse_collection(),
            Some(b'"') | Some(b'\'') => self.parse_literal(),
            Some(b) if b.is_ascii_digit() || b == b'+' || b == b'-' => self.parse_numeric(),
            Some(b'.') if self.bytes.get(self.pos + 1).map_or(false, u8::is_ascii_digit) => {
                self.parse_numeric()
            }
            Some(_) => {
                if self.starts_with_keyword("true", false) {
                    self.pos += 4;
                    Ok(boolean_literal(true))
                } else if self.starts_with_keyword("false", false) {
                    self.pos += 5;
                    Ok(boolean_literal(false))
                } else {
                    Ok(Term::Iri(self.parse_prefixed_name()?))
                }
            }
            None => self.err("unexpected end of input in object position"),
        }
    }

    fn parse_anon_node(&mut self) -> Result<String, TurtleError> {
        self.expect(b'[')?;
        let label = self.fresh_blank();
        self.skip_ws();
        if self.peek() != Some(b']') {
            self.parse_predicate_object_list(&label)?;
            self.skip_ws();
        }
        self.expect(b']')?;
        Ok(label)
    }

    fn parse_collection(&mut self) -> Result<Term, TurtleError> {
        self.expect(b'(')?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(b')') {
                self.bump();
                break;
            }
            if self.eof() {
                return self.err("unterminated collection");
            }
            items.push(self.parse_object()?);
        }
        if items.is_empty() {
            return Ok(Term::Iri(RDF_NIL.to_string()));
        }
        let mut node_keys = Vec::with_capacity(items.len());
        for _ in &items {
            node_keys.push(self.fresh_blank());
        }
        for (i, item) in items.into_iter().enumerate() {
            self.triples.push(Triple {
                subject: node_keys[i].clone(),
                predicate: RDF_FIRST.to_string(),
                object: item,
            });
            let rest = if i + 1 < node_keys.len() {
                Term::Blank(node_keys[i + 1].clone())
            } else {
                Term::Iri(RDF_NIL.to_string())
            };
            self.triples.push(Triple {
                subject: node_keys[i].clone(),
                predicate: RDF_REST.to_string(),
                object: rest,
            });
        }
        Ok(Term::Blank(node_keys[0].clone()))
    }

    fn parse_blank_label(&mut self) -> Result<String, TurtleError> {
        self.expect(b'_')?;
        self.expect(b':')?;
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' {
                self.bump();
            } else if b == b'.' && self
                .bytes
                .get(self.pos + 1)
                .map_or(false, |n| n.is_ascii_alphanumeric() || *n == b'_' || *n == b'-')
            {
                self.bump();
            } else {
                break;
            }
        }
        if start == self.pos {
            return self.err("empty blank node label");
        }
        Ok(format!("_:{}", &self.input[start..self.pos]))
    }

    fn parse_iri_ref(&mut self) -> Result<String, TurtleError> {
        self.expect(b'<')?;
        let mut iri = String::new();
        loop {
            match self.bump() {
                Some(b'>') => break,
                Some(b'\\') => match self.bump() {
                    Some(b'u') => iri.push(self.read_hex_escape(4)?),
                    Some(b'U') => iri.push(self.read_hex_escape(8)?),
                    other => {
                        return self.err(format!("bad IRI escape {:?}", other.map(|b| b as char)))
                    }
                },
                Some(b) => {
                    // Multi-byte UTF-8 continuation bytes pass through as-is.
                    iri.push(b as char);
                    if b >= 0x80 {
                        return self.parse_iri_ref_multibyte(iri);
                    }
                }
                None => return self.err("unterminated IRI"),
            }
        }
        Ok(self.resolve_iri(iri))
    }

    // Slow path once a non-ASCII byte is seen inside an IRI: back up one
    // byte and copy the remaining chars via str indexing.
    fn parse_iri_ref_multibyte(&mut self, mut acc: String) -> Result<String, TurtleError> {
        acc.pop();
        self.pos -= 1;
        let rest = &self.input[self.pos..];
        match rest.find('>') {
            Some(end) => {
                acc.push_str(&rest[..end]);
                self.pos += end + 1;
                Ok(self.resolve_iri(acc))
            }
            None => self.err("unterminated IRI"),
        }
    }

    fn read_hex_escape(&mut self, len: usize) -> Result<char, TurtleError> {
        let end = self.pos + len;
        if end > self.bytes.len() {
            return self.err("truncated unicode escape");
        }
        let hex = &self.input[self.pos..end];
        self.pos += len;
        u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .map_or_else(|| self.err(format!("bad unicode escape \\u{}", hex)), Ok)
    }

    fn resolve_iri(&self, iri: String) -> String {
        if iri.is_empty() {
            return self.base.clone().unwrap_or(iri);
        }
        let has_scheme = iri
            .split_once(':')
            .map_or(false, |(scheme, _)| {
                !scheme.is_empty()
                    && scheme
                        .bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'-' || b == b'.')
            });
        if has_scheme {
            iri
        } else if let Some(base) = &self.base {
            format!("{}{}", base, iri)
        } else {
            iri
        }
    }

    fn parse_prefixed_name(&mut self) -> Result<String, TurtleError> {
        let prefix = self.read_prefix_label()?;
        self.expect(b':')?;
        let namespace = match self.prefixes.get(&prefix) {
            Some(ns) => ns.clone(),
            None => return self.err(format!("undeclared prefix '{}'", prefix)),
        };

        let start = self.pos;
        let mut local = String::new();
        while let Some(b) = self.peek() {
            let ok = b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'%';
            if ok {
                self.bump();
                continue;
            }
            // A dot stays in the local name only when more name follows;
            // otherwise it terminates the statement.
            if b == b'.'
                && self.bytes.get(self.pos + 1).map_or(false, |n| {
                    n.is_ascii_alphanumeric() || *n == b'_' || *n == b'-'
                })
            {
                self.bump();
                continue;
            }
            if b >= 0x80 {
                // Accept non-ASCII name characters wholesale.
                let rest = &self.input[self.pos..];
                let ch = rest.chars().next().unwrap();
                self.pos += ch.len_utf8();
                continue;
            }
            break;
        }
        local.push_str(&self.input[start..self.pos]);
        Ok(format!("{}{}", namespace, local))
    }

    fn parse_literal(&mut self) -> Result<Term, TurtleError> {
        let quote = self.peek().unwrap();
        let long = self.input[self.pos..].starts_with(if quote == b'"' { "\"\"\"" } else { "'''" });
        let value = if long {
            self.pos += 3;
            self.read_long_string(quote)?
        } else {
            self.bump();
            self.read_short_string(quote)?
        };

        // Optional language tag or datatype.
        if self.peek() == Some(b'@') {
            self.bump();
            let start = self.pos;
            while let Some(b) = self.peek() {
                if b.is_ascii_alphanumeric() || b == b'-' {
                    self.bump();
                } else {
                    break;
                }
            }
            return Ok(Term::Literal {
                value,
                lang: Some(self.input[start..self.pos].to_string()),
                datatype: None,
            });
        }
        if self.input[self.pos..].starts_with("^^") {
            self.pos += 2;
            let datatype = match self.peek() {
                Some(b'<') => self.parse_iri_ref()?,
                _ => self.parse_prefixed_name()?,
            };
            return Ok(Term::Literal {
                value,
                lang: None,
                datatype: Some(datatype),
            });
        }
        Ok(Term::Literal {
            value,
            lang: None,
            datatype: None,
        })
    }

    fn read_short_string(&mut self, quote: u8) -> Result<String, TurtleError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                Some(b) if b == quote => break,
                Some(b'\\') => value.push(self.read_escape()?),
                Some(b'\n') => return self.err("newline in single-line string"),
                Some(b) if b < 0x80 => value.push(b as char),
                Some(_) => {
                    self.pos -= 1;
                    let rest = &self.input[self.pos..];
                    let ch = rest.chars().next().unwrap();
                    value.push(ch);
                    self.pos += ch.len_utf8();
                }
                None => return self.err("unterminated string literal"),
            }
        }
        Ok(value)
    }

    fn read_long_string(&mut self, quote: u8) -> Result<String, TurtleError> {
        let terminator = if quote == b'"' { "\"\"\"" } else { "'''" };
        let mut value = String::new();
        loop {
            if self.input[self.pos..].starts_with(terminator) {
                self.pos += 3;
                break;
            }
            match self.bump() {
                Some(b'\\') => value.push(self.read_escape()?),
                Some(b) if b < 0x80 => value.push(b as char),
                Some(_) => {
                    self.pos -= 1;
                    let rest = &self.input[self.pos..];
                    let ch = rest.chars().next().unwrap();
                    value.push(ch);
                    self.pos += ch.len_utf8();
                }
                None => return self.err("unterminated long string literal"),
            }
        }
        Ok(value)
    }

    fn read_escape(&mut self) -> Result<char, TurtleError> {
        match self.bump() {
            Some(b't') => Ok('\t'),
            Some(b'b') => Ok('\u{8}'),
            Some(b'n') => Ok('\n'),
            Some(b'r') => Ok('\r'),
            Some(b'f') => Ok('\u{c}'),
            Some(b'"') => Ok('"'),
            Some(b'\'') => Ok('\''),
            Some(b'\\') => Ok('\\'),
            Some(b'u') => self.read_hex_escape(4),
            Some(b'U') => self.read_hex_escape(8),
            other => self.err(format!("bad string escape {:?}", other.map(|b| b as char))),
        }
    }

    fn parse_numeric(&mut self) -> Result<Term, TurtleError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+') | Some(b'-')) {
            self.bump();
        }
        let mut has_dot = false;
        let mut has_exp = false;
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() {
                self.bump();
            } else if b == b'.' && !has_dot && !has_exp {
                // Trailing dot belongs to the statement, not the number.
                if self.bytes.get(self.pos + 1).map_or(false, u8::is_ascii_digit) {
                    has_dot = true;
                    self.bump();
                } else {
                    break;
                }
            } else if (b == b'e' || b == b'E') && !has_exp {
                has_exp = true;
                self.bump();
                if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                    self.bump();
                }
            } else {
                break;
            }
        }
        let text = &self.input[start..self.pos];
        if text.is_empty() || text == "+" || text == "-" {
            return self.err("malformed numeric literal");
        }
        let datatype = if has_exp {
            XSD_DOUBLE
        } else if has_dot {
            XSD_DECIMAL
        } else {
            XSD_INTEGER
        };
        Ok(Term::Literal {
            value: text.to_string(),
            lang: None,
            datatype: Some(datatype.to_string()),
        })
    }
}

fn boolean_literal(value: bool) -> Term {
    Term::Literal {
        value: value.to_string(),
        lang: None,
        datatype: Some(XSD_BOOLEAN.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_and_type_keyword() {
        let doc = r#"
            @prefix crm: <http://www.cidoc-crm.org/cidoc-crm/> .
            @prefix ex: <http://example.org/> .
            ex:p1 a crm:E21_Person .
        "#;
        let triples = parse_turtle(doc).unwrap();
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].subject, "http://example.org/p1");
        assert_eq!(triples[0].predicate, RDF_TYPE);
        assert_eq!(
            triples[0].object,
            Term::Iri("http://www.cidoc-crm.org/cidoc-crm/E21_Person".into())
        );
    }

    #[test]
    fn hyphenated_local_names_survive() {
        let doc = r#"
            @prefix crm: <http://www.cidoc-crm.org/cidoc-crm/> .
            @prefix ex: <http://example.org/> .
            ex:birth1 crm:P4_has_time-span ex:ts1 .
        "#;
        let triples = parse_turtle(doc).unwrap();
        assert_eq!(
            triples[0].predicate,
            "http://www.cidoc-crm.org/cidoc-crm/P4_has_time-span"
        );
    }

    #[test]
    fn predicate_and_object_lists() {
        let doc = r#"
            @prefix ex: <http://example.org/> .
            @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
            ex:s rdfs:label "one", "two" ;
                 ex:p ex:o .
        "#;
        let triples = parse_turtle(doc).unwrap();
        assert_eq!(triples.len(), 3);
        assert_eq!(triples[0].object.lexical(), "one");
        assert_eq!(triples[1].object.lexical(), "two");
        assert_eq!(triples[2].predicate, "http://example.org/p");
    }

    #[test]
    fn language_and_datatype_literals() {
        let doc = r#"
            @prefix ex: <http://example.org/> .
            @prefix geo: <http://www.opengis.net/ont/geosparql#> .
            ex:place ex:label "Halifax"@en ;
                     ex:coords "POINT(-63.57 44.64)"^^geo:wktLiteral ;
                     ex:pop 403131 ;
                     ex:ratio 1.5 .
        "#;
        let triples = parse_turtle(doc).unwrap();
        assert_eq!(
            triples[0].object,
            Term::Literal {
                value: "Halifax".into(),
                lang: Some("en".into()),
                datatype: None
            }
        );
        match &triples[1].object {
            Term::Literal { value, datatype, .. } => {
                assert_eq!(value, "POINT(-63.57 44.64)");
                assert_eq!(
                    datatype.as_deref(),
                    Some("http://www.opengis.net/ont/geosparql#wktLiteral")
                );
            }
            other => panic!("expected literal, got {:?}", other),
        }
        assert_eq!(triples[2].object.lexical(), "403131");
        assert_eq!(triples[3].object.lexical(), "1.5");
    }

    #[test]
    fn blank_nodes_labelled_and_anonymous() {
        let doc = r#"
            @prefix ex: <http://example.org/> .
            _:b1 ex:p ex:o .
            ex:s ex:q [ ex:inner "nested" ] .
        "#;
        let triples = parse_turtle(doc).unwrap();
        assert_eq!(triples[0].subject, "_:b1");
        // The anonymous node yields its inner triple plus the link to it.
        let inner = triples
            .iter()
            .find(|t| t.predicate == "http://example.org/inner")
            .unwrap();
        let link = triples
            .iter()
            .find(|t| t.predicate == "http://example.org/q")
            .unwrap();
        assert_eq!(link.object, Term::Blank(inner.subject.clone()));
    }

    #[test]
    fn comments_and_multiline_strings() {
        let doc = "@prefix ex: <http://example.org/> . # trailing comment\nex:s ex:p \"\"\"line one\nline two\"\"\" .";
        let triples = parse_turtle(doc).unwrap();
        assert_eq!(triples[0].object.lexical(), "line one\nline two");
    }

    #[test]
    fn unicode_in_iris_and_strings() {
        let doc = "@prefix ex: <http://example.org/> .\nex:s ex:p \"Montr\u{e9}al\" ; ex:q <http://example.org/caf\u{e9}> .";
        let triples = parse_turtle(doc).unwrap();
        assert_eq!(triples[0].object.lexical(), "Montréal");
        assert_eq!(triples[1].object.lexical(), "http://example.org/café");
    }

    #[test]
    fn undeclared_prefix_is_an_error() {
        let err = parse_turtle("nope:s nope:p nope:o .").unwrap_err();
        assert!(err.to_string().contains("undeclared prefix"));
    }

    #[test]
    fn collections_expand_to_first_rest() {
        let doc = r#"
            @prefix ex: <http://example.org/> .
            ex:s ex:list (ex:a ex:b) .
        "#;
        let triples = parse_turtle(doc).unwrap();
        let firsts: Vec<_> = triples
            .iter()
            .filter(|t| t.predicate == RDF_FIRST)
            .collect();
        assert_eq!(firsts.len(), 2);
        assert!(triples
            .iter()
            .any(|t| t.predicate == RDF_REST && t.object == Term::Iri(RDF_NIL.into())));
    }
}
