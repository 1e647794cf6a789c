//! Output post-processing applied by a job before records reach its sink
//!
//! Records are N-Triples style statements. `Bulk` packs a batch into a single
//! newline-joined record, `JsonLd` turns a batch into one JSON-LD document
//! grouped by subject. Statements that do not parse as triples are passed
//! through untouched.

use serde_json::{Map, Value, json};
use shared::PostProcessMode;
use std::collections::BTreeMap;
use std::fmt;

/// Object position of a triple
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Term {
    Iri(String),
    /// Lexical form (still escaped) plus an optional `^^<type>` or `@lang` suffix
    Literal { value: String, suffix: Option<String> },
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{iri}>"),
            Term::Literal { value, suffix } => {
                write!(f, "\"{value}\"")?;
                if let Some(suffix) = suffix {
                    write!(f, "{suffix}")?;
                }
                Ok(())
            }
        }
    }
}

/// A single `<s> <p> <o> .` statement
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> <{}> {} .", self.subject, self.predicate, self.object)
    }
}

impl Triple {
    /// Parse one statement line; `None` when the line is not a triple
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim().strip_suffix('.')?.trim_end();
        let (subject, rest) = take_iri(rest)?;
        let (predicate, rest) = take_iri(rest.trim_start())?;
        let rest = rest.trim_start();
        let (object, rest) = if rest.starts_with('<') {
            let (iri, rest) = take_iri(rest)?;
            (Term::Iri(iri), rest)
        } else {
            take_literal(rest)?
        };
        if !rest.trim().is_empty() {
            return None;
        }
        Some(Self {
            subject,
            predicate,
            object,
        })
    }
}

fn take_iri(input: &str) -> Option<(String, &str)> {
    let inner = input.strip_prefix('<')?;
    let end = inner.find('>')?;
    let iri = &inner[..end];
    if iri.is_empty() || iri.contains(char::is_whitespace) {
        return None;
    }
    Some((iri.to_string(), &inner[end + 1..]))
}

fn take_literal(input: &str) -> Option<(Term, &str)> {
    let inner = input.strip_prefix('"')?;
    let mut escaped = false;
    let mut end = None;
    for (idx, ch) in inner.char_indices() {
        match ch {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => {
                end = Some(idx);
                break;
            }
            _ => escaped = false,
        }
    }
    let end = end?;
    let value = inner[..end].to_string();
    let rest = &inner[end + 1..];

    let suffix_len = if rest.starts_with("^^") {
        let (_, after) = take_iri(&rest[2..])?;
        rest.len() - after.len()
    } else if rest.starts_with('@') {
        rest.find(char::is_whitespace).unwrap_or(rest.len())
    } else {
        0
    };
    let suffix = (suffix_len > 0).then(|| rest[..suffix_len].to_string());

    Some((Term::Literal { value, suffix }, &rest[suffix_len..]))
}

/// Render triples as one JSON-LD document: an array of node objects keyed by subject
pub fn triples_to_json_ld(triples: &[Triple]) -> Value {
    let mut nodes: BTreeMap<&str, Map<String, Value>> = BTreeMap::new();
    for triple in triples {
        let node = nodes.entry(triple.subject.as_str()).or_insert_with(|| {
            let mut node = Map::new();
            node.insert("@id".to_string(), Value::String(triple.subject.clone()));
            node
        });
        let object = match &triple.object {
            Term::Iri(iri) => json!({ "@id": iri }),
            Term::Literal { value, suffix } => {
                let mut literal = Map::new();
                literal.insert("@value".to_string(), Value::String(value.clone()));
                match suffix.as_deref() {
                    Some(s) if s.starts_with("^^<") => {
                        literal.insert("@type".to_string(), Value::String(s[3..s.len() - 1].to_string()));
                    }
                    Some(s) if s.starts_with('@') => {
                        literal.insert("@language".to_string(), Value::String(s[1..].to_string()));
                    }
                    _ => {}
                }
                Value::Object(literal)
            }
        };
        let values = node
            .entry(triple.predicate.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(values) = values {
            values.push(object);
        }
    }
    Value::Array(nodes.into_values().map(Value::Object).collect())
}

/// Expand a JSON-LD document back into triples
///
/// Accepts a node object, an array of node objects, or an object with an
/// `@graph` array. Returns `None` when the value is not shaped like JSON-LD.
pub fn triples_from_json_ld(document: &Value) -> Option<Vec<Triple>> {
    let nodes: Vec<&Value> = match document {
        Value::Array(nodes) => nodes.iter().collect(),
        Value::Object(object) => match object.get("@graph") {
            Some(Value::Array(nodes)) => nodes.iter().collect(),
            _ => vec![document],
        },
        _ => return None,
    };

    let mut triples = Vec::new();
    for node in nodes {
        let node = node.as_object()?;
        let subject = node.get("@id")?.as_str()?;
        for (predicate, values) in node.iter().filter(|(key, _)| !key.starts_with('@')) {
            let values: Vec<&Value> = match values {
                Value::Array(values) => values.iter().collect(),
                single => vec![single],
            };
            for value in values {
                triples.push(Triple {
                    subject: subject.to_string(),
                    predicate: predicate.clone(),
                    object: term_from_json(value)?,
                });
            }
        }
    }
    Some(triples)
}

fn term_from_json(value: &Value) -> Option<Term> {
    match value {
        Value::Object(object) => {
            if let Some(iri) = object.get("@id") {
                return Some(Term::Iri(iri.as_str()?.to_string()));
            }
            let value = match object.get("@value")? {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            let suffix = if let Some(datatype) = object.get("@type").and_then(Value::as_str) {
                Some(format!("^^<{datatype}>"))
            } else {
                object
                    .get("@language")
                    .and_then(Value::as_str)
                    .map(|lang| format!("@{lang}"))
            };
            Some(Term::Literal { value, suffix })
        }
        Value::String(text) => Some(Term::Literal {
            value: text.clone(),
            suffix: None,
        }),
        Value::Number(_) | Value::Bool(_) => Some(Term::Literal {
            value: value.to_string(),
            suffix: None,
        }),
        _ => None,
    }
}

/// Post-processing stage configured on a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostProcessor {
    mode: PostProcessMode,
}

impl PostProcessor {
    pub fn new(mode: PostProcessMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> PostProcessMode {
        self.mode
    }

    /// Whether the job should gather a batch before calling [`Self::process`]
    pub fn batches(&self) -> bool {
        !matches!(self.mode, PostProcessMode::None)
    }

    /// Turn a batch of raw statements into the records the sink receives
    pub fn process(&self, batch: Vec<String>) -> Vec<String> {
        if batch.is_empty() {
            return Vec::new();
        }
        match self.mode {
            PostProcessMode::None => batch,
            PostProcessMode::Bulk => vec![batch.join("\n")],
            PostProcessMode::JsonLd => {
                let mut triples = Vec::new();
                let mut passthrough = Vec::new();
                for record in batch {
                    match Triple::parse(&record) {
                        Some(triple) => triples.push(triple),
                        None => passthrough.push(record),
                    }
                }
                if !triples.is_empty() {
                    passthrough.insert(0, triples_to_json_ld(&triples).to_string());
                }
                passthrough
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iri_object() {
        let triple = Triple::parse("<http://a/s> <http://a/p> <http://a/o> .").unwrap();
        assert_eq!(triple.subject, "http://a/s");
        assert_eq!(triple.predicate, "http://a/p");
        assert_eq!(triple.object, Term::Iri("http://a/o".to_string()));
    }

    #[test]
    fn test_parse_literal_with_spaces_and_suffixes() {
        let plain = Triple::parse(r#"<s:1> <p:1> "hello world" ."#).unwrap();
        assert_eq!(
            plain.object,
            Term::Literal {
                value: "hello world".to_string(),
                suffix: None
            }
        );

        let typed = Triple::parse(r#"<s:1> <p:1> "5"^^<http://www.w3.org/2001/XMLSchema#int> ."#).unwrap();
        assert_eq!(
            typed.to_string(),
            r#"<s:1> <p:1> "5"^^<http://www.w3.org/2001/XMLSchema#int> ."#
        );

        let tagged = Triple::parse(r#"<s:1> <p:1> "bonjour"@fr ."#).unwrap();
        assert_eq!(tagged.to_string(), r#"<s:1> <p:1> "bonjour"@fr ."#);

        let escaped = Triple::parse(r#"<s:1> <p:1> "say \"hi\"" ."#).unwrap();
        assert_eq!(escaped.to_string(), r#"<s:1> <p:1> "say \"hi\"" ."#);
    }

    #[test]
    fn test_parse_rejects_non_triples() {
        assert!(Triple::parse("just some text").is_none());
        assert!(Triple::parse("<s:1> <p:1> <o:1>").is_none());
        assert!(Triple::parse("<s:1> <p:1> .").is_none());
        assert!(Triple::parse(r#"<s:1> <p:1> "open ."#).is_none());
    }

    #[test]
    fn test_json_ld_groups_by_subject() {
        let triples = vec![
            Triple::parse("<s:1> <p:a> <o:1> .").unwrap(),
            Triple::parse(r#"<s:1> <p:b> "x" ."#).unwrap(),
            Triple::parse("<s:2> <p:a> <o:2> .").unwrap(),
        ];
        let document = triples_to_json_ld(&triples);
        let nodes = document.as_array().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0]["@id"], "s:1");
        assert_eq!(nodes[0]["p:b"][0]["@value"], "x");

        let mut expanded = triples_from_json_ld(&document).unwrap();
        expanded.sort();
        let mut original = triples.clone();
        original.sort();
        assert_eq!(expanded, original);
    }

    #[test]
    fn test_json_ld_accepts_graph_and_scalar_values() {
        let document = json!({
            "@graph": [
                { "@id": "s:1", "p:n": 3, "p:s": "text" }
            ]
        });
        let triples = triples_from_json_ld(&document).unwrap();
        let rendered: Vec<String> = triples.iter().map(ToString::to_string).collect();
        assert!(rendered.contains(&r#"<s:1> <p:n> "3" ."#.to_string()));
        assert!(rendered.contains(&r#"<s:1> <p:s> "text" ."#.to_string()));

        assert!(triples_from_json_ld(&json!("plain")).is_none());
        assert!(triples_from_json_ld(&json!([{ "no-id": 1 }])).is_none());
    }

    #[test]
    fn test_processor_modes() {
        let batch = vec!["<s:1> <p:1> <o:1> .".to_string(), "<s:2> <p:1> <o:2> .".to_string()];

        let none = PostProcessor::new(PostProcessMode::None);
        assert!(!none.batches());
        assert_eq!(none.process(batch.clone()), batch);

        let bulk = PostProcessor::new(PostProcessMode::Bulk);
        assert!(bulk.batches());
        assert_eq!(bulk.process(batch.clone()), vec![batch.join("\n")]);
        assert!(bulk.process(Vec::new()).is_empty());

        let json_ld = PostProcessor::new(PostProcessMode::JsonLd);
        let out = json_ld.process(vec![batch[0].clone(), "not a triple".to_string()]);
        assert_eq!(out.len(), 2);
        let document: Value = serde_json::from_str(&out[0]).unwrap();
        assert_eq!(document[0]["@id"], "s:1");
        assert_eq!(out[1], "not a triple");
    }
}
