//! # Query Processor
//!
//! Translates a raw query string into a structured query. Recognized
//! syntax: bare terms, double-quoted phrases, `AND` / `OR` / `NOT`,
//! `field:value` scoping, and a trailing `~` for fuzzy matching. Parse
//! failures are never fatal: anything the parser cannot interpret demotes
//! the whole input to a bag of terms with a warning.

use crate::search::documents::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fields a query clause may be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryField {
    Path,
    Method,
    Tag,
    Auth,
    Param,
    Response,
    Status,
}

impl QueryField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(Self::Path),
            "method" => Some(Self::Method),
            "tag" => Some(Self::Tag),
            "auth" => Some(Self::Auth),
            "param" => Some(Self::Param),
            "response" => Some(Self::Response),
            "status" => Some(Self::Status),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Method => "method",
            Self::Tag => "tag",
            Self::Auth => "auth",
            Self::Param => "param",
            Self::Response => "response",
            Self::Status => "status",
        }
    }

    /// Restrictiveness ranking used when a suggestion drops a filter:
    /// narrower scopes rank higher.
    fn restrictiveness(&self) -> u8 {
        match self {
            Self::Status => 7,
            Self::Response => 6,
            Self::Param => 5,
            Self::Auth => 4,
            Self::Method => 3,
            Self::Tag => 2,
            Self::Path => 1,
        }
    }
}

/// One clause of a structured query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryClause {
    pub negated: bool,
    pub field: Option<QueryField>,
    pub phrase: bool,
    pub fuzzy: bool,
    pub value: String,
}

impl QueryClause {
    fn term(value: &str) -> Self {
        Self { negated: false, field: None, phrase: false, fuzzy: false, value: value.to_string() }
    }
}

/// A parsed query: OR over groups, implicit AND within each group.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StructuredQuery {
    pub groups: Vec<Vec<QueryClause>>,
}

impl StructuredQuery {
    /// Treat the whole input as a bag of AND-ed terms.
    pub fn bag_of_terms(input: &str) -> Self {
        let clauses: Vec<QueryClause> =
            tokenize(input).iter().map(|t| QueryClause::term(t)).collect();
        if clauses.is_empty() {
            Self::default()
        } else {
            Self { groups: vec![clauses] }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(Vec::is_empty)
    }

    /// All positive term values, for spelling suggestions.
    pub fn positive_terms(&self) -> Vec<&str> {
        self.groups
            .iter()
            .flatten()
            .filter(|c| !c.negated && !c.phrase)
            .map(|c| c.value.as_str())
            .collect()
    }
}

/// Parse a raw query. The second element carries warnings recorded on the
/// response metadata; a non-empty warning list means the bag-of-terms
/// fallback was taken.
pub fn parse_query(input: &str) -> (StructuredQuery, Vec<String>) {
    match try_parse(input) {
        Ok(query) if !query.is_empty() => (query, Vec::new()),
        Ok(_) => (StructuredQuery::bag_of_terms(input), Vec::new()),
        Err(reason) => {
            let warning = format!("Query syntax not understood ({reason}); treated as plain terms");
            (StructuredQuery::bag_of_terms(input), vec![warning])
        }
    }
}

fn try_parse(input: &str) -> Result<StructuredQuery, String> {
    let tokens = lex(input)?;

    let mut groups: Vec<Vec<QueryClause>> = Vec::new();
    let mut current: Vec<QueryClause> = Vec::new();
    let mut negate_next = false;

    for token in tokens {
        match token.as_str() {
            "AND" => {
                if current.is_empty() {
                    return Err("'AND' with no left operand".to_string());
                }
            }
            "OR" => {
                if current.is_empty() {
                    return Err("'OR' with no left operand".to_string());
                }
                groups.push(std::mem::take(&mut current));
            }
            "NOT" => {
                if negate_next {
                    return Err("double negation".to_string());
                }
                negate_next = true;
            }
            _ => {
                let mut clause = parse_clause(&token)?;
                clause.negated = negate_next;
                negate_next = false;
                current.push(clause);
            }
        }
    }

    if negate_next {
        return Err("'NOT' with no operand".to_string());
    }
    if !current.is_empty() {
        groups.push(current);
    } else if !groups.is_empty() {
        return Err("'OR' with no right operand".to_string());
    }

    Ok(StructuredQuery { groups })
}

/// Split into whitespace-separated tokens, keeping double-quoted spans
/// intact (including a `field:"quoted phrase"` prefix).
fn lex(input: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return Err("unterminated quote".to_string());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_clause(token: &str) -> Result<QueryClause, String> {
    let (field, rest) = match token.split_once(':') {
        Some((prefix, rest))
            if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_alphabetic()) =>
        {
            let field = QueryField::parse(&prefix.to_lowercase())
                .ok_or_else(|| format!("unknown field '{prefix}'"))?;
            (Some(field), rest)
        }
        _ => (None, token),
    };

    if rest.is_empty() {
        return Err(format!("empty value in '{token}'"));
    }

    if rest.starts_with('"') {
        if rest.len() < 2 || !rest.ends_with('"') {
            return Err(format!("malformed phrase in '{token}'"));
        }
        let value = rest[1..rest.len() - 1].to_string();
        if value.is_empty() {
            return Err("empty phrase".to_string());
        }
        return Ok(QueryClause { negated: false, field, phrase: true, fuzzy: false, value });
    }

    let (value, fuzzy) = match rest.strip_suffix('~') {
        Some(stripped) if !stripped.is_empty() => (stripped.to_string(), true),
        Some(_) => return Err("empty fuzzy term".to_string()),
        None => (rest.to_string(), false),
    };

    Ok(QueryClause { negated: false, field, phrase: false, fuzzy, value })
}

/// Maximum edit distance for spelling corrections and fuzzy expansion.
pub const MAX_EDIT_DISTANCE: usize = 2;
const MAX_SUGGESTIONS: usize = 5;

/// Kind of a search suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Spelling,
    Generalization,
    CrossModal,
}

/// One alternative proposed when a query has few or no hits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSuggestion {
    pub kind: SuggestionKind,
    pub suggestion: String,
    pub description: String,
}

/// Propose up to five alternatives for a low-hit query: spelling
/// corrections against the vocabulary, dropping the most restrictive field
/// filter, and a cross-modal hint.
pub fn build_suggestions(
    original: &str,
    query: &StructuredQuery,
    hit_count: usize,
    vocabulary: &BTreeSet<String>,
) -> Vec<SearchSuggestion> {
    if hit_count >= 5 {
        return Vec::new();
    }

    let mut suggestions = Vec::new();

    for term in query.positive_terms() {
        let lowered = term.to_lowercase();
        if vocabulary.contains(&lowered) {
            continue;
        }
        for correction in closest_terms(&lowered, vocabulary, 2) {
            if suggestions.len() >= MAX_SUGGESTIONS {
                return suggestions;
            }
            suggestions.push(SearchSuggestion {
                kind: SuggestionKind::Spelling,
                suggestion: original.to_lowercase().replace(&lowered, &correction),
                description: format!("Did you mean '{correction}' instead of '{term}'?"),
            });
        }
    }

    if suggestions.len() < MAX_SUGGESTIONS {
        if let Some(generalized) = drop_most_restrictive_filter(query) {
            suggestions.push(generalized);
        }
    }

    if suggestions.len() < MAX_SUGGESTIONS {
        let terms = query.positive_terms().join(" ");
        if !terms.is_empty() {
            suggestions.push(SearchSuggestion {
                kind: SuggestionKind::CrossModal,
                suggestion: terms.clone(),
                description: format!(
                    "No matching endpoints; '{terms}' may name a schema — try getSchema"
                ),
            });
        }
    }

    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}

/// Vocabulary terms within [`MAX_EDIT_DISTANCE`] of `term`, closest first,
/// ties broken lexicographically.
pub fn closest_terms(term: &str, vocabulary: &BTreeSet<String>, limit: usize) -> Vec<String> {
    let mut candidates: Vec<(usize, &String)> = vocabulary
        .iter()
        .filter_map(|candidate| {
            let distance = strsim::levenshtein(term, candidate);
            (distance > 0 && distance <= MAX_EDIT_DISTANCE).then_some((distance, candidate))
        })
        .collect();
    candidates.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(b.1)));
    candidates.into_iter().take(limit).map(|(_, c)| c.clone()).collect()
}

fn drop_most_restrictive_filter(query: &StructuredQuery) -> Option<SearchSuggestion> {
    let dropped = query
        .groups
        .iter()
        .flatten()
        .filter_map(|c| c.field.map(|f| (f, c)))
        .max_by_key(|(f, _)| f.restrictiveness())?;

    let remaining: Vec<String> = query
        .groups
        .iter()
        .flatten()
        .filter(|c| !std::ptr::eq(*c, dropped.1))
        .map(render_clause)
        .collect();
    if remaining.is_empty() {
        return None;
    }

    Some(SearchSuggestion {
        kind: SuggestionKind::Generalization,
        suggestion: remaining.join(" "),
        description: format!("Drop the '{}:' filter to widen the search", dropped.0.as_str()),
    })
}

fn render_clause(clause: &QueryClause) -> String {
    let mut out = String::new();
    if clause.negated {
        out.push_str("NOT ");
    }
    if let Some(field) = clause.field {
        out.push_str(field.as_str());
        out.push(':');
    }
    if clause.phrase {
        out.push('"');
        out.push_str(&clause.value);
        out.push('"');
    } else {
        out.push_str(&clause.value);
        if clause.fuzzy {
            out.push('~');
        }
    }
    out
}
