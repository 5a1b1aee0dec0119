//! RETURN clause column extraction for Apache AGE.
//!
//! AGE needs the result columns of a Cypher statement spelled out in the
//! surrounding SQL. They are read from the final top-level RETURN clause.
//!
//! ```ignore
//! let columns = extract_return_columns("MATCH (n) RETURN n.name AS name, n.iata")?;
//! assert_eq!(columns, vec!["name", "n.iata"]);
//! ```

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "graph/cypher.pest"]
struct CypherParser;

/// Errors from RETURN clause extraction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("No RETURN clause found in query")]
    NoReturnClause,

    #[error("RETURN * is not supported, list the columns explicitly")]
    ReturnStarNotSupported,

    #[error("Invalid syntax: {0}")]
    InvalidSyntax(String),
}

/// Extracts the column names of the final RETURN clause.
///
/// Aliased items (`expr AS name`) yield the alias, others the expression
/// text. RETURN inside string literals, maps and subqueries is ignored.
pub fn extract_return_columns(query: &str) -> Result<Vec<String>, ParseError> {
    let cypher = CypherParser::parse(Rule::Cypher, query)
        .map_err(|e| ParseError::InvalidSyntax(e.to_string()))?
        .next()
        .ok_or(ParseError::NoReturnClause)?;

    let last_return = cypher
        .into_inner()
        .filter(|pair| pair.as_rule() == Rule::Return)
        .last()
        .ok_or(ParseError::NoReturnClause)?;

    let items = last_return
        .into_inner()
        .find(|pair| pair.as_rule() == Rule::ProjectionItems)
        .ok_or(ParseError::NoReturnClause)?;

    items
        .into_inner()
        .map(|item| match item.as_rule() {
            Rule::Star => Err(ParseError::ReturnStarNotSupported),
            _ => Ok(column_name(item)),
        })
        .collect()
}

/// Column name of one projection item: the alias if present, otherwise
/// the expression text.
fn column_name(item: Pair<'_, Rule>) -> String {
    let mut expression = item.as_str().trim();
    for inner in item.into_inner() {
        match inner.as_rule() {
            Rule::Expression => expression = inner.as_str().trim(),
            Rule::Variable => return unescape(inner.as_str().trim()),
            _ => {}
        }
    }
    expression.to_string()
}

fn unescape(name: &str) -> String {
    name.strip_prefix('`')
        .and_then(|n| n.strip_suffix('`'))
        .unwrap_or(name)
        .to_string()
}
