//! Booru-style query engine over the mappings store.
//!
//! Supports AND (juxtaposition), OR (`|`), NOT (`-` prefix), grouping `()`,
//! field operators (`field:value`, `field:>n`, `field:n..m`, `field:*wild?card`,
//! `has:field`), and a bare free-text term matched against AniList titles via
//! the mappings FTS5 index.

use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, is_not, tag};
use nom::character::complete::{char, multispace0, multispace1};
use nom::combinator::{map, map_res, opt, recognize, value};
use nom::multi::{many0, separated_list1};
use nom::sequence::{delimited, preceded, separated_pair};

use crate::models::mapping::Mapping;

/// One field this query engine can filter or test presence of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    AnilistId,
    AnidbId,
    TvdbId,
    TmdbMovieId,
    TmdbShowId,
    ImdbId,
    MalId,
    Year,
    Custom,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "anilist_id" | "anilist" => Some(Self::AnilistId),
            "anidb_id" | "anidb" => Some(Self::AnidbId),
            "tvdb_id" | "tvdb" => Some(Self::TvdbId),
            "tmdb_movie_id" | "tmdb_movie" => Some(Self::TmdbMovieId),
            "tmdb_show_id" | "tmdb_show" => Some(Self::TmdbShowId),
            "imdb_id" | "imdb" => Some(Self::ImdbId),
            "mal_id" | "mal" => Some(Self::MalId),
            "year" => Some(Self::Year),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AnilistId => "anilist_id",
            Self::AnidbId => "anidb_id",
            Self::TvdbId => "tvdb_id",
            Self::TmdbMovieId => "tmdb_movie_id",
            Self::TmdbShowId => "tmdb_show_id",
            Self::ImdbId => "imdb_id",
            Self::MalId => "mal_id",
            Self::Year => "year",
            Self::Custom => "custom",
        }
    }
}

/// Field name + operator support, surfaced to UIs for autocomplete without
/// hardcoding the schema.
#[must_use]
pub fn field_capabilities() -> Vec<(&'static str, &'static str)> {
    vec![
        ("anilist_id", "equality, comparison, range, wildcard, has"),
        ("anidb_id", "equality, comparison, range, has"),
        ("tvdb_id", "equality, comparison, range, has"),
        ("tmdb_movie_id", "equality, has"),
        ("tmdb_show_id", "equality, has"),
        ("imdb_id", "equality, wildcard, has"),
        ("mal_id", "equality, has"),
        ("year", "equality, comparison, range"),
        ("custom", "equality (true/false)"),
    ]
}

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Eq(String),
    Gt(i64),
    Lt(i64),
    Gte(i64),
    Lte(i64),
    Range(i64, i64),
    Wildcard(String),
    Has,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    FreeText(String),
    FieldOp(Field, Op),
    And(Vec<QueryNode>),
    Or(Vec<QueryNode>),
    Not(Box<QueryNode>),
}

fn ident(input: &str) -> IResult<&str, &str> {
    recognize(nom::multi::many1(alt((
        nom::character::complete::alphanumeric1,
        tag("_"),
    ))))(input)
}

fn quoted_string(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        escaped_transform(is_not("\"\\"), '\\', value("\"", tag("\""))),
        char('"'),
    )(input)
}

fn bare_token(input: &str) -> IResult<&str, &str> {
    is_not(" \t\r\n()|")(input)
}

fn integer(input: &str) -> IResult<&str, i64> {
    map_res(recognize(nom::sequence::pair(
        opt(char('-')),
        nom::character::complete::digit1,
    )), str::parse)(input)
}

fn operator_value(input: &str) -> IResult<&str, Op> {
    alt((
        map(preceded(char('>'), preceded(opt(char('=')), integer)), |n| {
            Op::Gte(n)
        }),
        map(preceded(char('>'), integer), Op::Gt),
        map(preceded(char('<'), preceded(opt(char('=')), integer)), |n| {
            Op::Lte(n)
        }),
        map(preceded(char('<'), integer), Op::Lt),
        map(
            separated_pair(integer, tag(".."), integer),
            |(lo, hi)| Op::Range(lo, hi),
        ),
        map(bare_token, |s: &str| {
            if s.contains(['*', '?']) {
                Op::Wildcard(s.to_string())
            } else {
                Op::Eq(s.to_string())
            }
        }),
    ))(input)
}

fn field_term(input: &str) -> IResult<&str, QueryNode> {
    let (input, name) = ident(input)?;
    let (input, _) = char(':')(input)?;

    if name == "has" {
        let (input, field_name) = ident(input)?;
        let Some(field) = Field::from_name(field_name) else {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )));
        };
        return Ok((input, QueryNode::FieldOp(field, Op::Has)));
    }

    let Some(field) = Field::from_name(name) else {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    };
    let (input, op) = operator_value(input)?;
    Ok((input, QueryNode::FieldOp(field, op)))
}

fn free_text_term(input: &str) -> IResult<&str, QueryNode> {
    alt((
        map(quoted_string, QueryNode::FreeText),
        map(bare_token, |s: &str| QueryNode::FreeText(s.to_string())),
    ))(input)
}

fn atom(input: &str) -> IResult<&str, QueryNode> {
    alt((
        delimited(
            delimited(multispace0, char('('), multispace0),
            alt((tilde_group, or_expr)),
            delimited(multispace0, char(')'), multispace0),
        ),
        map(preceded(char('-'), atom_no_negation), |n| {
            QueryNode::Not(Box::new(n))
        }),
        atom_no_negation,
    ))(input)
}

/// A group opened with `~` ORs its juxtaposed atoms instead of ANDing them,
/// e.g. `(~tvdb_id:1 tvdb_id:2)` is equivalent to `(tvdb_id:1 | tvdb_id:2)`.
fn tilde_group(input: &str) -> IResult<&str, QueryNode> {
    map(
        preceded(char('~'), preceded(multispace0, separated_list1(multispace1, atom))),
        |mut nodes| {
            if nodes.len() == 1 {
                nodes.pop().unwrap()
            } else {
                QueryNode::Or(nodes)
            }
        },
    )(input)
}

fn atom_no_negation(input: &str) -> IResult<&str, QueryNode> {
    alt((field_term, free_text_term))(input)
}

fn and_expr(input: &str) -> IResult<&str, QueryNode> {
    map(
        separated_list1(multispace1, atom),
        |mut nodes| {
            if nodes.len() == 1 {
                nodes.pop().unwrap()
            } else {
                QueryNode::And(nodes)
            }
        },
    )(input)
}

fn or_expr(input: &str) -> IResult<&str, QueryNode> {
    map(
        separated_list1(
            delimited(multispace0, char('|'), multispace0),
            and_expr,
        ),
        |mut nodes| {
            if nodes.len() == 1 {
                nodes.pop().unwrap()
            } else {
                QueryNode::Or(nodes)
            }
        },
    )(input)
}

/// Parses a query string into an AST. Returns `None` on malformed input.
#[must_use]
pub fn parse_query(input: &str) -> Option<QueryNode> {
    let (rest, node) = delimited(multispace0, or_expr, multispace0)(input).ok()?;
    if rest.is_empty() { Some(node) } else { None }
}

fn field_values(mapping: &Mapping, field: Field) -> Vec<i64> {
    match field {
        Field::AnilistId => vec![i64::from(mapping.anilist_id)],
        Field::AnidbId => mapping.anidb_id.map(i64::from).into_iter().collect(),
        Field::TvdbId => mapping.tvdb_id.map(i64::from).into_iter().collect(),
        Field::TmdbMovieId => mapping.tmdb_movie_id.iter().map(|v| i64::from(*v)).collect(),
        Field::TmdbShowId => mapping.tmdb_show_id.iter().map(|v| i64::from(*v)).collect(),
        Field::MalId => mapping.mal_id.iter().map(|v| i64::from(*v)).collect(),
        Field::Year => mapping.year.map(i64::from).into_iter().collect(),
        Field::ImdbId | Field::Custom => Vec::new(),
    }
}

fn field_has_value(mapping: &Mapping, field: Field) -> bool {
    match field {
        Field::ImdbId => !mapping.imdb_id.is_empty(),
        Field::Custom => mapping.custom,
        other => !field_values(mapping, other).is_empty(),
    }
}

fn wildcard_match(pattern: &str, value: &str) -> bool {
    let mut regex = String::from("(?i)^");
    for c in pattern.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            c if regex_syntax::is_meta_character(c) => {
                regex.push('\\');
                regex.push(c);
            }
            c => regex.push(c),
        }
    }
    regex.push('$');
    regex::Regex::new(&regex).is_ok_and(|re| re.is_match(value))
}

mod regex_syntax {
    #[must_use]
    pub const fn is_meta_character(c: char) -> bool {
        matches!(
            c,
            '.' | '^' | '$' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '\\' | '|'
        )
    }
}

/// Evaluates a parsed query against one mapping. The free-text leaf is
/// matched against a pre-computed title-match set (from an FTS5 query run by
/// the caller), not against `mapping` directly.
#[must_use]
pub fn evaluate(node: &QueryNode, mapping: &Mapping, free_text_hits: &[i32]) -> bool {
    match node {
        QueryNode::FreeText(_) => free_text_hits.contains(&mapping.anilist_id),
        QueryNode::FieldOp(field, Op::Has) => field_has_value(mapping, *field),
        QueryNode::FieldOp(Field::ImdbId, Op::Eq(v)) => mapping.imdb_id.iter().any(|x| x == v),
        QueryNode::FieldOp(Field::ImdbId, Op::Wildcard(pat)) => {
            mapping.imdb_id.iter().any(|x| wildcard_match(pat, x))
        }
        QueryNode::FieldOp(Field::Custom, Op::Eq(v)) => {
            mapping.custom == (v == "true" || v == "1")
        }
        QueryNode::FieldOp(field, op) => {
            let values = field_values(mapping, *field);
            values.iter().any(|&v| match op {
                Op::Eq(s) => s.parse::<i64>().is_ok_and(|n| n == v),
                Op::Gt(n) => v > *n,
                Op::Lt(n) => v < *n,
                Op::Gte(n) => v >= *n,
                Op::Lte(n) => v <= *n,
                Op::Range(lo, hi) => v >= *lo && v <= *hi,
                Op::Wildcard(_) | Op::Has => false,
            })
        }
        QueryNode::And(nodes) => nodes.iter().all(|n| evaluate(n, mapping, free_text_hits)),
        QueryNode::Or(nodes) => nodes.iter().any(|n| evaluate(n, mapping, free_text_hits)),
        QueryNode::Not(inner) => !evaluate(inner, mapping, free_text_hits),
    }
}

/// Collects every free-text leaf term, to be ORed together into one FTS5
/// `MATCH` query before in-memory evaluation narrows the result.
#[must_use]
pub fn free_text_terms(node: &QueryNode) -> Vec<String> {
    match node {
        QueryNode::FreeText(term) => vec![term.clone()],
        QueryNode::FieldOp(..) => Vec::new(),
        QueryNode::And(nodes) | QueryNode::Or(nodes) => {
            nodes.iter().flat_map(free_text_terms).collect()
        }
        QueryNode::Not(inner) => free_text_terms(inner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(anilist_id: i32, tvdb_id: Option<i32>, year: Option<i32>) -> Mapping {
        Mapping {
            anilist_id,
            tvdb_id,
            year,
            ..Mapping::new(anilist_id)
        }
    }

    #[test]
    fn parses_field_equality() {
        let node = parse_query("tvdb_id:81797").unwrap();
        assert_eq!(node, QueryNode::FieldOp(Field::TvdbId, Op::Eq("81797".into())));
    }

    #[test]
    fn parses_range_and_comparison() {
        assert!(matches!(
            parse_query("year:2000..2010").unwrap(),
            QueryNode::FieldOp(Field::Year, Op::Range(2000, 2010))
        ));
        assert!(matches!(
            parse_query("year:>2010").unwrap(),
            QueryNode::FieldOp(Field::Year, Op::Gt(2010))
        ));
    }

    #[test]
    fn parses_and_or_not_grouping() {
        let node = parse_query("tvdb_id:1 | -has:anidb_id").unwrap();
        match node {
            QueryNode::Or(branches) => {
                assert_eq!(branches.len(), 2);
                assert!(matches!(branches[1], QueryNode::Not(_)));
            }
            _ => panic!("expected Or"),
        }
    }

    #[test]
    fn evaluates_range_query() {
        let node = parse_query("year:2010..2020").unwrap();
        assert!(evaluate(&node, &mapping(1, None, Some(2015)), &[]));
        assert!(!evaluate(&node, &mapping(2, None, Some(2005)), &[]));
    }

    #[test]
    fn evaluates_has_operator() {
        let node = parse_query("has:tvdb_id").unwrap();
        assert!(evaluate(&node, &mapping(1, Some(5), None), &[]));
        assert!(!evaluate(&node, &mapping(2, None, None), &[]));
    }

    #[test]
    fn field_capabilities_lists_every_field() {
        let caps = field_capabilities();
        assert_eq!(caps.len(), 9);
    }

    #[test]
    fn tilde_group_ors_juxtaposed_atoms() {
        let node = parse_query("(~tvdb_id:1 tvdb_id:2)").unwrap();
        match node {
            QueryNode::Or(branches) => assert_eq!(branches.len(), 2),
            other => panic!("expected Or, got {other:?}"),
        }
        assert!(evaluate(&node, &mapping(1, Some(1), None), &[]));
        assert!(evaluate(&node, &mapping(2, Some(2), None), &[]));
        assert!(!evaluate(&node, &mapping(3, Some(3), None), &[]));
    }
}
