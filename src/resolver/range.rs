//! Episode range expression parser.
//!
//! Grammar: a `|`-separated list of terms, each either a bare number (`e5`),
//! a bounded range (`e1-e12`), or an open range (`e1-`, `-e12`). `e0` is the
//! specials bucket. Numbers may be written with or without the `e` prefix.

use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{char, digit1};
use nom::combinator::{map, map_res, opt};
use nom::multi::separated_list1;
use nom::sequence::{preceded, separated_pair};

use crate::models::mapping::EpisodeRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Term {
    Single(u32),
    Bounded(u32, u32),
    From(u32),
    UpTo(u32),
}

fn number(input: &str) -> IResult<&str, u32> {
    map_res(digit1, str::parse)(input)
}

fn episode_number(input: &str) -> IResult<&str, u32> {
    preceded(opt(char('e')), number)(input)
}

fn bounded(input: &str) -> IResult<&str, Term> {
    map(
        separated_pair(episode_number, char('-'), episode_number),
        |(start, end)| Term::Bounded(start, end),
    )(input)
}

fn from_open(input: &str) -> IResult<&str, Term> {
    map(
        preceded(episode_number, char('-')),
        Term::From,
    )(input)
}

fn up_to_open(input: &str) -> IResult<&str, Term> {
    map(preceded(char('-'), episode_number), Term::UpTo)(input)
}

fn single(input: &str) -> IResult<&str, Term> {
    map(episode_number, Term::Single)(input)
}

fn term(input: &str) -> IResult<&str, Term> {
    alt((bounded, from_open, up_to_open, single))(input)
}

fn expression(input: &str) -> IResult<&str, Vec<Term>> {
    separated_list1(tag("|"), term)(input)
}

/// The practical upper bound for an open-ended range (`e1-`), chosen high
/// enough to cover any plausible episode count.
const OPEN_RANGE_CEILING: u32 = 9999;

/// Parses an episode range expression such as `e1-e12`, `e0`, `e1-`,
/// `-e12`, or `e1-e12|e14`. Returns `None` on malformed input.
#[must_use]
pub fn parse_range_expr(expr: &str) -> Option<EpisodeRange> {
    let (rest, terms) = expression(expr.trim()).ok()?;
    if !rest.is_empty() {
        return None;
    }

    let mut episodes = Vec::new();
    for t in terms {
        match t {
            Term::Single(n) => episodes.push(n),
            Term::Bounded(start, end) => {
                if start > end {
                    return None;
                }
                episodes.extend(start..=end);
            }
            Term::From(start) => episodes.extend(start..=OPEN_RANGE_CEILING),
            Term::UpTo(end) => episodes.extend(0..=end),
        }
    }

    Some(EpisodeRange::from_sorted_unique(episodes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bounded_range() {
        let r = parse_range_expr("e1-e12").unwrap();
        assert!(r.contains(1));
        assert!(r.contains(12));
        assert!(!r.contains(13));
    }

    #[test]
    fn parses_specials() {
        let r = parse_range_expr("e0").unwrap();
        assert!(r.contains(0));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn parses_union_of_terms() {
        let r = parse_range_expr("e1-e12|e14").unwrap();
        assert!(r.contains(14));
        assert!(!r.contains(13));
    }

    #[test]
    fn parses_open_from() {
        let r = parse_range_expr("e13-").unwrap();
        assert!(r.contains(13));
        assert!(r.contains(9999));
        assert!(!r.contains(12));
    }

    #[test]
    fn rejects_malformed_expression() {
        assert!(parse_range_expr("e1--e2").is_none());
        assert!(parse_range_expr("not-a-range").is_none());
    }

    #[test]
    fn rejects_reversed_range() {
        assert!(parse_range_expr("e12-e1").is_none());
    }
}
