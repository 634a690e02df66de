//! Abstract comparison operators and sort orders
//!
//! Operators are backend-neutral. Each translator owns the table that maps
//! them onto its own tokens (see `sql::dialects` and `document::translator`),
//! so an operator that one backend cannot express only fails when that
//! backend translates the query.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a single predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Is,
    IsNot,
    Greater,
    Less,
    In,
    NotIn,
    Like,
    NotLike,
    Match,
    NotMatch,
}

impl Operator {
    pub const ALL: [Operator; 10] = [
        Operator::Is,
        Operator::IsNot,
        Operator::Greater,
        Operator::Less,
        Operator::In,
        Operator::NotIn,
        Operator::Like,
        Operator::NotLike,
        Operator::Match,
        Operator::NotMatch,
    ];

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Is => "is",
            Operator::IsNot => "is not",
            Operator::Greater => "greater",
            Operator::Less => "less",
            Operator::In => "in",
            Operator::NotIn => "not in",
            Operator::Like => "like",
            Operator::NotLike => "not like",
            Operator::Match => "match",
            Operator::NotMatch => "not match",
        }
    }

    /// `in` and `not in` take a sequence, every other operator a scalar
    pub fn requires_sequence(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    /// Operators whose value is a pattern string
    pub fn is_pattern(&self) -> bool {
        matches!(
            self,
            Operator::Like | Operator::NotLike | Operator::Match | Operator::NotMatch
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s
            .trim()
            .to_lowercase()
            .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        match normalized.as_str() {
            "is" => Ok(Operator::Is),
            "is not" => Ok(Operator::IsNot),
            "greater" => Ok(Operator::Greater),
            "less" => Ok(Operator::Less),
            "in" => Ok(Operator::In),
            "not in" => Ok(Operator::NotIn),
            "like" => Ok(Operator::Like),
            "not like" => Ok(Operator::NotLike),
            "match" => Ok(Operator::Match),
            "not match" => Ok(Operator::NotMatch),
            _ => Err(Error::invalid_argument(format!("unknown operator '{}'", s))),
        }
    }
}

/// Anything a predicate operator can be given as: an [`Operator`] or its name
pub trait IntoOperator {
    fn into_operator(self) -> Result<Operator>;
}

impl IntoOperator for Operator {
    fn into_operator(self) -> Result<Operator> {
        Ok(self)
    }
}

impl IntoOperator for &str {
    fn into_operator(self) -> Result<Operator> {
        self.parse()
    }
}

impl IntoOperator for String {
    fn into_operator(self) -> Result<Operator> {
        self.parse()
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Parses `asc`/`desc` case-insensitively
    pub fn parse(order: &str) -> Result<Self> {
        match order.trim().to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(Error::InvalidSortOrder(order.to_string())),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// +1 / -1 as used by document-store sort documents
    pub fn as_direction(&self) -> i32 {
        match self {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_names_round_trip() {
        for operator in Operator::ALL {
            assert_eq!(operator.as_str().parse::<Operator>().unwrap(), operator);
        }
    }

    #[test]
    fn test_operator_spellings() {
        assert_eq!("IS NOT".parse::<Operator>().unwrap(), Operator::IsNot);
        assert_eq!("is-not".parse::<Operator>().unwrap(), Operator::IsNot);
        assert_eq!("Not  In".parse::<Operator>().unwrap(), Operator::NotIn);
        assert_eq!("not_match".parse::<Operator>().unwrap(), Operator::NotMatch);
        assert!(matches!(
            "between".parse::<Operator>(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_sequence_operators() {
        let sequence: Vec<_> = Operator::ALL
            .iter()
            .filter(|op| op.requires_sequence())
            .collect();
        assert_eq!(sequence, vec![&Operator::In, &Operator::NotIn]);
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!(SortOrder::parse("ASC").unwrap(), SortOrder::Asc);
        assert_eq!(SortOrder::parse("desc").unwrap().as_sql(), "DESC");
        assert_eq!(SortOrder::parse("Desc").unwrap().as_direction(), -1);
        assert!(matches!(
            SortOrder::parse("sideways"),
            Err(Error::InvalidSortOrder(order)) if order == "sideways"
        ));
    }
}
