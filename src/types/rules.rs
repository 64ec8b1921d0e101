//! The two small closed enums a tracking rule is built from.

use std::fmt;
use std::str::FromStr;

/// The transaction field a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleField {
    /// Transaction sender.
    From,
    /// Transaction receiver.
    To,
    /// Transaction value (wei).
    Value,
    /// Whether the transaction deployed a contract.
    Deploy,
}

impl fmt::Display for RuleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::From => "from",
            Self::To => "to",
            Self::Value => "value",
            Self::Deploy => "deploy",
        };
        f.write_str(s)
    }
}

impl FromStr for RuleField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "from" => Ok(Self::From),
            "to" => Ok(Self::To),
            "value" => Ok(Self::Value),
            "deploy" => Ok(Self::Deploy),
            other => Err(UnknownField(other.to_string())),
        }
    }
}

/// Raised when a rule names a field outside `{from, to, value, deploy}`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown rule field: {0}")]
pub struct UnknownField(pub String);

/// The comparison a rule applies to its field's value. `None` is only valid
/// for the bare `deploy` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleOperator {
    /// `=`
    Eq,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// No operator (bare predicate).
    None,
}

impl fmt::Display for RuleOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "=",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::None => "",
        };
        f.write_str(s)
    }
}

impl FromStr for RuleOperator {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" => Ok(Self::Eq),
            "<=" => Ok(Self::Le),
            ">=" => Ok(Self::Ge),
            other => Err(UnknownOperator(other.to_string())),
        }
    }
}

/// Raised when a rule names an operator outside `{=, <=, >=}`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown rule operator: {0}")]
pub struct UnknownOperator(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_round_trips_through_display() {
        for f in [RuleField::From, RuleField::To, RuleField::Value, RuleField::Deploy] {
            assert_eq!(f.to_string().parse::<RuleField>().unwrap(), f);
        }
    }

    #[test]
    fn unknown_field_rejected() {
        assert!("nonsense".parse::<RuleField>().is_err());
    }

    #[test]
    fn operator_parses_known_tokens() {
        assert_eq!(RuleOperator::from_str("=").unwrap(), RuleOperator::Eq);
        assert_eq!(RuleOperator::from_str(">=").unwrap(), RuleOperator::Ge);
        assert!(RuleOperator::from_str("!=").is_err());
    }
}
