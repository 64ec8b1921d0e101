//! Parses the tracking rules YAML (`events:`/`miners:`/`balances:`) into a
//! [`Tracking`]. A missing file is not an error — it yields an empty
//! `Tracking` — but a present, malformed file aborts startup.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{AppError, DomainError, InfraError, Result};
use crate::types::rules::{RuleField, RuleOperator};
use crate::types::tracking::{Balance, Event, Miner, Rule, Tracking};

#[derive(Debug, Deserialize, Default)]
struct RawTrackingConfig {
    #[serde(default)]
    events: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    miners: BTreeMap<String, String>,
    #[serde(default)]
    balances: BTreeMap<String, String>,
}

/// Load and validate the tracking configuration at `path`.
///
/// # Errors
/// Returns [`DomainError`] if the file exists but is not valid YAML, or
/// contains a rule with an unknown field, an invalid operator for its field,
/// or a shape other than one or three whitespace-separated tokens.
pub fn load_tracking_config(path: &Path) -> Result<Tracking> {
    if !path.exists() {
        return Ok(Tracking::default());
    }

    let raw_text = std::fs::read_to_string(path).map_err(InfraError::Io)?;
    let raw: RawTrackingConfig =
        serde_yaml::from_str(&raw_text).map_err(DomainError::InvalidTrackingConfig)?;

    let mut tracking = Tracking::default();

    for (label, rule_strings) in raw.events {
        let rules = rule_strings
            .iter()
            .map(|s| parse_rule(s))
            .collect::<Result<Vec<_>>>()?;
        tracking.events.push(Event::new(label, rules));
    }
    for (label, address) in raw.miners {
        tracking.miners.push(Miner::new(label, address));
    }
    for (label, address) in raw.balances {
        tracking.balances.push(Balance {
            id: address,
            label,
            balance: String::new(),
        });
    }

    Ok(tracking)
}

/// Parse a single rule string (`"from = 0xabc..."` or `"deploy"`).
fn parse_rule(raw: &str) -> Result<Rule> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    let rule = match tokens.as_slice() {
        [field] => {
            let field = parse_field(field)?;
            validate_operator(field, RuleOperator::None, raw)?;
            Rule {
                field,
                operator: RuleOperator::None,
                value: String::new(),
            }
        }
        [field, op, value] => {
            let field = parse_field(field)?;
            let operator = op.parse::<RuleOperator>().map_err(|_| {
                AppError::Domain(DomainError::InvalidOperator {
                    field: field.to_string(),
                    operator: (*op).to_string(),
                })
            })?;
            validate_operator(field, operator, raw)?;
            Rule {
                field,
                operator,
                value: (*value).to_string(),
            }
        }
        _ => return Err(AppError::Domain(DomainError::MalformedRule(raw.to_string()))),
    };
    Ok(rule)
}

fn parse_field(token: &str) -> Result<RuleField> {
    token
        .parse::<RuleField>()
        .map_err(|e| AppError::Domain(DomainError::UnknownField(e.0)))
}

fn validate_operator(field: RuleField, operator: RuleOperator, raw: &str) -> Result<()> {
    let ok = match field {
        RuleField::From | RuleField::To => operator == RuleOperator::Eq,
        RuleField::Value => operator != RuleOperator::None,
        RuleField::Deploy => operator == RuleOperator::None,
    };
    if ok {
        Ok(())
    } else if matches!(operator, RuleOperator::None) && !matches!(field, RuleField::Deploy) {
        // A bare field token that isn't `deploy` is a malformed shape, not
        // merely an invalid operator for that field.
        Err(AppError::Domain(DomainError::MalformedRule(raw.to_string())))
    } else {
        Err(AppError::Domain(DomainError::InvalidOperator {
            field: field.to_string(),
            operator: operator.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn bare_deploy_rule_parses() {
        let rule = parse_rule("deploy").unwrap();
        assert_eq!(rule.field, RuleField::Deploy);
        assert_eq!(rule.operator, RuleOperator::None);
    }

    #[test]
    fn unknown_field_rejected() {
        assert!(parse_rule("owner = 0xabc").is_err());
    }

    #[test]
    fn from_with_non_eq_operator_rejected() {
        assert!(parse_rule("from >= 0xabc").is_err());
    }

    #[test]
    fn value_without_operator_rejected() {
        assert!(parse_rule("value").is_err());
    }

    #[test]
    fn two_token_shape_rejected() {
        assert!(parse_rule("value 10").is_err());
    }

    #[test]
    fn missing_file_yields_empty_tracking() {
        let tracking = load_tracking_config(Path::new("/nonexistent/path/config.yml")).unwrap();
        assert!(tracking.events.is_empty());
        assert!(tracking.miners.is_empty());
        assert!(tracking.balances.is_empty());
    }

    #[test]
    fn full_config_loads_events_miners_and_balances() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r"
events:
  transfer:
    - 'from = 0x000000000000000000000000000000000000aa'
    - 'value >= 10'
miners:
  primary: 0x000000000000000000000000000000000000bb
balances:
  treasury: 0x000000000000000000000000000000000000cc
"
        )
        .unwrap();
        let tracking = load_tracking_config(file.path()).unwrap();
        assert_eq!(tracking.events.len(), 1);
        assert_eq!(tracking.events[0].label, "transfer");
        assert_eq!(tracking.events[0].rules.len(), 2);
        assert_eq!(tracking.miners.len(), 1);
        assert_eq!(tracking.balances.len(), 1);
    }

    #[test]
    fn malformed_yaml_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "events: [this is not a map").unwrap();
        assert!(load_tracking_config(file.path()).is_err());
    }
}
