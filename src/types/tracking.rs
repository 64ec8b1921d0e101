//! User-configured tracking: events (rule-matched counters), miners and
//! balances, plus the [`Rule`] predicate language they're built from.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use super::block::EthTxEvent;
use super::rules::{RuleField, RuleOperator};
use super::stats::Stats;

/// A single AND-clause over one transaction field. An [`Event`] matches a
/// transaction when every one of its rules matches.
#[derive(Debug, Clone)]
pub struct Rule {
    /// The field this rule inspects.
    pub field: RuleField,
    /// The comparison applied to that field (`None` only for `deploy`).
    pub operator: RuleOperator,
    /// The rule's operand, as written in the tracking YAML.
    pub value: String,
}

impl Rule {
    /// Evaluate this rule against one Ethereum transaction.
    ///
    /// Deterministic and side-effect-free: independent of the order in which
    /// an [`Event`]'s rules are evaluated.
    #[must_use]
    pub fn matches(&self, tx: &EthTxEvent) -> bool {
        match self.field {
            RuleField::From => self
                .value
                .parse::<Address>()
                .is_ok_and(|addr| addr == tx.sender),
            RuleField::To => self
                .value
                .parse::<Address>()
                .is_ok_and(|addr| tx.receiver == Some(addr)),
            RuleField::Value => self.matches_value(tx.value),
            RuleField::Deploy => tx.deploy.is_some_and(|addr| addr != Address::ZERO),
        }
    }

    fn matches_value(&self, tx_value: U256) -> bool {
        let Ok(rule_value) = self.value.parse::<U256>() else {
            return false;
        };
        match self.operator {
            RuleOperator::Eq => tx_value == rule_value,
            RuleOperator::Ge => tx_value >= rule_value,
            RuleOperator::Le => tx_value <= rule_value,
            RuleOperator::None => false,
        }
    }
}

/// A labeled, rule-matched counter configured under `events:` in the tracking
/// YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// The label this event was configured under.
    pub label: String,
    /// The counter.
    #[serde(flatten)]
    pub stats: Stats,
    /// The AND-composed rules a transaction must satisfy.
    #[serde(skip)]
    pub rules: Vec<RuleDef>,
}

/// Owned, serializable mirror of [`Rule`] so `Event` can derive
/// `Serialize`/`Deserialize` for its non-rule fields without requiring `Rule`
/// itself to round-trip through JSON (rules never appear in the backup file).
#[derive(Debug, Clone)]
pub struct RuleDef(pub Rule);

impl Event {
    /// A fresh event with zeroed stats and the given rules.
    #[must_use]
    pub fn new(label: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            label: label.into(),
            stats: Stats::new(),
            rules: rules.into_iter().map(RuleDef).collect(),
        }
    }

    /// True iff every configured rule matches the transaction.
    #[must_use]
    pub fn matches(&self, tx: &EthTxEvent) -> bool {
        self.rules.iter().all(|r| r.0.matches(tx))
    }
}

/// A tracked miner/validator address configured under `miners:`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Miner {
    /// The miner's address, as configured.
    pub id: String,
    /// The label this miner was configured under.
    pub label: String,
    /// The counter of blocks mined by this address.
    #[serde(flatten)]
    pub stats: Stats,
    /// The last block number this miner was observed proposing.
    #[serde(rename = "currentBlock")]
    pub current_block: String,
}

impl Miner {
    /// A fresh miner entry with zeroed stats.
    #[must_use]
    pub fn new(label: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            stats: Stats::new(),
            current_block: String::new(),
        }
    }
}

/// A tracked balance configured under `balances:`, refreshed from the chain
/// once the cache is marked ready.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    /// The watched address, as configured.
    pub id: String,
    /// The label this balance was configured under.
    pub label: String,
    /// Current balance, as a decimal string (empty until first refresh).
    pub balance: String,
}

/// The full set of user-configured tracking interests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tracking {
    /// Rule-matched event counters.
    #[serde(default)]
    pub events: Vec<Event>,
    /// Tracked miner/validator addresses.
    #[serde(default)]
    pub miners: Vec<Miner>,
    /// Tracked balances.
    #[serde(default)]
    pub balances: Vec<Balance>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn tx(sender: &str, receiver: Option<&str>, value: u64) -> EthTxEvent {
        EthTxEvent {
            sender: Address::from_str(sender).unwrap(),
            receiver: receiver.map(|r| Address::from_str(r).unwrap()),
            value: U256::from(value),
            function_id: None,
            events: Vec::new(),
            deploy: None,
        }
    }

    const ADDR_A: &str = "0x000000000000000000000000000000000000aa";
    const ADDR_B: &str = "0x000000000000000000000000000000000000bb";

    #[test]
    fn from_rule_matches_equal_sender_only() {
        let rule = Rule {
            field: RuleField::From,
            operator: RuleOperator::Eq,
            value: ADDR_A.to_string(),
        };
        assert!(rule.matches(&tx(ADDR_A, Some(ADDR_B), 1)));
        assert!(!rule.matches(&tx(ADDR_B, Some(ADDR_A), 1)));
    }

    #[test]
    fn value_rule_parses_decimal_not_raw_bytes() {
        let rule = Rule {
            field: RuleField::Value,
            operator: RuleOperator::Ge,
            value: "10".to_string(),
        };
        assert!(rule.matches(&tx(ADDR_A, None, 15)));
        assert!(!rule.matches(&tx(ADDR_A, None, 5)));
    }

    #[test]
    fn value_equal_zero_matches_only_exact_zero() {
        let rule = Rule {
            field: RuleField::Value,
            operator: RuleOperator::Eq,
            value: "0".to_string(),
        };
        assert!(rule.matches(&tx(ADDR_A, None, 0)));
        assert!(!rule.matches(&tx(ADDR_A, None, 1)));
    }

    #[test]
    fn deploy_rule_requires_non_zero_contract_address() {
        let rule = Rule {
            field: RuleField::Deploy,
            operator: RuleOperator::None,
            value: String::new(),
        };
        let mut t = tx(ADDR_A, None, 0);
        assert!(!rule.matches(&t));
        t.deploy = Some(Address::from_str(ADDR_B).unwrap());
        assert!(rule.matches(&t));
    }

    #[test]
    fn event_and_composes_all_rules() {
        let event = Event::new(
            "transfer",
            vec![
                Rule {
                    field: RuleField::From,
                    operator: RuleOperator::Eq,
                    value: ADDR_A.to_string(),
                },
                Rule {
                    field: RuleField::Value,
                    operator: RuleOperator::Ge,
                    value: "10".to_string(),
                },
            ],
        );
        assert!(event.matches(&tx(ADDR_A, None, 15)));
        assert!(!event.matches(&tx(ADDR_A, None, 5)));
        assert!(!event.matches(&tx(ADDR_B, None, 15)));
    }
}
