//! Drug interaction screening
//!
//! Advisory only: alerts never change pricing. An interaction is an
//! unordered pair; a pair of the same item is reported only when that item
//! appears on two lines.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use core_kernel::{InteractionId, ItemId};

use crate::error::PricingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionSeverity {
    Mild,
    Moderate,
    Severe,
    Contraindicated,
}

impl InteractionSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionSeverity::Mild => "mild",
            InteractionSeverity::Moderate => "moderate",
            InteractionSeverity::Severe => "severe",
            InteractionSeverity::Contraindicated => "contraindicated",
        }
    }

    pub fn requires_review(&self) -> bool {
        *self >= InteractionSeverity::Severe
    }
}

impl fmt::Display for InteractionSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionSeverity {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mild" => Ok(InteractionSeverity::Mild),
            "moderate" => Ok(InteractionSeverity::Moderate),
            "severe" => Ok(InteractionSeverity::Severe),
            "contraindicated" => Ok(InteractionSeverity::Contraindicated),
            other => Err(PricingError::invalid_rule(format!("unknown interaction severity '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrugInteraction {
    pub id: InteractionId,
    pub item_a: ItemId,
    pub item_b: ItemId,
    pub severity: InteractionSeverity,
    pub description: String,
}

impl DrugInteraction {
    /// The pair with the smaller id first
    pub fn pair(&self) -> (ItemId, ItemId) {
        if self.item_a <= self.item_b {
            (self.item_a, self.item_b)
        } else {
            (self.item_b, self.item_a)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionAlert {
    pub interaction_id: InteractionId,
    pub item_a: ItemId,
    pub item_b: ItemId,
    pub severity: InteractionSeverity,
    pub description: String,
    pub requires_review: bool,
}

pub struct InteractionScreener;

impl InteractionScreener {
    /// Returns every interaction whose endpoints both appear in `item_ids`
    ///
    /// Each interaction is reported once, most severe first.
    pub fn screen(item_ids: &[ItemId], interactions: &[DrugInteraction]) -> Vec<InteractionAlert> {
        let mut occurrences: HashMap<ItemId, usize> = HashMap::new();
        for id in item_ids {
            *occurrences.entry(*id).or_default() += 1;
        }
        let present = |a: ItemId, b: ItemId| {
            let needed = if a == b { 2 } else { 1 };
            occurrences.get(&a).copied().unwrap_or(0) >= needed && occurrences.contains_key(&b)
        };

        let mut seen = BTreeSet::new();
        let mut alerts: Vec<InteractionAlert> = interactions
            .iter()
            .filter(|i| present(i.item_a, i.item_b))
            .filter(|i| seen.insert(i.id))
            .map(|i| {
                let (item_a, item_b) = i.pair();
                InteractionAlert {
                    interaction_id: i.id,
                    item_a,
                    item_b,
                    severity: i.severity,
                    description: i.description.clone(),
                    requires_review: i.severity.requires_review(),
                }
            })
            .collect();

        alerts.sort_by(|x, y| {
            y.severity
                .cmp(&x.severity)
                .then_with(|| (x.item_a, x.item_b).cmp(&(y.item_a, y.item_b)))
                .then_with(|| x.interaction_id.cmp(&y.interaction_id))
        });
        alerts
    }
}
