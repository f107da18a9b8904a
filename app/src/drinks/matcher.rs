//! Ranks drinks by how much of each recipe a set of ingredients covers.
//!
//! The store supplies the full requirement set of every drink that shares at
//! least one ingredient with the caller; [`rank`] does the counting,
//! classification and ordering.

use std::collections::{BTreeMap, BTreeSet};

use log::*;
use serde::{Deserialize, Serialize};

use infra::ids::Id;
use infra::persistence::{column, Transaction};

use super::assembly;
use super::models::{Drink, MatchedDrink};
use crate::error::{Result, StorageContext};
use crate::ingredients::Ingredient;

const CANDIDATES_SQL: &str = "SELECT d.id, d.name, di.ingredient_id \
    FROM drinks d \
    JOIN drink_ingredients di ON di.drink_id = d.id \
    WHERE d.id IN (SELECT drink_id FROM drink_ingredients WHERE ingredient_id = ANY($1))";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Only drinks whose whole recipe is covered.
    Strict,
    /// Any drink sharing at least one ingredient, closest to complete first.
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub(crate) drink_id: Id<Drink>,
    pub(crate) name: String,
    pub(crate) required: BTreeSet<Id<Ingredient>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Coverage {
    pub(crate) drink_id: Id<Drink>,
    pub(crate) name: String,
    pub(crate) present: usize,
    pub(crate) total: usize,
}

impl MatchMode {
    pub fn from_strict_flag(strict: bool) -> Self {
        if strict {
            MatchMode::Strict
        } else {
            MatchMode::Partial
        }
    }
}

impl Coverage {
    pub(crate) fn missing(&self) -> usize {
        self.total - self.present
    }

    fn accepted_by(&self, mode: MatchMode) -> bool {
        if self.total == 0 || self.present == 0 {
            return false;
        }
        match mode {
            MatchMode::Strict => self.present == self.total,
            MatchMode::Partial => true,
        }
    }
}

/// Classifies and orders candidates. Strict results come out by name then
/// id; partial results by missing count, then name, then id. Since every
/// strict result has nothing missing, both orders agree on strict results.
pub(crate) fn rank<I>(
    candidates: I,
    available: &BTreeSet<Id<Ingredient>>,
    mode: MatchMode,
) -> Vec<Coverage>
where
    I: IntoIterator<Item = Candidate>,
{
    let mut ranked = candidates
        .into_iter()
        .map(|c| Coverage {
            present: c.required.intersection(available).count(),
            total: c.required.len(),
            drink_id: c.drink_id,
            name: c.name,
        })
        .filter(|c| c.accepted_by(mode))
        .collect::<Vec<_>>();

    ranked.sort_by(|a, b| {
        a.missing()
            .cmp(&b.missing())
            .then_with(|| a.name.as_bytes().cmp(b.name.as_bytes()))
            .then_with(|| a.drink_id.cmp(&b.drink_id))
    });
    ranked
}

fn candidates(t: &Transaction, available: &BTreeSet<Id<Ingredient>>) -> Result<Vec<Candidate>> {
    let raw = available.iter().map(Id::raw).collect::<Vec<i32>>();
    let rows = t.query(CANDIDATES_SQL, &[&raw]).storage()?;

    let mut by_drink = BTreeMap::<Id<Drink>, Candidate>::new();
    for row in rows.iter() {
        let drink_id = Id::from_raw(column(&row, 0).storage()?);
        let ingredient_id = Id::from_raw(column(&row, 2).storage()?);
        match by_drink.get_mut(&drink_id) {
            Some(candidate) => {
                candidate.required.insert(ingredient_id);
            }
            None => {
                let mut required = BTreeSet::new();
                required.insert(ingredient_id);
                let name = column(&row, 1).storage()?;
                by_drink.insert(
                    drink_id,
                    Candidate {
                        drink_id,
                        name,
                        required,
                    },
                );
            }
        }
    }
    Ok(by_drink.into_iter().map(|(_, c)| c).collect())
}

/// Finds the drinks makeable from `available` and assembles them in rank
/// order. Repeated ids count once.
pub(crate) fn generate<I>(
    t: &Transaction,
    available: I,
    mode: MatchMode,
) -> Result<Vec<MatchedDrink>>
where
    I: IntoIterator<Item = Id<Ingredient>>,
{
    let available = available.into_iter().collect::<BTreeSet<_>>();
    if available.is_empty() {
        debug!("No ingredients offered; nothing to match");
        return Ok(Vec::new());
    }

    let candidates = candidates(t, &available)?;
    debug!(
        "{} candidate drinks for {} ingredients",
        candidates.len(),
        available.len()
    );
    let ranked = rank(candidates, &available, mode);

    let ids = ranked.iter().map(|c| c.drink_id).collect::<Vec<_>>();
    let mut drinks = assembly::load_by_ids(t, &ids)?;

    let matched = ranked
        .into_iter()
        .filter_map(|coverage| {
            let missing = coverage.missing();
            match drinks.remove(&coverage.drink_id) {
                Some(drink) => Some(MatchedDrink {
                    drink,
                    ingredients_present: coverage.present,
                    total_ingredients: coverage.total,
                    missing_ingredients: missing,
                }),
                None => {
                    warn!("Ranked drink {} vanished", coverage.drink_id);
                    None
                }
            }
        })
        .collect();
    Ok(matched)
}
