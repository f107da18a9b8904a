//! Mapping between association rows and nested drinks.
//!
//! Reads aggregate each drink's recipe into a `json` column and decode it
//! with the [`DrinkIngredient`] schema. Writes resolve ingredient names to
//! ids and insert the drink and its recipe in the caller's transaction.

use std::collections::{BTreeSet, HashMap};

use log::*;
use postgres::rows::Row;

use infra::ids::Id;
use infra::persistence::{column, first_row, json_column, StoreError, Transaction};

use super::models::{CreatedDrink, Drink, DrinkIngredient, NewDrink, NewDrinkIngredient};
use crate::error::{Error, Result, StorageContext};
use crate::ingredients::Ingredient;

pub(crate) const DRINK_COLUMNS: &str = "d.id, d.name, d.display_name, d.description, \
    d.instructions, \
    COALESCE(json_agg(json_build_object(\
        'name', i.name, 'displayName', i.display_name, 'measurement', di.measurement) \
        ORDER BY i.name) FILTER (WHERE i.id IS NOT NULL), '[]'::json) AS drink_ingredients";

pub(crate) const DRINK_JOINS: &str = "FROM drinks d \
    LEFT JOIN drink_ingredients di ON di.drink_id = d.id \
    LEFT JOIN ingredients i ON i.id = di.ingredient_id";

const RESOLVE_SQL: &str = "SELECT id, name FROM ingredients WHERE name = ANY($1)";
const INSERT_DRINK_SQL: &str = "INSERT INTO drinks (name, display_name, description, instructions) \
    VALUES ($1, $2, $3, $4) RETURNING id";
const INSERT_RECIPE_SQL: &str = "INSERT INTO drink_ingredients (drink_id, ingredient_id, measurement) \
    SELECT $1::int4, r.ingredient_id, r.measurement \
    FROM unnest($2::int4[], $3::text[]) AS r (ingredient_id, measurement)";

/// Recipe lines whose names matched an ingredient, and the names that did not.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct Resolution {
    pub(crate) lines: Vec<(Id<Ingredient>, String)>,
    pub(crate) unresolved: Vec<String>,
}

pub(crate) fn drink_from_row(row: &Row) -> Result<Drink> {
    let mut drink_ingredients: Vec<DrinkIngredient> = json_column(row, 5).storage()?;
    sort_recipe(&mut drink_ingredients);
    Ok(Drink {
        id: Id::from_raw(column(row, 0).storage()?),
        name: column(row, 1).storage()?,
        display_name: column(row, 2).storage()?,
        description: column(row, 3).storage()?,
        instructions: column(row, 4).storage()?,
        drink_ingredients,
    })
}

/// Recipes are ordered by ingredient name, then measurement.
pub(crate) fn sort_recipe(lines: &mut Vec<DrinkIngredient>) {
    lines.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.measurement.cmp(&b.measurement))
    });
}

/// Loads fully assembled drinks by id, keyed by id.
pub(crate) fn load_by_ids(
    t: &Transaction,
    ids: &[Id<Drink>],
) -> Result<HashMap<Id<Drink>, Drink>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let raw = ids.iter().map(Id::raw).collect::<Vec<i32>>();
    let sql = format!(
        "SELECT {} {} WHERE d.id = ANY($1) GROUP BY d.id",
        DRINK_COLUMNS, DRINK_JOINS
    );
    let rows = t.query(&sql, &[&raw]).storage()?;
    let mut drinks = HashMap::with_capacity(rows.len());
    for row in rows.iter() {
        let drink = drink_from_row(&row)?;
        drinks.insert(drink.id, drink);
    }
    Ok(drinks)
}

/// Reads back a drink written earlier in the same transaction. Its absence
/// is a store fault, not a lookup miss.
pub(crate) fn reload(t: &Transaction, id: Id<Drink>) -> Result<Drink> {
    take_written(load_by_ids(t, &[id])?, id)
}

fn take_written(mut found: HashMap<Id<Drink>, Drink>, id: Id<Drink>) -> Result<Drink> {
    found.remove(&id).ok_or(StoreError::MissingRow).storage()
}

/// Matches recipe lines against known ingredient ids. A name repeated
/// within one recipe keeps its first line.
pub(crate) fn resolve(
    lines: &[NewDrinkIngredient],
    known: &HashMap<String, Id<Ingredient>>,
) -> Resolution {
    let mut seen = BTreeSet::new();
    let mut resolution = Resolution::default();
    for line in lines {
        if !seen.insert(line.name.as_str()) {
            warn!("Ignoring repeated ingredient line: {:?}", line);
            continue;
        }
        match known.get(&line.name) {
            Some(id) => resolution.lines.push((*id, line.measurement.clone())),
            None => resolution.unresolved.push(line.name.clone()),
        }
    }
    resolution
}

fn known_ingredients(
    t: &Transaction,
    lines: &[NewDrinkIngredient],
) -> Result<HashMap<String, Id<Ingredient>>> {
    let names = lines
        .iter()
        .map(|l| l.name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();
    let rows = t.query(RESOLVE_SQL, &[&names]).storage()?;
    let mut known = HashMap::with_capacity(rows.len());
    for row in rows.iter() {
        let id: i32 = column(&row, 0).storage()?;
        let name: String = column(&row, 1).storage()?;
        known.insert(name, Id::from_raw(id));
    }
    Ok(known)
}

/// Inserts a validated drink and every resolvable recipe line. The caller
/// commits.
pub(crate) fn create(t: &Transaction, new: &NewDrink) -> Result<CreatedDrink> {
    let known = known_ingredients(t, &new.drink_ingredients)?;
    let Resolution { lines, unresolved } = resolve(&new.drink_ingredients, &known);
    if !unresolved.is_empty() {
        warn!(
            "Drink {:?}: unresolved ingredient names {:?}",
            new.name, unresolved
        );
    }

    let rows = t
        .query(
            INSERT_DRINK_SQL,
            &[
                &new.name,
                &new.display_name,
                &new.description(),
                &new.instructions,
            ],
        )
        .map_err(|e| {
            let e = StoreError::Postgres(e);
            if e.is_unique_violation() {
                Error::ValidationFailed(format!("drink {:?} already exists", new.name))
            } else {
                Error::StorageUnavailable(e)
            }
        })?;
    let raw_id: i32 = first_row(&rows)
        .and_then(|row| column(&row, 0))
        .storage()?;
    let id = Id::<Drink>::from_raw(raw_id);
    debug!("Inserted {} as {}", new.name, id);

    if !lines.is_empty() {
        let ingredient_ids = lines.iter().map(|(id, _)| id.raw()).collect::<Vec<i32>>();
        let measurements = lines.into_iter().map(|(_, m)| m).collect::<Vec<String>>();
        let n = t
            .execute(INSERT_RECIPE_SQL, &[&raw_id, &ingredient_ids, &measurements])
            .storage()?;
        debug!("Inserted {} recipe lines for {}", n, id);
    }

    let drink = reload(t, id)?;

    Ok(CreatedDrink { drink, unresolved })
}
