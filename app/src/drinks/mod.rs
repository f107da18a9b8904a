use log::*;

use infra::ids::Id;

use crate::error::{Error, Result, StorageContext};
use crate::ingredients::Ingredient;
use crate::services::{Commandable, Queryable, Request, Store};

mod assembly;
mod filter;
mod matcher;
mod models;

pub use self::filter::{DrinkFilter, DrinkPredicate, FilterFields, Page, DEFAULT_LIMIT};
pub use self::matcher::MatchMode;
pub use self::models::{
    CreatedDrink, Drink, DrinkIngredient, IngredientList, IngredientRef, MatchedDrink, NewDrink,
    NewDrinkIngredient,
};

/// Lists drinks matching a filter, by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDrinks(pub DrinkFilter);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowDrink(pub Id<Drink>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDrink(pub NewDrink);

/// Finds drinks makeable from the offered ingredients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateDrinks {
    pub ingredients: Vec<Id<Ingredient>>,
    pub mode: MatchMode,
}

#[derive(Debug, Clone)]
pub struct Drinks {
    store: Store,
}

impl Drinks {
    pub(crate) fn new(store: Store) -> Self {
        Drinks { store }
    }
}

impl GenerateDrinks {
    pub fn from_list(list: &IngredientList, mode: MatchMode) -> Self {
        let ingredients = list.ingredients.iter().map(|i| i.id).collect();
        GenerateDrinks { ingredients, mode }
    }
}

impl Request for ListDrinks {
    type Resp = Vec<Drink>;
}

impl Request for ShowDrink {
    type Resp = Drink;
}

impl Request for CreateDrink {
    type Resp = CreatedDrink;
}

impl Request for GenerateDrinks {
    type Resp = Vec<MatchedDrink>;
}

impl Queryable<ListDrinks> for Drinks {
    fn query(&self, ListDrinks(filter): ListDrinks) -> Result<Vec<Drink>> {
        debug!("List drinks: {:?}", filter);
        let stmt = filter.to_statement();
        trace!("Query: {}", stmt.sql);
        self.store.read(|t| {
            let rows = t.query(&stmt.sql, &stmt.params()).storage()?;
            rows.iter()
                .map(|row| assembly::drink_from_row(&row))
                .collect::<Result<Vec<_>>>()
        })
    }
}

impl Queryable<ShowDrink> for Drinks {
    fn query(&self, ShowDrink(id): ShowDrink) -> Result<Drink> {
        let res = self
            .store
            .read(|t| assembly::load_by_ids(t, &[id]))?
            .remove(&id);
        debug!("Load {} -> {:?}", id, res);
        res.ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

impl Commandable<CreateDrink> for Drinks {
    fn execute(&self, CreateDrink(new): CreateDrink) -> Result<CreatedDrink> {
        new.validate()?;
        let created = self.store.write(|t| assembly::create(t, &new))?;
        info!(
            "Created {} ({}) with {} ingredient(s)",
            created.drink.id,
            created.drink.name,
            created.drink.drink_ingredients.len()
        );
        Ok(created)
    }
}

impl Queryable<GenerateDrinks> for Drinks {
    fn query(&self, req: GenerateDrinks) -> Result<Vec<MatchedDrink>> {
        debug!("Generate drinks: {:?}", req);
        let GenerateDrinks { ingredients, mode } = req;
        if ingredients.is_empty() {
            return Ok(Vec::new());
        }
        self.store
            .read(|t| matcher::generate(t, ingredients, mode))
    }
}
