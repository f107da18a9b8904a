use log::*;
use postgres::types::ToSql;
use serde::{Deserialize, Serialize};

use infra::ids::{Entity, Id};
use infra::persistence::{column, Transaction};

use crate::error::{Error, Result, StorageContext};
use crate::services::{Commandable, Queryable, Request, Store};

const LIST_SQL: &str = "SELECT id, name, display_name FROM ingredients ORDER BY name COLLATE \"C\"";
const SHOW_SQL: &str = "SELECT id, name, display_name FROM ingredients WHERE id = $1";
const INSERT_SQL: &str = "INSERT INTO ingredients (name, display_name) VALUES ($1, $2) \
    ON CONFLICT (name) DO NOTHING RETURNING id";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub id: Id<Ingredient>,
    pub name: String,
    pub display_name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewIngredient {
    pub name: String,
    pub display_name: String,
}

/// What a bulk import did: the rows it added, and the names it skipped
/// because they were already in the catalog.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportReport {
    pub created: Vec<Ingredient>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListIngredients;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowIngredient(pub Id<Ingredient>);

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportIngredients {
    pub ingredients: Vec<NewIngredient>,
}

#[derive(Debug, Clone)]
pub struct Ingredients {
    store: Store,
}

impl Entity for Ingredient {
    const PREFIX: &'static str = "ingredient";
}

impl NewIngredient {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.display_name.trim().is_empty() {
            return Err(Error::ValidationFailed(format!(
                "ingredient needs a name and displayName: {:?}",
                self
            )));
        }
        Ok(())
    }
}

impl Ingredients {
    pub(crate) fn new(store: Store) -> Self {
        Ingredients { store }
    }
}

fn load(t: &Transaction, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<Ingredient>> {
    let rows = t.query(sql, params).storage()?;
    let mut ingredients = Vec::with_capacity(rows.len());
    for row in rows.iter() {
        ingredients.push(Ingredient {
            id: Id::from_raw(column(&row, 0).storage()?),
            name: column(&row, 1).storage()?,
            display_name: column(&row, 2).storage()?,
        });
    }
    Ok(ingredients)
}

fn import(t: &Transaction, batch: Vec<NewIngredient>) -> Result<ImportReport> {
    let mut report = ImportReport::default();
    for NewIngredient { name, display_name } in batch {
        let rows = t.query(INSERT_SQL, &[&name, &display_name]).storage()?;
        match rows.iter().next() {
            Some(row) => {
                let id = Id::from_raw(column(&row, 0).storage()?);
                trace!("Inserted {} as {}", name, id);
                report.created.push(Ingredient {
                    id,
                    name,
                    display_name,
                });
            }
            None => {
                debug!("Ingredient {:?} already present", name);
                report.skipped.push(name);
            }
        }
    }
    Ok(report)
}

impl Request for ListIngredients {
    type Resp = Vec<Ingredient>;
}

impl Request for ShowIngredient {
    type Resp = Ingredient;
}

impl Request for ImportIngredients {
    type Resp = ImportReport;
}

impl Queryable<ListIngredients> for Ingredients {
    fn query(&self, _: ListIngredients) -> Result<Vec<Ingredient>> {
        self.store.read(|t| load(t, LIST_SQL, &[]))
    }
}

impl Queryable<ShowIngredient> for Ingredients {
    fn query(&self, ShowIngredient(id): ShowIngredient) -> Result<Ingredient> {
        let raw = id.raw();
        let res = self.store.read(|t| load(t, SHOW_SQL, &[&raw]))?;
        debug!("Load {} -> {:?}", id, res);
        res.into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

impl Commandable<ImportIngredients> for Ingredients {
    fn execute(
        &self,
        ImportIngredients { ingredients }: ImportIngredients,
    ) -> Result<ImportReport> {
        for ingredient in ingredients.iter() {
            ingredient.validate()?;
        }
        let report = self.store.write(|t| import(t, ingredients))?;
        info!(
            "Imported {} ingredient(s), skipped {}",
            report.created.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn blank_names_fail_validation() {
        let blank = NewIngredient {
            name: " ".into(),
            display_name: "Lime".into(),
        };

        match blank.validate() {
            Err(Error::ValidationFailed(_)) => {}
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn import_request_uses_camel_case() {
        let json = r#"{"ingredients": [{"name": "lime", "displayName": "Lime"}]}"#;

        let req: ImportIngredients = serde_json::from_str(json).expect("decode");

        assert_eq!(
            req.ingredients,
            vec![NewIngredient {
                name: "lime".into(),
                display_name: "Lime".into(),
            }]
        );
    }

    #[test]
    fn ingredient_ids_display_with_prefix() {
        assert_eq!(Id::<Ingredient>::from_raw(5).to_string(), "ingredient-5");
    }
}
