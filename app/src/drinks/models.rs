use serde::{Deserialize, Serialize};

use infra::ids::{Entity, Id};

use crate::error::{Error, Result};
use crate::ingredients::Ingredient;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Drink {
    pub id: Id<Drink>,
    pub name: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub instructions: String,
    pub drink_ingredients: Vec<DrinkIngredient>,
}

/// One line of a recipe, as read back from the store.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct DrinkIngredient {
    pub name: String,
    pub display_name: String,
    pub measurement: String,
}

/// A drink together with how much of it the caller's ingredients cover.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchedDrink {
    #[serde(flatten)]
    pub drink: Drink,
    pub ingredients_present: usize,
    pub total_ingredients: usize,
    pub missing_ingredients: usize,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewDrink {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub instructions: String,
    pub drink_ingredients: Vec<NewDrinkIngredient>,
}

/// A recipe line naming its ingredient by `name`, not id.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NewDrinkIngredient {
    pub name: String,
    pub measurement: String,
}

/// Outcome of a create: the stored drink, plus every ingredient name that
/// did not match a known ingredient and so was left off the recipe.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreatedDrink {
    pub drink: Drink,
    pub unresolved: Vec<String>,
}

/// The body of a generate request. Only the ids are looked at.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct IngredientList {
    pub ingredients: Vec<IngredientRef>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IngredientRef {
    pub id: Id<Ingredient>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl NewDrink {
    pub(crate) fn validate(&self) -> Result<()> {
        let required = [
            ("name", &self.name),
            ("displayName", &self.display_name),
            ("instructions", &self.instructions),
        ];
        let missing = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| *field)
            .collect::<Vec<_>>();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::ValidationFailed(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )))
        }
    }

    /// Empty descriptions are stored as absent.
    pub(crate) fn description(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.is_empty())
    }
}

impl Entity for Drink {
    const PREFIX: &'static str = "drink";
}
