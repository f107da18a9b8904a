//! Cocktail catalog: drinks, their recipes, and which drinks a given shelf
//! of ingredients can make.

use log::*;
use r2d2::Pool;

use infra::persistence::CatalogConnectionManager;

pub mod config;
pub mod drinks;
pub mod error;
pub mod ingredients;
pub mod services;

#[cfg(test)]
mod test;

use crate::services::Store;

#[derive(Debug, Clone)]
pub struct Barback {
    store: Store,
}

impl Barback {
    pub fn new(config: &config::Config) -> anyhow::Result<Self> {
        let db = config.postgres.build()?;
        Ok(Barback::from_pool(db))
    }

    pub(crate) fn from_pool(db: Pool<CatalogConnectionManager>) -> Self {
        let store = Store::new(db);
        Barback { store }
    }

    /// Creates the catalog tables. Safe to run repeatedly.
    pub fn setup(&self) -> error::Result<()> {
        info!("Setting up catalog schema");
        self.store.setup()
    }

    pub fn drinks(&self) -> drinks::Drinks {
        drinks::Drinks::new(self.store.clone())
    }

    pub fn ingredients(&self) -> ingredients::Ingredients {
        ingredients::Ingredients::new(self.store.clone())
    }
}
