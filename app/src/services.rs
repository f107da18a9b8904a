use log::*;
use r2d2::Pool;

use infra::persistence::{CatalogConnectionManager, Transaction};

use crate::error::{Result, StorageContext};

pub trait Request {
    type Resp;
}

pub trait Queryable<Req>
where
    Req: Request,
{
    fn query(&self, req: Req) -> Result<Req::Resp>;
}

pub trait Commandable<Req>
where
    Req: Request,
{
    fn execute(&self, req: Req) -> Result<Req::Resp>;
}

/// Runs units of work against a pooled connection, one transaction each.
#[derive(Debug, Clone)]
pub(crate) struct Store {
    db: Pool<CatalogConnectionManager>,
}

impl Store {
    pub(crate) fn new(db: Pool<CatalogConnectionManager>) -> Self {
        Store { db }
    }

    pub(crate) fn setup(&self) -> Result<()> {
        self.db.get().storage()?.setup().storage()
    }

    /// Runs `f` in a transaction that is always rolled back.
    pub(crate) fn read<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let conn = self.db.get().storage()?;
        let t = conn.begin().storage()?;
        f(&t)
    }

    /// Runs `f` in a transaction that commits only when `f` succeeds.
    pub(crate) fn write<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let conn = self.db.get().storage()?;
        let t = conn.begin().storage()?;
        let res = f(&t)?;
        t.commit().storage()?;
        trace!("committed");
        Ok(res)
    }
}
