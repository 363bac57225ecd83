//! sled-backed persistence for the ledger.
//!
//! Each table lives in its own tree keyed by the big-endian row id, with rows
//! stored as JSON. The `meta` tree holds every table's id sequence.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Batch, Transactional, Tree};
use tracing::debug;

use crate::error::{AppError, Result};
use crate::ledger::{Changes, Id, Table, TableChanges, Tables};

const CUSTOMERS_TREE: &str = "customers";
const VEHICLES_TREE: &str = "vehicles";
const ORDERS_TREE: &str = "service_orders";
const PARTS_TREE: &str = "parts";
const USAGES_TREE: &str = "part_usages";
const META_TREE: &str = "meta";

/// Row-level ledger storage.
pub struct LedgerPersistence {
    db: sled::Db,
    customers: Tree,
    vehicles: Tree,
    orders: Tree,
    parts: Tree,
    usages: Tree,
    meta: Tree,
}

impl LedgerPersistence {
    /// Opens (or creates) the database at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Internal(format!("Failed to create directory: {}", e)))?;
        }

        let db = sled::open(path)
            .map_err(|e| AppError::Internal(format!("Failed to open ledger database: {}", e)))?;
        Self::with_db(db)
    }

    /// Throwaway database removed when dropped.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| AppError::Internal(format!("Failed to open ledger database: {}", e)))?;
        Self::with_db(db)
    }

    fn with_db(db: sled::Db) -> Result<Self> {
        let open_tree = |name: &str| {
            db.open_tree(name)
                .map_err(|e| AppError::Internal(format!("Failed to open tree {}: {}", name, e)))
        };
        let customers = open_tree(CUSTOMERS_TREE)?;
        let vehicles = open_tree(VEHICLES_TREE)?;
        let orders = open_tree(ORDERS_TREE)?;
        let parts = open_tree(PARTS_TREE)?;
        let usages = open_tree(USAGES_TREE)?;
        let meta = open_tree(META_TREE)?;

        Ok(Self {
            db,
            customers,
            vehicles,
            orders,
            parts,
            usages,
            meta,
        })
    }

    /// Reads every stored row. An empty database yields empty tables.
    pub fn load(&self) -> Result<Tables> {
        Ok(Tables {
            customers: self.load_table(&self.customers, CUSTOMERS_TREE)?,
            vehicles: self.load_table(&self.vehicles, VEHICLES_TREE)?,
            orders: self.load_table(&self.orders, ORDERS_TREE)?,
            parts: self.load_table(&self.parts, PARTS_TREE)?,
            usages: self.load_table(&self.usages, USAGES_TREE)?,
        })
    }

    fn load_table<T: DeserializeOwned + Clone>(&self, tree: &Tree, name: &str) -> Result<Table<T>> {
        let mut rows = BTreeMap::new();
        for item in tree.iter() {
            let (key, value) = item
                .map_err(|e| AppError::Internal(format!("Failed to read {}: {}", name, e)))?;
            let id = decode_id(&key)?;
            let row = serde_json::from_slice(&value).map_err(|e| {
                AppError::Internal(format!("Failed to deserialize {} row {}: {}", name, id, e))
            })?;
            rows.insert(id, row);
        }

        let last_id = match self
            .meta
            .get(name)
            .map_err(|e| AppError::Internal(format!("Failed to read ledger meta: {}", e)))?
        {
            Some(bytes) => decode_id(&bytes)?,
            None => 0,
        };
        Ok(Table::from_rows(rows, last_id))
    }

    /// Writes the changed rows and id sequences in one sled transaction,
    /// then flushes to disk.
    pub fn commit(&self, changes: &Changes<'_>) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut meta = Batch::default();
        let customers = table_batch(&changes.customers, CUSTOMERS_TREE, &mut meta)?;
        let vehicles = table_batch(&changes.vehicles, VEHICLES_TREE, &mut meta)?;
        let orders = table_batch(&changes.orders, ORDERS_TREE, &mut meta)?;
        let parts = table_batch(&changes.parts, PARTS_TREE, &mut meta)?;
        let usages = table_batch(&changes.usages, USAGES_TREE, &mut meta)?;

        (
            &self.customers,
            &self.vehicles,
            &self.orders,
            &self.parts,
            &self.usages,
            &self.meta,
        )
            .transaction(|(customers_tx, vehicles_tx, orders_tx, parts_tx, usages_tx, meta_tx)| {
                customers_tx.apply_batch(&customers)?;
                vehicles_tx.apply_batch(&vehicles)?;
                orders_tx.apply_batch(&orders)?;
                parts_tx.apply_batch(&parts)?;
                usages_tx.apply_batch(&usages)?;
                meta_tx.apply_batch(&meta)?;
                Ok::<(), ConflictableTransactionError<()>>(())
            })
            .map_err(|e: TransactionError<()>| {
                AppError::Internal(format!("Failed to save ledger: {:?}", e))
            })?;

        self.db
            .flush()
            .map_err(|e| AppError::Internal(format!("Failed to flush ledger: {}", e)))?;

        debug!("Ledger commit flushed");
        Ok(())
    }
}

/// Builds the row batch for one table and records its id sequence in `meta`.
fn table_batch<T: Serialize>(
    changes: &TableChanges<'_, T>,
    name: &str,
    meta: &mut Batch,
) -> Result<Batch> {
    let mut batch = Batch::default();
    for (id, row) in &changes.rows {
        let key = id.to_be_bytes().to_vec();
        match row {
            Some(row) => {
                let value = serde_json::to_vec(row).map_err(|e| {
                    AppError::Internal(format!("Failed to serialize {} row {}: {}", name, id, e))
                })?;
                batch.insert(key, value);
            }
            None => batch.remove(key),
        }
    }
    if !changes.is_empty() {
        meta.insert(name, changes.last_id.to_be_bytes().to_vec());
    }
    Ok(batch)
}

fn decode_id(bytes: &[u8]) -> Result<Id> {
    let bytes: [u8; 8] = bytes
        .try_into()
        .map_err(|_| AppError::Internal("Corrupt ledger key".to_string()))?;
    Ok(Id::from_be_bytes(bytes))
}
