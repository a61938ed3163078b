//! Postgres-backed inventory store.
//!
//! ## Atomicity
//!
//! `apply_entry` runs one transaction per entry:
//!
//! 1. `SELECT … FOR UPDATE` on the product's `stock_balances` row
//! 2. `project` the entry onto the locked balance (oversells stop here)
//! 3. `INSERT` the ledger entry and `UPDATE` the balance
//! 4. `COMMIT`
//!
//! Concurrent writers for the same product queue on the row lock, so the
//! stock check always sees the latest committed quantity.
//!
//! ## Error Mapping
//!
//! | SQLx error | Code | StoreError |
//! |---|---|---|
//! | Database (unique violation on live SKU) | `23505` | `DuplicateSku` |
//! | Database (unique violation on category name) | `23505` | `DuplicateCategory` |
//! | Database (foreign key on product category) | `23503` | `UnknownCategory` |
//! | Database (other) | any | `Database` |
//! | PoolClosed / other | n/a | `Database` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use stockbook_core::{CategoryId, EntryId, Money, ProductId, UserId};
use stockbook_inventory::{
    Category, EntryType, LedgerEntry, LedgerError, Product, StockBalance, StockDirection, project,
};

use super::{EntryFilter, InventoryStore, ProductFilter, Recorded, StockedProduct, StoreError};

/// Schema applied by [`PostgresInventoryStore::migrate`].
pub const SCHEMA: &str = include_str!("../../migrations/0001_inventory.sql");

const PRODUCT_COLUMNS: &str = r#"
    p.id, p.sku, p.name, p.description, p.category_id,
    p.purchase_price_cents, p.selling_price_cents, p.reorder_level, p.unit,
    p.is_active, p.created_at, p.updated_at, p.deleted_at,
    b.quantity, b.reserved_quantity, b.unit_cost_cents, b.total_value_cents,
    b.last_restocked_at, b.version, b.updated_at AS balance_updated_at
"#;

const ENTRY_COLUMNS: &str = r#"
    id, product_id, entry_type, direction, quantity, unit_price_cents,
    total_amount_cents, actor_id, notes, reference_number, created_at
"#;

#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: Arc<PgPool>,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    /// Lock a live product's balance row for the rest of the transaction.
    async fn lock_stocked(
        tx: &mut Transaction<'_, Postgres>,
        id: ProductId,
    ) -> Result<Option<StockedProduct>, StoreError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM stock_balances b
             JOIN products p ON p.id = b.product_id
             WHERE b.product_id = $1 AND p.deleted_at IS NULL
             FOR UPDATE OF b"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("lock_balance", e))?;

        row.as_ref().map(stocked_from_row).transpose()
    }

    async fn write_balance(
        tx: &mut Transaction<'_, Postgres>,
        balance: &StockBalance,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE stock_balances
            SET quantity = $2,
                reserved_quantity = $3,
                unit_cost_cents = $4,
                total_value_cents = $5,
                last_restocked_at = $6,
                version = $7,
                updated_at = $8
            WHERE product_id = $1
            "#,
        )
        .bind(balance.product_id.as_uuid())
        .bind(balance.quantity)
        .bind(balance.reserved_quantity)
        .bind(balance.unit_cost.minor())
        .bind(balance.total_value.minor())
        .bind(balance.last_restocked_at)
        .bind(balance.version as i64)
        .bind(balance.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("update_balance", e))?;
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip(self, product, balance), fields(product_id = %product.id, sku = %product.sku), err)]
    async fn insert_product(&self, product: Product, balance: StockBalance) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, description, category_id,
                purchase_price_cents, selling_price_cents, reorder_level, unit,
                is_active, created_at, updated_at, deleted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.category_id.map(Uuid::from))
        .bind(product.purchase_price.minor())
        .bind(product.selling_price.minor())
        .bind(product.reorder_level)
        .bind(&product.unit)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .bind(product.deleted_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateSku(product.sku.clone())
            } else if let (true, Some(id)) = (is_foreign_key_violation(&e), product.category_id) {
                StoreError::UnknownCategory(id)
            } else {
                map_sqlx_error("insert_product", e)
            }
        })?;

        sqlx::query(
            r#"
            INSERT INTO stock_balances (
                product_id, quantity, reserved_quantity, unit_cost_cents,
                total_value_cents, last_restocked_at, version, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(balance.product_id.as_uuid())
        .bind(balance.quantity)
        .bind(balance.reserved_quantity)
        .bind(balance.unit_cost.minor())
        .bind(balance.total_value.minor())
        .bind(balance.last_restocked_at)
        .bind(balance.version as i64)
        .bind(balance.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_balance", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn update_product(&self, product: Product) -> Result<StockedProduct, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let Some(current) = Self::lock_stocked(&mut tx, product.id).await? else {
            return Err(StoreError::NotFound);
        };

        sqlx::query(
            r#"
            UPDATE products
            SET sku = $2, name = $3, description = $4, category_id = $5,
                purchase_price_cents = $6, selling_price_cents = $7,
                reorder_level = $8, unit = $9, is_active = $10, updated_at = $11
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.category_id.map(Uuid::from))
        .bind(product.purchase_price.minor())
        .bind(product.selling_price.minor())
        .bind(product.reorder_level)
        .bind(&product.unit)
        .bind(product.is_active)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateSku(product.sku.clone())
            } else if let (true, Some(id)) = (is_foreign_key_violation(&e), product.category_id) {
                StoreError::UnknownCategory(id)
            } else {
                map_sqlx_error("update_product", e)
            }
        })?;

        let balance = current
            .balance
            .revalue(product.purchase_price, product.updated_at)?;
        Self::write_balance(&mut tx, &balance).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(StockedProduct { product, balance })
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn soft_delete_product(&self, id: ProductId, at: DateTime<Utc>) -> Result<Product, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let Some(current) = Self::lock_stocked(&mut tx, id).await? else {
            return Err(StoreError::NotFound);
        };
        let deleted = current
            .product
            .soft_deleted(at)
            .map_err(|_| StoreError::NotFound)?;

        sqlx::query("UPDATE products SET deleted_at = $2, updated_at = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("soft_delete_product", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(deleted)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<StockedProduct>, StoreError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM products p
             JOIN stock_balances b ON b.product_id = p.id
             WHERE p.id = $1 AND p.deleted_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;

        row.as_ref().map(stocked_from_row).transpose()
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<StockedProduct>, StoreError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM products p
             JOIN stock_balances b ON b.product_id = p.id
             WHERE p.deleted_at IS NULL
               AND ($1 OR p.is_active)
               AND ($2::uuid IS NULL OR p.category_id = $2)
               AND ($3::text IS NULL OR p.name ILIKE $3 OR p.sku ILIKE $3)
             ORDER BY LOWER(p.name), p.sku"
        );
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));

        let rows = sqlx::query(&sql)
            .bind(filter.include_inactive)
            .bind(filter.category_id.map(Uuid::from))
            .bind(pattern)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter().map(stocked_from_row).collect()
    }

    async fn insert_category(&self, category: Category) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO categories (id, name, description, created_at) VALUES ($1, $2, $3, $4)")
            .bind(category.id.as_uuid())
            .bind(&category.name)
            .bind(&category.description)
            .bind(category.created_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateCategory(category.name.clone())
                } else {
                    map_sqlx_error("insert_category", e)
                }
            })?;
        Ok(())
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query("SELECT id, name, description, created_at FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_category", e))?;

        row.as_ref().map(category_from_row).transpose()
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query("SELECT id, name, description, created_at FROM categories ORDER BY LOWER(name)")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_categories", e))?;

        rows.iter().map(category_from_row).collect()
    }

    async fn update_category(&self, category: Category) -> Result<Category, StoreError> {
        let result = sqlx::query("UPDATE categories SET name = $2, description = $3 WHERE id = $1")
            .bind(category.id.as_uuid())
            .bind(&category.name)
            .bind(&category.description)
            .execute(&*self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateCategory(category.name.clone())
                } else {
                    map_sqlx_error("update_category", e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(category)
    }

    /// Products lose their category through `ON DELETE SET NULL`.
    async fn delete_category(&self, id: CategoryId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_category", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(
        skip(self, entry),
        fields(
            product_id = %entry.product_id,
            entry_type = %entry.entry_type,
            quantity = entry.quantity
        ),
        err
    )]
    async fn apply_entry(&self, entry: LedgerEntry) -> Result<Recorded, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let Some(current) = Self::lock_stocked(&mut tx, entry.product_id).await? else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(LedgerError::ProductNotFound(entry.product_id).into());
        };

        let entry = entry.stamped(current.balance.next_entry_time(Utc::now()));
        let next = match project(&current.balance, &entry) {
            Ok(next) => next,
            Err(err) => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(err.into());
            }
        };

        sqlx::query(&format!(
            "INSERT INTO ledger_entries ({ENTRY_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(entry.id.as_uuid())
        .bind(entry.product_id.as_uuid())
        .bind(entry.entry_type.as_str())
        .bind(entry.direction.as_str())
        .bind(entry.quantity)
        .bind(entry.unit_price.minor())
        .bind(entry.total_amount.minor())
        .bind(entry.actor.as_uuid())
        .bind(&entry.notes)
        .bind(&entry.reference_number)
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_entry", e))?;

        Self::write_balance(&mut tx, &next).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(Recorded { entry, balance: next })
    }

    async fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<LedgerEntry>, StoreError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS}
             FROM ledger_entries
             WHERE ($1::text IS NULL OR entry_type = $1)
               AND ($2::uuid IS NULL OR product_id = $2)
               AND ($3::timestamptz IS NULL OR created_at >= $3)
               AND ($4::timestamptz IS NULL OR created_at < $4)
             ORDER BY created_at DESC, id DESC
             LIMIT $5"
        );
        let rows = sqlx::query(&sql)
            .bind(filter.entry_type.map(|t| t.as_str()))
            .bind(filter.product_id.map(Uuid::from))
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.limit.map(|l| l as i64))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_entries", e))?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn product_history(&self, id: ProductId) -> Result<Option<(StockBalance, Vec<LedgerEntry>)>, StoreError> {
        // One snapshot for balance and entries.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM products p
             JOIN stock_balances b ON b.product_id = p.id
             WHERE p.id = $1 AND p.deleted_at IS NULL"
        );
        let Some(row) = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("product_history", e))?
        else {
            return Ok(None);
        };
        let stocked = stocked_from_row(&row)?;

        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE product_id = $1 ORDER BY created_at, id"
        ))
        .bind(id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("product_history", e))?;
        let entries = rows.iter().map(entry_from_row).collect::<Result<Vec<_>, _>>()?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(Some((stocked.balance, entries)))
    }

    async fn sum_amount(&self, filter: &EntryFilter) -> Result<Money, StoreError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total_amount_cents), 0)::BIGINT
            FROM ledger_entries
            WHERE ($1::text IS NULL OR entry_type = $1)
              AND ($2::uuid IS NULL OR product_id = $2)
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at < $4)
            "#,
        )
        .bind(filter.entry_type.map(|t| t.as_str()))
        .bind(filter.product_id.map(Uuid::from))
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("sum_amount", e))?;

        Ok(Money::from_minor(total))
    }
}

fn corrupt(what: &str, err: impl core::fmt::Display) -> StoreError {
    StoreError::Database(format!("failed to decode {what}: {err}"))
}

fn stocked_from_row(row: &PgRow) -> Result<StockedProduct, StoreError> {
    let decode = |e: sqlx::Error| corrupt("product row", e);

    let id = ProductId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode)?);
    let product = Product {
        id,
        sku: row.try_get("sku").map_err(decode)?,
        name: row.try_get("name").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        category_id: row
            .try_get::<Option<Uuid>, _>("category_id")
            .map_err(decode)?
            .map(CategoryId::from_uuid),
        purchase_price: Money::from_minor(row.try_get("purchase_price_cents").map_err(decode)?),
        selling_price: Money::from_minor(row.try_get("selling_price_cents").map_err(decode)?),
        reorder_level: row.try_get("reorder_level").map_err(decode)?,
        unit: row.try_get("unit").map_err(decode)?,
        is_active: row.try_get("is_active").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
        deleted_at: row.try_get("deleted_at").map_err(decode)?,
    };
    let balance = StockBalance {
        product_id: id,
        quantity: row.try_get("quantity").map_err(decode)?,
        reserved_quantity: row.try_get("reserved_quantity").map_err(decode)?,
        unit_cost: Money::from_minor(row.try_get("unit_cost_cents").map_err(decode)?),
        total_value: Money::from_minor(row.try_get("total_value_cents").map_err(decode)?),
        last_restocked_at: row.try_get("last_restocked_at").map_err(decode)?,
        version: row.try_get::<i64, _>("version").map_err(decode)? as u64,
        updated_at: row.try_get("balance_updated_at").map_err(decode)?,
    };

    Ok(StockedProduct { product, balance })
}

fn entry_from_row(row: &PgRow) -> Result<LedgerEntry, StoreError> {
    let decode = |e: sqlx::Error| corrupt("ledger entry", e);

    let entry_type: EntryType = row
        .try_get::<String, _>("entry_type")
        .map_err(decode)?
        .parse()
        .map_err(|e| corrupt("ledger entry", e))?;
    let direction: StockDirection = row
        .try_get::<String, _>("direction")
        .map_err(decode)?
        .parse()
        .map_err(|e| corrupt("ledger entry", e))?;

    Ok(LedgerEntry {
        id: EntryId::from_uuid(row.try_get("id").map_err(decode)?),
        product_id: ProductId::from_uuid(row.try_get("product_id").map_err(decode)?),
        entry_type,
        direction,
        quantity: row.try_get("quantity").map_err(decode)?,
        unit_price: Money::from_minor(row.try_get("unit_price_cents").map_err(decode)?),
        total_amount: Money::from_minor(row.try_get("total_amount_cents").map_err(decode)?),
        actor: UserId::from_uuid(row.try_get("actor_id").map_err(decode)?),
        notes: row.try_get("notes").map_err(decode)?,
        reference_number: row.try_get("reference_number").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

fn category_from_row(row: &PgRow) -> Result<Category, StoreError> {
    let decode = |e: sqlx::Error| corrupt("category row", e);

    Ok(Category {
        id: CategoryId::from_uuid(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

/// Escape `%`, `_` and `\` for use inside an `ILIKE` pattern.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => StoreError::Database(format!(
            "database error in {}: {} (code {})",
            operation,
            db_err.message(),
            db_err.code().as_deref().unwrap_or("unknown")
        )),
        sqlx::Error::PoolClosed => StoreError::Database(format!("connection pool closed in {operation}")),
        sqlx::Error::RowNotFound => StoreError::NotFound,
        other => StoreError::Database(format!("sqlx error in {operation}: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    has_sql_state(err, "23505")
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    has_sql_state(err, "23503")
}

fn has_sql_state(err: &sqlx::Error, code: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(code),
        _ => false,
    }
}
