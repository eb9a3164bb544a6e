//! Postgres-backed retail store.
//!
//! Every `commit` runs inside one SQL transaction with a `statement_timeout`
//! set for that transaction only. Any failure rolls the transaction back, so
//! a sale row never exists without its stock decrements and vice versa.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate id, duplicate phone, concurrent insert |
//! | Database (deadlock, serialization failure) | `40P01`, `40001` | `Conflict` | Aborted by a concurrent transaction; safe to retry |
//! | Database (query canceled) | `57014` | `Timeout` | `statement_timeout` expired |
//! | Database (other) | Any other | `Unavailable` | Other database errors |
//! | PoolTimedOut | N/A | `Timeout` | No connection available in time |
//! | PoolClosed | N/A | `Unavailable` | Connection pool was closed |
//! | Other | N/A | `Unavailable` | Network errors, connection failures, etc. |
//!
//! ## Runtime bridge
//!
//! [`RetailStore`] is synchronous. Calls are driven on the ambient tokio
//! runtime: from a multi-thread runtime (including inside one of its tasks)
//! through `block_in_place`; from a current-thread runtime they fail with
//! `Unavailable`, since blocking its only worker would stall the query.
//!
//! Sales, customers and promotions are stored as JSONB documents next to the
//! columns used for filtering. Products are fully columnar because their
//! stock counter is updated in place.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Span, instrument};

use storeline_catalog::{Product, ProductId};
use storeline_core::{AggregateId, ExpectedVersion, Money};
use storeline_customers::{Customer, CustomerId};
use storeline_insights::Promotion;
use storeline_sales::{Sale, SaleId};

use super::filter::SaleFilter;
use super::r#trait::{RetailStore, StoreError, WriteOp};

/// Tables and indexes, applied by [`PostgresRetailStore::migrate`].
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        price_cents BIGINT NOT NULL CHECK (price_cents >= 0),
        stock BIGINT NOT NULL,
        low_stock_threshold BIGINT NOT NULL,
        version BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS products_name_idx ON products (name)",
    r#"
    CREATE TABLE IF NOT EXISTS sales (
        id UUID PRIMARY KEY,
        customer_id UUID NULL,
        seller_id TEXT NULL,
        total_cents BIGINT NOT NULL,
        idempotency_key TEXT NULL UNIQUE,
        recorded_at TIMESTAMPTZ NOT NULL,
        document JSONB NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS sales_recorded_at_idx ON sales (recorded_at)",
    "CREATE INDEX IF NOT EXISTS sales_customer_idx ON sales (customer_id, recorded_at)",
    "CREATE INDEX IF NOT EXISTS sales_seller_idx ON sales (seller_id, recorded_at)",
    r#"
    CREATE TABLE IF NOT EXISTS customers (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        phone TEXT NOT NULL UNIQUE,
        email TEXT NULL,
        version BIGINT NOT NULL,
        document JSONB NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS customers_email_idx ON customers (email)",
    r#"
    CREATE TABLE IF NOT EXISTS promotions (
        id UUID PRIMARY KEY,
        customer_id UUID NOT NULL,
        generated_at TIMESTAMPTZ NOT NULL,
        document JSONB NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS promotions_customer_idx ON promotions (customer_id, generated_at)",
];

/// Postgres-backed retail store.
///
/// ## Thread Safety
///
/// Uses the SQLx connection pool, which is `Send + Sync`. The synchronous
/// [`RetailStore`] impl needs an ambient multi-thread tokio runtime; see the
/// module docs.
#[derive(Debug, Clone)]
pub struct PostgresRetailStore {
    pool: Arc<PgPool>,
    commit_timeout: Duration,
}

impl PostgresRetailStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            commit_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout = timeout;
        self
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }

    /// Apply a batch of writes in a single transaction.
    #[instrument(
        skip(self, ops),
        fields(op_count = ops.len(), applied = tracing::field::Empty),
        err
    )]
    pub async fn commit_ops(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // SET cannot take bind parameters; the value is an integer we format.
        let timeout_ms = self.commit_timeout.as_millis().max(1);
        sqlx::query(&format!("SET LOCAL statement_timeout = {timeout_ms}"))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_statement_timeout", e))?;

        let mut applied = 0usize;
        for op in ops {
            let kind = op.kind();
            if let Err(err) = apply_op(&mut tx, op).await {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                tracing::debug!(op = kind, applied, error = %err, "commit rolled back");
                return Err(err);
            }
            applied += 1;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("applied", applied);
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    pub async fn load_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(*id.0.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_product", e))?;

        row.map(|r| product_from_row(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    pub async fn load_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name ASC, id ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), fields(sale_id = %id), err)]
    pub async fn load_sale(&self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        let row = sqlx::query("SELECT document FROM sales WHERE id = $1")
            .bind(*id.0.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_sale", e))?;

        row.map(|r| document_from_row(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    pub async fn load_sale_by_key(&self, key: &str) -> Result<Option<Sale>, StoreError> {
        let row = sqlx::query("SELECT document FROM sales WHERE idempotency_key = $1")
            .bind(key)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_sale_by_key", e))?;

        row.map(|r| document_from_row(&r)).transpose()
    }

    #[instrument(skip(self), fields(sale_count = tracing::field::Empty), err)]
    pub async fn query_sales(&self, filter: &SaleFilter) -> Result<Vec<Sale>, StoreError> {
        let customer_param = filter.customer_id.map(|id| *id.0.as_uuid());
        let seller_param = filter.seller_id.as_ref().map(|s| s.as_str().to_string());

        let rows = sqlx::query(
            r#"
            SELECT document
            FROM sales
            WHERE ($1::uuid IS NULL OR customer_id = $1)
                AND ($2::text IS NULL OR seller_id = $2)
                AND ($3::timestamptz IS NULL OR recorded_at >= $3)
                AND ($4::timestamptz IS NULL OR recorded_at < $4)
            ORDER BY recorded_at ASC, id ASC
            "#,
        )
        .bind(customer_param)
        .bind(seller_param)
        .bind(filter.since)
        .bind(filter.until)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("query_sales", e))?;

        let sales: Vec<Sale> = rows
            .iter()
            .map(document_from_row)
            .collect::<Result<_, _>>()?;
        Span::current().record("sale_count", sales.len());
        Ok(sales)
    }

    #[instrument(skip(self), fields(customer_id = %id), err)]
    pub async fn load_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query("SELECT document FROM customers WHERE id = $1")
            .bind(*id.0.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_customer", e))?;

        row.map(|r| document_from_row(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    pub async fn load_customer_where(
        &self,
        column: CustomerKey,
        value: &str,
    ) -> Result<Option<Customer>, StoreError> {
        let sql = match column {
            CustomerKey::Phone => "SELECT document FROM customers WHERE phone = $1",
            CustomerKey::Email => "SELECT document FROM customers WHERE email = $1 LIMIT 1",
        };
        let row = sqlx::query(sql)
            .bind(value)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_customer_where", e))?;

        row.map(|r| document_from_row(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    pub async fn load_customers(&self) -> Result<Vec<Customer>, StoreError> {
        let rows = sqlx::query("SELECT document FROM customers ORDER BY name ASC, id ASC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_customers", e))?;

        rows.iter().map(document_from_row).collect()
    }

    #[instrument(skip(self), fields(customer_id = %customer_id), err)]
    pub async fn load_promotions(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Promotion>, StoreError> {
        let rows = sqlx::query(
            "SELECT document FROM promotions WHERE customer_id = $1 ORDER BY generated_at ASC",
        )
        .bind(*customer_id.0.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_promotions", e))?;

        rows.iter().map(document_from_row).collect()
    }

    fn block_on<F, T>(&self, fut: F) -> Result<T, StoreError>
    where
        F: std::future::Future<Output = Result<T, StoreError>>,
    {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            StoreError::Unavailable(
                "PostgresRetailStore requires a tokio runtime; call it from within a runtime context"
                    .to_string(),
            )
        })?;
        match handle.runtime_flavor() {
            tokio::runtime::RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(fut))
            }
            flavor => Err(StoreError::Unavailable(format!(
                "PostgresRetailStore needs a multi-thread tokio runtime (got {flavor:?})"
            ))),
        }
    }
}

/// Unique lookup columns on `customers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerKey {
    Phone,
    Email,
}

const PRODUCT_COLUMNS: &str =
    "id, name, category, price_cents, stock, low_stock_threshold, version, created_at, updated_at";

async fn apply_op(tx: &mut Transaction<'_, Postgres>, op: WriteOp) -> Result<(), StoreError> {
    match op {
        WriteOp::InsertSale(sale) => insert_sale(tx, &sale).await,
        WriteOp::AdjustStock {
            product_id,
            delta,
            allow_negative,
        } => adjust_stock(tx, product_id, delta, allow_negative).await,
        WriteOp::InsertProduct(product) => {
            sqlx::query(&format!(
                "INSERT INTO products ({PRODUCT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
            ))
            .bind(*product.id.0.as_uuid())
            .bind(&product.name)
            .bind(&product.category)
            .bind(cents(product.price))
            .bind(product.stock)
            .bind(product.low_stock_threshold)
            .bind(product.version as i64)
            .bind(product.created_at)
            .bind(product.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_product", e))?;
            Ok(())
        }
        WriteOp::UpdateProductDetails {
            product,
            expected_version,
        } => {
            let result = sqlx::query(
                r#"
                UPDATE products
                SET name = $2, category = $3, price_cents = $4, low_stock_threshold = $5,
                    updated_at = $6, version = version + 1
                WHERE id = $1 AND version = $7
                "#,
            )
            .bind(*product.id.0.as_uuid())
            .bind(&product.name)
            .bind(&product.category)
            .bind(cents(product.price))
            .bind(product.low_stock_threshold)
            .bind(product.updated_at)
            .bind(expected_version as i64)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("update_product", e))?;

            if result.rows_affected() == 0 {
                return Err(match current_stock(tx, product.id).await? {
                    None => StoreError::NotFound(format!("product {}", product.id)),
                    Some(_) => StoreError::Conflict(format!(
                        "product {} is not at version {}",
                        product.id, expected_version
                    )),
                });
            }
            Ok(())
        }
        WriteOp::RemoveProduct { product_id } => {
            let result = sqlx::query("DELETE FROM products WHERE id = $1")
                .bind(*product_id.0.as_uuid())
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("remove_product", e))?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!("product {product_id}")));
            }
            Ok(())
        }
        WriteOp::PutCustomer { customer, expected } => put_customer(tx, &customer, expected).await,
        WriteOp::AppendPromotion(promotion) => {
            sqlx::query(
                "INSERT INTO promotions (id, customer_id, generated_at, document) VALUES ($1, $2, $3, $4)",
            )
            .bind(*promotion.id.0.as_uuid())
            .bind(*promotion.customer_id.0.as_uuid())
            .bind(promotion.generated_at)
            .bind(to_document(&promotion)?)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("append_promotion", e))?;
            Ok(())
        }
    }
}

async fn insert_sale(tx: &mut Transaction<'_, Postgres>, sale: &Sale) -> Result<(), StoreError> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO sales (id, customer_id, seller_id, total_cents, idempotency_key, recorded_at, document)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (idempotency_key) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(*sale.id_typed().0.as_uuid())
    .bind(sale.customer_id().map(|id| *id.0.as_uuid()))
    .bind(sale.seller().map(|s| s.id.as_str().to_string()))
    .bind(cents(sale.total()))
    .bind(sale.idempotency_key())
    .bind(sale.recorded_at())
    .bind(to_document(sale)?)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_sale", e))?;

    if inserted.is_some() {
        return Ok(());
    }

    // Only a reused idempotency key suppresses the insert.
    let key = sale.idempotency_key().unwrap_or_default().to_string();
    let existing = sqlx::query("SELECT id FROM sales WHERE idempotency_key = $1")
        .bind(&key)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lookup_idempotency_key", e))?;
    let existing_id: uuid::Uuid = existing
        .try_get("id")
        .map_err(|e| StoreError::Serialization(format!("failed to read sale id: {e}")))?;

    Err(StoreError::DuplicateSubmission {
        key,
        sale_id: SaleId::new(AggregateId::from_uuid(existing_id)),
    })
}

async fn adjust_stock(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
    delta: i64,
    allow_negative: bool,
) -> Result<(), StoreError> {
    // The sufficiency check and the decrement are a single statement, so a
    // concurrent sale cannot slip in between them.
    let updated = sqlx::query(
        r#"
        UPDATE products
        SET stock = stock + $2, version = version + 1
        WHERE id = $1 AND ($3 OR stock + $2 >= 0)
        RETURNING stock
        "#,
    )
    .bind(*product_id.0.as_uuid())
    .bind(delta)
    .bind(allow_negative)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("adjust_stock", e))?;

    if updated.is_some() {
        return Ok(());
    }

    match current_stock(tx, product_id).await? {
        None => Err(StoreError::NotFound(format!("product {product_id}"))),
        Some(available) => Err(StoreError::InsufficientStock {
            product_id,
            available,
            requested: delta.saturating_neg(),
        }),
    }
}

async fn current_stock(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
) -> Result<Option<i64>, StoreError> {
    let row = sqlx::query("SELECT stock FROM products WHERE id = $1")
        .bind(*product_id.0.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("current_stock", e))?;

    row.map(|r| {
        r.try_get::<i64, _>("stock")
            .map_err(|e| StoreError::Serialization(format!("failed to read stock: {e}")))
    })
    .transpose()
}

async fn put_customer(
    tx: &mut Transaction<'_, Postgres>,
    customer: &Customer,
    expected: ExpectedVersion,
) -> Result<(), StoreError> {
    let document = to_document(customer)?;
    let id = *customer.id.0.as_uuid();

    let affected = match expected {
        ExpectedVersion::Exact(version) => sqlx::query(
            r#"
            UPDATE customers
            SET name = $2, phone = $3, email = $4, version = $5, document = $6
            WHERE id = $1 AND version = $7
            "#,
        )
        .bind(id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(customer.email.as_deref())
        .bind(customer.version as i64)
        .bind(&document)
        .bind(version as i64)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("update_customer", e))?
        .rows_affected(),
        ExpectedVersion::Absent => sqlx::query(
            r#"
            INSERT INTO customers (id, name, phone, email, version, document)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(customer.email.as_deref())
        .bind(customer.version as i64)
        .bind(&document)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_customer", e))?
        .rows_affected(),
        ExpectedVersion::Any => sqlx::query(
            r#"
            INSERT INTO customers (id, name, phone, email, version, document)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                phone = EXCLUDED.phone,
                email = EXCLUDED.email,
                version = EXCLUDED.version,
                document = EXCLUDED.document
            "#,
        )
        .bind(id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(customer.email.as_deref())
        .bind(customer.version as i64)
        .bind(&document)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_customer", e))?
        .rows_affected(),
    };

    if affected == 0 {
        return Err(StoreError::Conflict(format!(
            "customer {} expected {:?}",
            customer.id, expected
        )));
    }
    Ok(())
}

fn cents(money: Money) -> i64 {
    i64::try_from(money.cents()).unwrap_or(i64::MAX)
}

fn to_document<T: Serialize>(value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value)
        .map_err(|e| StoreError::Serialization(format!("failed to encode document: {e}")))
}

fn document_from_row<T: DeserializeOwned>(row: &sqlx::postgres::PgRow) -> Result<T, StoreError> {
    let document: serde_json::Value = row
        .try_get("document")
        .map_err(|e| StoreError::Serialization(format!("failed to read document: {e}")))?;
    serde_json::from_value(document)
        .map_err(|e| StoreError::Serialization(format!("failed to decode document: {e}")))
}

fn product_from_row(row: &sqlx::postgres::PgRow) -> Result<Product, StoreError> {
    ProductRow::from_row(row)
        .map(Product::from)
        .map_err(|e| StoreError::Serialization(format!("failed to deserialize product row: {e}")))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            classify_sqlstate(db_err.code().as_deref(), msg)
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Timeout(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {operation}: {err}")),
    }
}

fn classify_sqlstate(code: Option<&str>, msg: String) -> StoreError {
    match code {
        Some("23505") | Some("40P01") | Some("40001") => StoreError::Conflict(msg),
        Some("57014") => StoreError::Timeout(msg),
        _ => StoreError::Unavailable(msg),
    }
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    id: uuid::Uuid,
    name: String,
    category: String,
    price_cents: i64,
    stock: i64,
    low_stock_threshold: i64,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ProductRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            price_cents: row.try_get("price_cents")?,
            stock: row.try_get("stock")?,
            low_stock_threshold: row.try_get("low_stock_threshold")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId::new(AggregateId::from_uuid(row.id)),
            name: row.name,
            category: row.category,
            price: Money::from_cents(row.price_cents.max(0) as u64),
            stock: row.stock,
            low_stock_threshold: row.low_stock_threshold,
            version: row.version.max(0) as u64,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// Implement RetailStore trait

impl RetailStore for PostgresRetailStore {
    fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        self.block_on(self.commit_ops(ops))
    }

    fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.block_on(self.load_product(id))
    }

    fn products(&self) -> Result<Vec<Product>, StoreError> {
        self.block_on(self.load_products())
    }

    fn sale(&self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        self.block_on(self.load_sale(id))
    }

    fn sale_by_idempotency_key(&self, key: &str) -> Result<Option<Sale>, StoreError> {
        self.block_on(self.load_sale_by_key(key))
    }

    fn sales(&self, filter: &SaleFilter) -> Result<Vec<Sale>, StoreError> {
        self.block_on(self.query_sales(filter))
    }

    fn customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        self.block_on(self.load_customer(id))
    }

    fn customer_by_phone(&self, phone: &str) -> Result<Option<Customer>, StoreError> {
        self.block_on(self.load_customer_where(CustomerKey::Phone, phone))
    }

    fn customer_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        self.block_on(self.load_customer_where(CustomerKey::Email, email))
    }

    fn customers(&self) -> Result<Vec<Customer>, StoreError> {
        self.block_on(self.load_customers())
    }

    fn promotions_for(&self, customer_id: CustomerId) -> Result<Vec<Promotion>, StoreError> {
        self.block_on(self.load_promotions(customer_id))
    }
}
