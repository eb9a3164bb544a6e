use std::collections::HashMap;
use std::sync::{Mutex, RwLock, RwLockWriteGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use storeline_catalog::{Product, ProductId};
use storeline_core::ExpectedVersion;
use storeline_customers::{Customer, CustomerId};
use storeline_insights::Promotion;
use storeline_sales::{Sale, SaleId};

use super::filter::SaleFilter;
use super::r#trait::{RetailStore, StoreError, WriteOp};

const DEFAULT_COMMIT_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_RETRY_PAUSE: Duration = Duration::from_micros(50);

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    sales: Vec<Sale>,
    sale_ids: HashMap<SaleId, usize>,
    sale_keys: HashMap<String, SaleId>,
    customers: HashMap<CustomerId, Customer>,
    phones: HashMap<String, CustomerId>,
    promotions: Vec<Promotion>,
}

/// Reverts one applied op. Replayed in reverse order on failure.
#[derive(Debug)]
enum Undo {
    Product(ProductId, Option<Product>),
    Sale,
    Customer(CustomerId, Option<Customer>),
    Promotion,
}

/// In-memory retail store.
///
/// Intended for tests/dev. A commit takes the write lock (bounded by the
/// commit timeout), applies ops one by one while keeping an undo log, and
/// rolls everything back if any op fails. Readers never see a half-applied
/// batch because they need the same lock.
#[derive(Debug)]
pub struct InMemoryRetailStore {
    state: RwLock<State>,
    commit_timeout: Duration,
    fail_after: Mutex<Option<usize>>,
}

impl Default for InMemoryRetailStore {
    fn default() -> Self {
        Self {
            state: RwLock::new(State::default()),
            commit_timeout: DEFAULT_COMMIT_TIMEOUT,
            fail_after: Mutex::new(None),
        }
    }
}

impl InMemoryRetailStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout = timeout;
        self
    }

    /// Make the next commit fail with `Unavailable` after `after_ops` ops
    /// have been applied. Used to exercise rollback.
    pub fn inject_commit_failure(&self, after_ops: usize) {
        if let Ok(mut slot) = self.fail_after.lock() {
            *slot = Some(after_ops);
        }
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        let deadline = Instant::now() + self.commit_timeout;
        loop {
            match self.state.try_write() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(_)) => {
                    return Err(StoreError::Unavailable("lock poisoned".to_string()));
                }
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(StoreError::Timeout(format!(
                            "commit lock not acquired within {:?}",
                            self.commit_timeout
                        )));
                    }
                    thread::sleep(LOCK_RETRY_PAUSE);
                }
            }
        }
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> T) -> Result<T, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(f(&state))
    }

    fn take_injected_failure(&self) -> Option<usize> {
        self.fail_after.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl State {
    fn apply(&mut self, op: WriteOp) -> Result<Undo, StoreError> {
        match op {
            WriteOp::InsertSale(sale) => self.insert_sale(sale),
            WriteOp::AdjustStock {
                product_id,
                delta,
                allow_negative,
            } => self.adjust_stock(product_id, delta, allow_negative),
            WriteOp::InsertProduct(product) => {
                if self.products.contains_key(&product.id) {
                    return Err(StoreError::Conflict(format!(
                        "product {} already exists",
                        product.id
                    )));
                }
                let id = product.id;
                self.products.insert(id, product);
                Ok(Undo::Product(id, None))
            }
            WriteOp::UpdateProductDetails {
                product,
                expected_version,
            } => {
                let current = self
                    .products
                    .get_mut(&product.id)
                    .ok_or_else(|| StoreError::NotFound(format!("product {}", product.id)))?;
                if current.version != expected_version {
                    return Err(StoreError::Conflict(format!(
                        "product {} is at version {}, expected {}",
                        product.id, current.version, expected_version
                    )));
                }
                let previous = current.clone();
                current.name = product.name;
                current.category = product.category;
                current.price = product.price;
                current.low_stock_threshold = product.low_stock_threshold;
                current.updated_at = product.updated_at;
                current.version += 1;
                Ok(Undo::Product(previous.id, Some(previous)))
            }
            WriteOp::RemoveProduct { product_id } => {
                let previous = self
                    .products
                    .remove(&product_id)
                    .ok_or_else(|| StoreError::NotFound(format!("product {product_id}")))?;
                Ok(Undo::Product(product_id, Some(previous)))
            }
            WriteOp::PutCustomer { customer, expected } => self.put_customer(customer, expected),
            WriteOp::AppendPromotion(promotion) => {
                self.promotions.push(promotion);
                Ok(Undo::Promotion)
            }
        }
    }

    fn insert_sale(&mut self, sale: Sale) -> Result<Undo, StoreError> {
        let sale_id = sale.id_typed();
        if self.sale_ids.contains_key(&sale_id) {
            return Err(StoreError::Conflict(format!("sale {sale_id} already exists")));
        }
        if let Some(key) = sale.idempotency_key() {
            if let Some(existing) = self.sale_keys.get(key) {
                return Err(StoreError::DuplicateSubmission {
                    key: key.to_string(),
                    sale_id: *existing,
                });
            }
            self.sale_keys.insert(key.to_string(), sale_id);
        }
        self.sale_ids.insert(sale_id, self.sales.len());
        self.sales.push(sale);
        Ok(Undo::Sale)
    }

    fn adjust_stock(
        &mut self,
        product_id: ProductId,
        delta: i64,
        allow_negative: bool,
    ) -> Result<Undo, StoreError> {
        let product = self
            .products
            .get_mut(&product_id)
            .ok_or_else(|| StoreError::NotFound(format!("product {product_id}")))?;

        let next = product.stock.checked_add(delta).ok_or_else(|| {
            StoreError::Conflict(format!("stock counter overflow for product {product_id}"))
        })?;
        if !allow_negative && next < 0 {
            return Err(StoreError::InsufficientStock {
                product_id,
                available: product.stock,
                requested: delta.saturating_neg(),
            });
        }

        let previous = product.clone();
        product.stock = next;
        product.version += 1;
        Ok(Undo::Product(product_id, Some(previous)))
    }

    fn put_customer(
        &mut self,
        customer: Customer,
        expected: ExpectedVersion,
    ) -> Result<Undo, StoreError> {
        let previous = self.customers.get(&customer.id).cloned();
        if !expected.matches(previous.as_ref().map(|c| c.version)) {
            return Err(StoreError::Conflict(format!(
                "customer {} expected {:?}, found {:?}",
                customer.id,
                expected,
                previous.as_ref().map(|c| c.version)
            )));
        }
        if let Some(owner) = self.phones.get(&customer.phone) {
            if *owner != customer.id {
                return Err(StoreError::Conflict(format!(
                    "phone {} already belongs to customer {}",
                    customer.phone, owner
                )));
            }
        }

        if let Some(old) = &previous {
            self.phones.remove(&old.phone);
        }
        self.phones.insert(customer.phone.clone(), customer.id);
        let id = customer.id;
        self.customers.insert(id, customer);
        Ok(Undo::Customer(id, previous))
    }

    fn undo(&mut self, undo: Undo) {
        match undo {
            Undo::Product(id, Some(previous)) => {
                self.products.insert(id, previous);
            }
            Undo::Product(id, None) => {
                self.products.remove(&id);
            }
            Undo::Sale => {
                if let Some(sale) = self.sales.pop() {
                    self.sale_ids.remove(&sale.id_typed());
                    if let Some(key) = sale.idempotency_key() {
                        self.sale_keys.remove(key);
                    }
                }
            }
            Undo::Customer(id, previous) => {
                if let Some(current) = self.customers.remove(&id) {
                    self.phones.remove(&current.phone);
                }
                if let Some(previous) = previous {
                    self.phones.insert(previous.phone.clone(), id);
                    self.customers.insert(id, previous);
                }
            }
            Undo::Promotion => {
                self.promotions.pop();
            }
        }
    }
}

impl RetailStore for InMemoryRetailStore {
    fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut state = self.write_state()?;
        let fail_after = self.take_injected_failure();
        let mut journal: Vec<Undo> = Vec::with_capacity(ops.len());

        let mut outcome = Ok(());
        for (idx, op) in ops.into_iter().enumerate() {
            if fail_after == Some(idx) {
                outcome = Err(StoreError::Unavailable(format!(
                    "injected failure before op {idx}"
                )));
                break;
            }
            match state.apply(op) {
                Ok(undo) => journal.push(undo),
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }

        if outcome.is_err() {
            while let Some(undo) = journal.pop() {
                state.undo(undo);
            }
        }
        outcome
    }

    fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.read(|s| s.products.get(&id).cloned())
    }

    fn products(&self) -> Result<Vec<Product>, StoreError> {
        self.read(|s| {
            let mut products: Vec<Product> = s.products.values().cloned().collect();
            products.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
            products
        })
    }

    fn sale(&self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        self.read(|s| s.sale_ids.get(&id).and_then(|idx| s.sales.get(*idx)).cloned())
    }

    fn sale_by_idempotency_key(&self, key: &str) -> Result<Option<Sale>, StoreError> {
        self.read(|s| {
            s.sale_keys
                .get(key)
                .and_then(|id| s.sale_ids.get(id))
                .and_then(|idx| s.sales.get(*idx))
                .cloned()
        })
    }

    fn sales(&self, filter: &SaleFilter) -> Result<Vec<Sale>, StoreError> {
        self.read(|s| {
            let mut sales: Vec<Sale> = s.sales.iter().filter(|sale| filter.matches(sale)).cloned().collect();
            sales.sort_by_key(Sale::recorded_at);
            sales
        })
    }

    fn customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        self.read(|s| s.customers.get(&id).cloned())
    }

    fn customer_by_phone(&self, phone: &str) -> Result<Option<Customer>, StoreError> {
        self.read(|s| s.phones.get(phone).and_then(|id| s.customers.get(id)).cloned())
    }

    fn customer_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        self.read(|s| {
            s.customers
                .values()
                .find(|c| c.email.as_deref() == Some(email))
                .cloned()
        })
    }

    fn customers(&self) -> Result<Vec<Customer>, StoreError> {
        self.read(|s| {
            let mut customers: Vec<Customer> = s.customers.values().cloned().collect();
            customers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
            customers
        })
    }

    fn promotions_for(&self, customer_id: CustomerId) -> Result<Vec<Promotion>, StoreError> {
        self.read(|s| {
            let mut promotions: Vec<Promotion> = s
                .promotions
                .iter()
                .filter(|p| p.customer_id == customer_id)
                .cloned()
                .collect();
            promotions.sort_by_key(|p| p.generated_at);
            promotions
        })
    }
}
