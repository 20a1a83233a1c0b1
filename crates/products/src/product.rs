use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockmaster_core::{AggregateId, AggregateRoot, DomainError, DomainResult};

use crate::ledger::{LedgerOp, StockLevels};

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ProductId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Reorder status derived from on-hand stock and the reorder level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    /// `out_of_stock` at zero, `low_stock` at or below the reorder level, `in_stock` above.
    pub fn classify(on_hand: u64, reorder_level: u64) -> Self {
        if on_hand == 0 {
            StockStatus::OutOfStock
        } else if on_hand <= reorder_level {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }

    /// Low and out-of-stock products both need replenishing.
    pub fn needs_reorder(self) -> bool {
        !matches!(self, StockStatus::InStock)
    }
}

/// Catalog entry for a new product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub unit_of_measure: String,
    #[serde(default)]
    pub reorder_level: u64,
    /// Opening stock, booked as a receive.
    #[serde(default)]
    pub initial_stock: u64,
}

/// Editable catalog fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit_of_measure: Option<String>,
    pub reorder_level: Option<u64>,
}

/// Aggregate root: Product.
///
/// Catalog fields are edited through [`Product::update_details`]; quantities only
/// change through the ledger operations, each bumping the version by one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    sku: String,
    name: String,
    category: String,
    unit_of_measure: String,
    levels: StockLevels,
    reorder_level: u64,
    version: u64,
}

impl Product {
    pub fn create(id: ProductId, new: NewProduct) -> DomainResult<Self> {
        let sku = required("SKU", &new.sku)?;
        let name = required("name", &new.name)?;
        let unit_of_measure = required("unit of measure", &new.unit_of_measure)?;

        let mut product = Self {
            id,
            sku,
            name,
            category: new.category.trim().to_string(),
            unit_of_measure,
            levels: StockLevels::default(),
            reorder_level: new.reorder_level,
            version: 0,
        };

        if new.initial_stock > 0 {
            product.apply_ledger(LedgerOp::Receive, new.initial_stock)?;
        }

        Ok(product)
    }

    /// Rebuild a product from stored columns (repository adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: ProductId,
        sku: String,
        name: String,
        category: String,
        unit_of_measure: String,
        on_hand: u64,
        reserved: u64,
        reorder_level: u64,
        version: u64,
    ) -> DomainResult<Self> {
        let levels =
            StockLevels::from_parts(on_hand, reserved).map_err(|e| e.into_domain(id.0))?;
        Ok(Self {
            id,
            sku,
            name,
            category,
            unit_of_measure,
            levels,
            reorder_level,
            version,
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn unit_of_measure(&self) -> &str {
        &self.unit_of_measure
    }

    pub fn levels(&self) -> StockLevels {
        self.levels
    }

    pub fn on_hand(&self) -> u64 {
        self.levels.on_hand()
    }

    pub fn reserved(&self) -> u64 {
        self.levels.reserved()
    }

    pub fn free_to_use(&self) -> u64 {
        self.levels.free_to_use()
    }

    pub fn reorder_level(&self) -> u64 {
        self.reorder_level
    }

    pub fn status(&self) -> StockStatus {
        StockStatus::classify(self.on_hand(), self.reorder_level)
    }

    pub fn update_details(&mut self, details: ProductDetails) -> DomainResult<()> {
        // Validate everything before touching any field.
        let sku = details.sku.as_deref().map(|v| required("SKU", v)).transpose()?;
        let name = details.name.as_deref().map(|v| required("name", v)).transpose()?;
        let unit = details
            .unit_of_measure
            .as_deref()
            .map(|v| required("unit of measure", v))
            .transpose()?;

        if let Some(sku) = sku {
            self.sku = sku;
        }
        if let Some(name) = name {
            self.name = name;
        }
        if let Some(unit) = unit {
            self.unit_of_measure = unit;
        }
        if let Some(category) = details.category {
            self.category = category.trim().to_string();
        }
        if let Some(level) = details.reorder_level {
            self.reorder_level = level;
        }

        self.version += 1;
        Ok(())
    }

    /// Run one ledger operation against this product's stock.
    ///
    /// On failure the product is left untouched.
    pub fn apply_ledger(&mut self, op: LedgerOp, qty: u64) -> DomainResult<()> {
        self.levels = self
            .levels
            .apply(op, qty)
            .map_err(|e| e.into_domain(self.id.0))?;
        self.version += 1;
        Ok(())
    }

    pub fn receive(&mut self, qty: u64) -> DomainResult<()> {
        self.apply_ledger(LedgerOp::Receive, qty)
    }

    pub fn reserve(&mut self, qty: u64) -> DomainResult<()> {
        self.apply_ledger(LedgerOp::Reserve, qty)
    }

    pub fn release(&mut self, qty: u64) -> DomainResult<()> {
        self.apply_ledger(LedgerOp::Release, qty)
    }

    pub fn consume(&mut self, qty: u64) -> DomainResult<()> {
        self.apply_ledger(LedgerOp::Consume, qty)
    }

    pub fn remove_unreserved(&mut self, qty: u64) -> DomainResult<()> {
        self.apply_ledger(LedgerOp::RemoveUnreserved, qty)
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

fn required(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

/// Product list entry with the derived fields filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub unit_of_measure: String,
    pub on_hand: u64,
    pub reserved: u64,
    pub free_to_use: u64,
    pub reorder_level: u64,
    pub status: StockStatus,
}

impl From<&Product> for ProductView {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id,
            sku: p.sku.clone(),
            name: p.name.clone(),
            category: p.category.clone(),
            unit_of_measure: p.unit_of_measure.clone(),
            on_hand: p.on_hand(),
            reserved: p.reserved(),
            free_to_use: p.free_to_use(),
            reorder_level: p.reorder_level,
            status: p.status(),
        }
    }
}
