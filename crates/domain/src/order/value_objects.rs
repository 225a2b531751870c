//! Value objects for the order domain.

use common::ProductId;

use crate::error::ValidationError;

/// Money amount represented in cents to avoid floating point issues.
///
/// Amounts cross the storage and wire boundary as decimal numbers
/// (`19.99`); [`Money::from_amount`] and [`Money::as_amount`] convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money {
    /// Amount in cents (e.g., 1999 = 19.99)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a Money amount from a decimal amount, rounding to the nearest cent.
    ///
    /// Returns `None` for NaN or infinite input.
    pub fn from_amount(amount: f64) -> Option<Self> {
        if !amount.is_finite() {
            return None;
        }
        Some(Self {
            cents: (amount * 100.0).round() as i64,
        })
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the amount as a decimal number.
    pub fn as_amount(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents.saturating_mul(i64::from(quantity)),
        }
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents.saturating_add(rhs.cents),
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents = self.cents.saturating_add(rhs.cents);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// Postal address copied into the customer snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub street: String,
    pub number: String,
    pub city: String,
    pub province: String,
    pub country: String,
    pub postal_code: String,
}

impl Address {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_min_chars(&self.street, "street")?;
        require_non_blank(&self.number, "number")?;
        require_min_chars(&self.city, "city")?;
        require_min_chars(&self.province, "province")?;
        require_min_chars(&self.country, "country")?;
        if self.postal_code.len() != 5 || !self.postal_code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidCustomer {
                field: "postal_code",
                reason: "must be exactly 5 digits",
            });
        }
        Ok(())
    }
}

/// Denormalized customer data captured when the order is created.
///
/// Never re-synced from the customer record: the order keeps the data
/// that was valid at purchase time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerSnapshot {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: Address,
}

impl CustomerSnapshot {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_min_chars(&self.full_name, "full_name")?;
        if !is_plausible_email(&self.email) {
            return Err(ValidationError::InvalidCustomer {
                field: "email",
                reason: "must be a valid email address",
            });
        }
        require_non_blank(&self.phone, "phone")?;
        self.address.validate()
    }
}

/// One line of an order: a product, the price it was bought at, and how many.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    /// The product ordered.
    pub product_id: ProductId,

    /// Unit price at the time of ordering, not the live catalog price.
    pub unit_price: Money,

    /// Quantity ordered.
    pub quantity: u32,
}

impl LineItem {
    /// Creates a new line item.
    pub fn new(product_id: impl Into<ProductId>, unit_price: Money, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            unit_price,
            quantity,
        }
    }

    /// Returns the total for this line (unit_price * quantity).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.quantity < 1 {
            return Err(ValidationError::InvalidQuantity {
                product_id: self.product_id,
                quantity: self.quantity,
            });
        }
        if self.unit_price.is_negative() {
            return Err(ValidationError::NegativePrice {
                product_id: self.product_id,
                price: self.unit_price,
            });
        }
        Ok(())
    }
}

fn require_min_chars(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().chars().count() < 3 {
        return Err(ValidationError::InvalidCustomer {
            field,
            reason: "must have at least 3 characters",
        });
    }
    Ok(())
}

fn require_non_blank(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::InvalidCustomer {
            field,
            reason: "must not be blank",
        });
    }
    Ok(())
}

fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}
