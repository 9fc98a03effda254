//! Bidirectional amount/price converter.
//!
//! Converts between a native asset amount and its fiat value at a live
//! price. Pure arithmetic over text fields; no I/O. The invariant
//! `quote == base * price` (within display rounding) is maintained by
//! recomputing the non-edited side whenever the edited side or the price
//! changes.

use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, Zero};

/// Which side the user is editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The native asset amount.
    Base,
    /// The fiat amount.
    Quote,
}

pub struct Exchanger {
    side: Side,
    base_amount: String,
    quote_amount: String,
    price: BigDecimal,
    base_precision: i64,
    quote_precision: i64,
}

impl Exchanger {
    pub fn new(price: BigDecimal, base_precision: i64, quote_precision: i64) -> Self {
        Self {
            side: Side::Base,
            base_amount: String::new(),
            quote_amount: String::new(),
            price,
            base_precision,
            quote_precision,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Switch the authoritative editable field. Amounts are left untouched.
    pub fn set_side(&mut self, side: Side) {
        self.side = side;
    }

    pub fn price(&self) -> &BigDecimal {
        &self.price
    }

    pub fn set_price(&mut self, price: BigDecimal) {
        self.price = price;
        self.recompute();
    }

    /// Edit the active side's text; the inactive side is recomputed.
    pub fn set_amount(&mut self, text: &str) {
        match self.side {
            Side::Base => self.base_amount = text.to_string(),
            Side::Quote => self.quote_amount = text.to_string(),
        }
        self.recompute();
    }

    pub fn base_amount(&self) -> &str {
        &self.base_amount
    }

    pub fn quote_amount(&self) -> &str {
        &self.quote_amount
    }

    pub fn base_amount_decimal(&self) -> BigDecimal {
        parse(&self.base_amount)
    }

    pub fn quote_amount_decimal(&self) -> BigDecimal {
        parse(&self.quote_amount)
    }

    fn recompute(&mut self) {
        match self.side {
            Side::Base => {
                let base = parse(&self.base_amount);
                let quote = (&base * &self.price)
                    .with_scale_round(self.quote_precision, RoundingMode::HalfUp);
                self.quote_amount = quote.normalized().to_plain_string();
            }
            Side::Quote => {
                if self.price.is_zero() {
                    self.base_amount.clear();
                    return;
                }
                let quote = parse(&self.quote_amount);
                let base = (&quote / &self.price)
                    .with_scale_round(self.base_precision, RoundingMode::HalfUp);
                self.base_amount = base.normalized().to_plain_string();
            }
        }
    }
}

/// Unparseable text counts as zero, matching an empty input field.
fn parse(text: &str) -> BigDecimal {
    BigDecimal::from_str(text.trim()).unwrap_or_else(|_| BigDecimal::zero())
}
