// storefront/src/models/product.rs

use crate::errors::{AppError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Product {
  pub id: i64,
  pub name: String,
  pub price: Decimal,
  pub quantity: i32,
  pub description: Option<String>,
  /// Data URL of the product picture.
  pub image: Option<String>,
}

/// A product as submitted by staff, before it has an id.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductDraft {
  #[serde(alias = "product_name")]
  pub name: String,
  pub price: Decimal,
  pub quantity: i32,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub image: Option<String>,
}

impl ProductDraft {
  pub fn validate(self) -> Result<Self> {
    let name = self.name.trim().to_string();
    if name.is_empty() {
      return Err(AppError::Validation("Product name must not be empty".to_string()));
    }
    Ok(Self {
      name,
      price: validate_price(self.price)?,
      quantity: validate_stock(self.quantity)?,
      ..self
    })
  }
}

/// Columns staff may edit in place. Anything else is rejected before reaching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductField {
  Name,
  Price,
  Quantity,
  Description,
}

impl ProductField {
  pub fn column(self) -> &'static str {
    match self {
      ProductField::Name => "name",
      ProductField::Price => "price",
      ProductField::Quantity => "quantity",
      ProductField::Description => "description",
    }
  }
}

impl FromStr for ProductField {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "name" | "product_name" => Ok(ProductField::Name),
      "price" => Ok(ProductField::Price),
      "quantity" => Ok(ProductField::Quantity),
      "description" => Ok(ProductField::Description),
      other => Err(AppError::Validation(format!("Field '{}' cannot be edited", other))),
    }
  }
}

/// A single validated field update.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductEdit {
  Name(String),
  Price(Decimal),
  Quantity(i32),
  Description(Option<String>),
}

impl ProductEdit {
  /// Parses `value` for `field`. Grid editors send numbers as either JSON numbers or strings.
  pub fn parse(field: &str, value: &Value) -> Result<Self> {
    let field: ProductField = field.parse()?;
    let invalid = || AppError::Validation(format!("Invalid value for '{}': {}", field.column(), value));

    match field {
      ProductField::Name => {
        let name = value.as_str().map(str::trim).filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        Ok(ProductEdit::Name(name.to_string()))
      }
      ProductField::Price => {
        let raw = match value {
          Value::Number(n) => n.to_string(),
          Value::String(s) => s.trim().to_string(),
          _ => return Err(invalid()),
        };
        let price = Decimal::from_str(&raw).map_err(|_| invalid())?;
        Ok(ProductEdit::Price(validate_price(price)?))
      }
      ProductField::Quantity => {
        let quantity = match value {
          Value::Number(n) => n.as_i64(),
          Value::String(s) => s.trim().parse::<i64>().ok(),
          _ => None,
        }
        .and_then(|q| i32::try_from(q).ok())
        .ok_or_else(invalid)?;
        Ok(ProductEdit::Quantity(validate_stock(quantity)?))
      }
      ProductField::Description => match value {
        Value::Null => Ok(ProductEdit::Description(None)),
        Value::String(s) => Ok(ProductEdit::Description(Some(s.clone()))),
        _ => Err(invalid()),
      },
    }
  }

  pub fn field(&self) -> ProductField {
    match self {
      ProductEdit::Name(_) => ProductField::Name,
      ProductEdit::Price(_) => ProductField::Price,
      ProductEdit::Quantity(_) => ProductField::Quantity,
      ProductEdit::Description(_) => ProductField::Description,
    }
  }

  pub fn apply(&self, product: &mut Product) {
    match self {
      ProductEdit::Name(name) => product.name = name.clone(),
      ProductEdit::Price(price) => product.price = *price,
      ProductEdit::Quantity(quantity) => product.quantity = *quantity,
      ProductEdit::Description(description) => product.description = description.clone(),
    }
  }
}

fn validate_price(price: Decimal) -> Result<Decimal> {
  if price.is_sign_negative() && !price.is_zero() {
    return Err(AppError::Validation("Price must not be negative".to_string()));
  }
  if price.round_dp(2) != price {
    return Err(AppError::Validation("Price has more than two decimal places".to_string()));
  }
  Ok(price)
}

fn validate_stock(quantity: i32) -> Result<i32> {
  if quantity < 0 {
    return Err(AppError::Validation("Quantity must not be negative".to_string()));
  }
  Ok(quantity)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn edits_outside_allow_list_are_rejected() {
    for field in ["id", "image", "price; DROP TABLE products", "Name"] {
      let err = ProductEdit::parse(field, &json!("x")).unwrap_err();
      assert!(matches!(err, AppError::Validation(_)), "field {} accepted", field);
    }
  }

  #[test]
  fn price_accepts_numbers_and_strings() {
    assert_eq!(
      ProductEdit::parse("price", &json!(9.99)).unwrap(),
      ProductEdit::Price(Decimal::new(999, 2))
    );
    assert_eq!(
      ProductEdit::parse("price", &json!("12.50")).unwrap(),
      ProductEdit::Price(Decimal::new(1250, 2))
    );
    assert!(ProductEdit::parse("price", &json!("-1")).is_err());
    assert!(ProductEdit::parse("price", &json!("1.005")).is_err());
    assert!(ProductEdit::parse("price", &json!(true)).is_err());
  }

  #[test]
  fn quantity_must_fit_and_be_non_negative() {
    assert_eq!(ProductEdit::parse("quantity", &json!("7")).unwrap(), ProductEdit::Quantity(7));
    assert!(ProductEdit::parse("quantity", &json!(-1)).is_err());
    assert!(ProductEdit::parse("quantity", &json!(3_000_000_000i64)).is_err());
    assert!(ProductEdit::parse("quantity", &json!(1.5)).is_err());
  }

  #[test]
  fn draft_is_trimmed_and_checked() {
    let draft = ProductDraft {
      name: "  Mug ".to_string(),
      price: Decimal::new(450, 2),
      quantity: 3,
      description: None,
      image: None,
    };
    assert_eq!(draft.validate().unwrap().name, "Mug");

    let blank = ProductDraft {
      name: "   ".to_string(),
      price: Decimal::ZERO,
      quantity: 0,
      description: None,
      image: None,
    };
    assert!(blank.validate().is_err());
  }
}
