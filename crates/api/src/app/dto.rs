use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use stockbook_core::{CategoryId, Money, ProductId};
use stockbook_infra::{EntryFilter, ProductDetail, ProductFilter, StockedProduct};
use stockbook_inventory::{EntryType, LedgerEntry, Product, StockBalance, StockDirection, StockRequest};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Body of every stock movement.
#[derive(Debug, Deserialize)]
pub struct StockMovementRequest {
    pub product_id: String,
    /// Any JSON number; only whole numbers are valid quantities.
    pub quantity: serde_json::Number,
    pub unit_price: Money,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub reference_number: Option<String>,
}

impl StockMovementRequest {
    pub fn into_request(self) -> Result<StockRequest, axum::response::Response> {
        let product_id: ProductId = self.product_id.parse().map_err(|_| errors::invalid_id("product"))?;
        let quantity = self.quantity.as_i64().ok_or_else(|| {
            errors::json_error(
                axum::http::StatusCode::BAD_REQUEST,
                "invalid_quantity",
                format!("quantity must be a positive whole number, got {}", self.quantity),
            )
        })?;
        Ok(StockRequest {
            product_id,
            quantity,
            unit_price: self.unit_price,
            notes: self.notes,
            reference_number: self.reference_number,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AdjustmentRequest {
    /// `in` or `out`.
    pub direction: String,
    #[serde(flatten)]
    pub movement: StockMovementRequest,
}

impl AdjustmentRequest {
    pub fn into_parts(self) -> Result<(StockDirection, StockRequest), axum::response::Response> {
        let direction: StockDirection = self.direction.parse().map_err(|_| {
            errors::json_error(
                axum::http::StatusCode::BAD_REQUEST,
                "invalid_direction",
                "direction must be one of: in, out",
            )
        })?;
        Ok((direction, self.movement.into_request()?))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub category_id: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

impl ProductListQuery {
    pub fn into_filter(self) -> Result<ProductFilter, axum::response::Response> {
        let category_id = match self.category_id.as_deref() {
            Some(raw) => Some(raw.parse::<CategoryId>().map_err(|_| errors::invalid_id("category"))?),
            None => None,
        };
        Ok(ProductFilter {
            category_id,
            search: self.search.filter(|s| !s.trim().is_empty()),
            include_inactive: self.include_inactive,
        })
    }
}

/// Ledger query. `date_to` is inclusive: the whole day is covered.
#[derive(Debug, Default, Deserialize)]
pub struct EntryListQuery {
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
    pub product_id: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<usize>,
}

impl EntryListQuery {
    pub fn into_filter(self) -> Result<EntryFilter, axum::response::Response> {
        let entry_type = match self.entry_type.as_deref() {
            Some(raw) => Some(raw.parse::<EntryType>().map_err(|e| {
                errors::json_error(axum::http::StatusCode::BAD_REQUEST, "invalid_type", e.to_string())
            })?),
            None => None,
        };
        let product_id = match self.product_id.as_deref() {
            Some(raw) => Some(raw.parse::<ProductId>().map_err(|_| errors::invalid_id("product"))?),
            None => None,
        };

        let start_of = |day: NaiveDate| day.and_time(NaiveTime::MIN).and_utc();
        Ok(EntryFilter {
            entry_type,
            product_id,
            from: self.date_from.map(start_of),
            to: self
                .date_to
                .and_then(|day| day.checked_add_days(Days::new(1)))
                .map(start_of),
            limit: self.limit,
        })
    }
}

// -------------------------
// Response DTOs
// -------------------------

/// A product as the API shows it: catalog fields plus its stock.
#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub stock: StockBalance,
    pub available_quantity: i64,
    pub low_stock: bool,
}

impl From<StockedProduct> for ProductView {
    fn from(value: StockedProduct) -> Self {
        let low_stock = value.is_low();
        Self {
            available_quantity: value.balance.available(),
            low_stock,
            product: value.product,
            stock: value.balance,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductDetailView {
    #[serde(flatten)]
    pub view: ProductView,
    pub entries: Vec<LedgerEntry>,
}

impl From<ProductDetail> for ProductDetailView {
    fn from(value: ProductDetail) -> Self {
        Self {
            view: StockedProduct {
                product: value.product,
                balance: value.balance,
            }
            .into(),
            entries: value.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn date_range_is_inclusive_of_the_last_day() {
        let query = EntryListQuery {
            entry_type: Some("Sale".into()),
            date_from: NaiveDate::from_ymd_opt(2026, 3, 1),
            date_to: NaiveDate::from_ymd_opt(2026, 3, 31),
            ..Default::default()
        };
        let filter = query.into_filter().unwrap();

        assert_eq!(filter.entry_type, Some(EntryType::Sale));
        assert_eq!(filter.from, Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()));
        assert_eq!(filter.to, Some(Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn bad_query_values_are_bad_requests() {
        let query = EntryListQuery {
            entry_type: Some("gift".into()),
            ..Default::default()
        };
        let err = query.into_filter().unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);

        let query = ProductListQuery {
            category_id: Some("nope".into()),
            ..Default::default()
        };
        assert_eq!(query.into_filter().unwrap_err().status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn adjustment_body_carries_direction() {
        let body: AdjustmentRequest = serde_json::from_value(serde_json::json!({
            "direction": "out",
            "product_id": ProductId::new().to_string(),
            "quantity": 2,
            "unit_price": "0.00",
            "notes": "broken in transit"
        }))
        .unwrap();
        let (direction, request) = body.into_parts().unwrap();
        assert_eq!(direction, StockDirection::Out);
        assert_eq!(request.quantity, 2);
        assert_eq!(request.notes.as_deref(), Some("broken in transit"));
    }

    #[test]
    fn fractional_quantity_is_an_invalid_quantity() {
        let body: StockMovementRequest = serde_json::from_value(serde_json::json!({
            "product_id": ProductId::new().to_string(),
            "quantity": 2.5,
            "unit_price": "1.00"
        }))
        .unwrap();
        let err = body.into_request().unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
