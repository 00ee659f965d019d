use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shelfmark_core::{DocumentId, DomainError, DomainResult, timestamp};

use crate::{Extra, non_blank, strip_reserved};

/// Order fulfilment lifecycle.
///
/// `pending → shipped → delivered`, plus `cancelled`, reachable from anything
/// but `delivered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// The single forward step allowed from this state, if any.
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Shipped),
            OrderStatus::Shipped => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled => None,
        }
    }

    /// Move forward to `requested`.
    ///
    /// Only `pending → shipped` and `shipped → delivered` pass; skips,
    /// backward moves, self-moves and anything touching `cancelled` fail.
    pub fn advance_to(&self, requested: OrderStatus) -> DomainResult<OrderStatus> {
        match self.next() {
            Some(next) if next == requested => Ok(requested),
            _ => Err(DomainError::invalid_transition(self, requested)),
        }
    }

    /// Guard for cancellation. Delivered orders are final.
    pub fn cancel(&self) -> DomainResult<()> {
        if *self == OrderStatus::Delivered {
            return Err(DomainError::conflict("delivered orders cannot be cancelled"));
        }
        Ok(())
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::invalid_input(format!(
                "unknown order status `{other}`"
            ))),
        }
    }
}

/// Payment state; only cancellation changes it server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "paid" => Ok(PaymentStatus::Paid),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            other => Err(DomainError::invalid_input(format!(
                "unknown payment status `{other}`"
            ))),
        }
    }
}

/// Stored order document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub book_id: String,
    pub buyer_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub librarian_email: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Order placement request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewOrder {
    pub book_id: Option<String>,
    pub buyer_email: Option<String>,
    pub librarian_email: Option<String>,
    pub payment_status: Option<String>,
    pub extra: Extra,
}

const RESERVED: &[&str] = &[
    "_id",
    "bookId",
    "buyerEmail",
    "librarianEmail",
    "status",
    "paymentStatus",
    "createdAt",
];

impl Order {
    /// Validate a placement and build the stored order.
    ///
    /// New orders always start `pending`; the client cannot choose the status.
    pub fn place(input: NewOrder, now: DateTime<Utc>) -> DomainResult<Order> {
        let book_id = non_blank(input.book_id)
            .ok_or_else(|| DomainError::invalid_input("bookId is required"))?;
        let buyer_email = non_blank(input.buyer_email)
            .ok_or_else(|| DomainError::invalid_input("buyerEmail is required"))?;
        let payment_status = match non_blank(input.payment_status) {
            Some(raw) => raw.parse()?,
            None => PaymentStatus::default(),
        };

        Ok(Order {
            id: DocumentId::new(),
            book_id,
            buyer_email,
            librarian_email: non_blank(input.librarian_email),
            status: OrderStatus::Pending,
            payment_status,
            created_at: now,
            extra: strip_reserved(input.extra, RESERVED),
        })
    }
}
