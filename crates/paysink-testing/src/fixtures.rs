//! Builders for payments and merchants with sensible defaults.

use chrono::{DateTime, Utc};
use paysink_core::{Merchant, MerchantId, MerchantStatus, Payment, PaymentId, PaymentStatus};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Builder for test payments.
///
/// Defaults to a pending 100.00 BRL card payment created now.
#[derive(Debug, Clone)]
pub struct PaymentBuilder {
    payment: Payment,
}

impl PaymentBuilder {
    /// Starts a payment owned by `merchant_id`.
    pub fn new(merchant_id: MerchantId) -> Self {
        let now = Utc::now();
        Self {
            payment: Payment {
                id: PaymentId::new(),
                merchant_id,
                method: "CARD".to_string(),
                amount: dec!(100.00),
                currency: "BRL".to_string(),
                installments: 1,
                status: PaymentStatus::Pending,
                created_at: now,
                updated_at: now,
                idempotency_key: None,
                metadata_order_id: None,
            },
        }
    }

    /// Sets the amount.
    #[must_use]
    pub fn amount(mut self, amount: Decimal) -> Self {
        self.payment.amount = amount;
        self
    }

    /// Sets the status.
    #[must_use]
    pub fn status(mut self, status: PaymentStatus) -> Self {
        self.payment.status = status;
        self
    }

    /// Sets the merchant order reference.
    #[must_use]
    pub fn order_id(mut self, order_id: impl Into<String>) -> Self {
        self.payment.metadata_order_id = Some(order_id.into());
        self
    }

    /// Sets the idempotency key.
    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.payment.idempotency_key = Some(key.into());
        self
    }

    /// Sets creation and update time.
    #[must_use]
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.payment.created_at = at;
        self.payment.updated_at = at;
        self
    }

    /// Sets the installment count.
    #[must_use]
    pub fn installments(mut self, installments: u32) -> Self {
        self.payment.installments = installments;
        self
    }

    /// Returns the payment.
    pub fn build(self) -> Payment {
        self.payment
    }
}

/// Builder for test merchants.
///
/// Defaults to an active merchant without a webhook URL.
#[derive(Debug, Clone)]
pub struct MerchantBuilder {
    merchant: Merchant,
}

impl MerchantBuilder {
    /// Starts an active merchant.
    pub fn new() -> Self {
        Self {
            merchant: Merchant {
                id: MerchantId::new(),
                name: "Test Merchant".to_string(),
                webhook_url: None,
                status: MerchantStatus::Active,
            },
        }
    }

    /// Sets the webhook URL.
    #[must_use]
    pub fn webhook_url(mut self, url: impl Into<String>) -> Self {
        self.merchant.webhook_url = Some(url.into());
        self
    }

    /// Blocks the merchant.
    #[must_use]
    pub fn blocked(mut self) -> Self {
        self.merchant.status = MerchantStatus::Blocked;
        self
    }

    /// Sets the name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.merchant.name = name.into();
        self
    }

    /// Returns the merchant.
    pub fn build(self) -> Merchant {
        self.merchant
    }
}

impl Default for MerchantBuilder {
    fn default() -> Self {
        Self::new()
    }
}
