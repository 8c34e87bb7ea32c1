//! Tally prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    address::{
        AddressField, AddressValidator, FieldError, FieldErrors, NormalizedAddress,
        ShippingAddress,
    },
    cart::{Cart, CartError, CartLine, LineKey},
    checkout::{CheckoutError, CheckoutSession, CheckoutState},
    config::{CartConfig, ConfigError, StoreConfig},
    countries::{CountryRecord, CountryTable, CountryTableError, PhoneError, PhonePlan},
    discounts::{
        DiscountCode, DiscountEngine, DiscountError, DiscountKind, DiscountResult,
        DiscountTableError,
    },
    payments::{Capture, CaptureError, PaymentCapture, ReconcileError, reconcile},
    pricing::PricingError,
    receipt::{OrderReceipt, ReceiptError},
    shipping::ShippingCostResolver,
    store::Store,
    totals::{OrderTotal, OrderTotalCalculator, OrderTotalSummary, ShippingCost},
};
