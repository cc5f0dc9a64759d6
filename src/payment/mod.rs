//! Client-side admission control for blob dispersal.
//!
//! Every blob is either covered by the account's leased reservation, by a
//! one-time overflow allowance, or billed against the prepaid on-demand
//! balance:
//!
//! ```text
//! account_blob(n symbols)
//!        │
//!        ▼
//! ┌──────────────────────────┐
//! │ current += n             │
//! └────────────┬─────────────┘
//!              │
//!      ┌───────┴────────┐
//!      │                │
//!  current ≤ limit   current > limit
//!      │                │
//!      ▼                ▼
//!  RESERVATION   overflow empty, fits? ──yes──▶ OVERFLOW (free)
//!   (free)              │
//!                       no
//!                       │
//!                       ▼
//!              ┌──────────────────┐
//!              │ current -= n     │
//!              │ charge on-demand │
//!              └────────┬─────────┘
//!                 ┌─────┴─────┐
//!                 │           │
//!            within balance  over
//!                 │           │
//!                 ▼           ▼
//!            ON-DEMAND     DENIED
//! ```
//!
//! A background task rotates the `[current, next, overflow]` bins once per
//! reservation window.

mod accountant;
mod types;

pub use accountant::{
    get_bin_index, Accountant, AccountantStats, AccountingState, AdmissionDecision,
    AdmissionPath,
};
pub use types::{
    quorum_check, BillingParams, OnDemandPayment, PaymentAuthorization, Reservation,
    REQUIRED_QUORUMS,
};
