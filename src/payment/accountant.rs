//! Client-side admission control against a reservation and an on-demand balance.
//!
//! All decisions and bin rotations run under one exclusive lock over the
//! [`AccountingState`]; the lock is never held across an `.await`.

use crate::auth::BlobRequestSigner;
use crate::error::{Error, Result};
use crate::payment::types::{
    quorum_check, BillingParams, OnDemandPayment, PaymentAuthorization, Reservation,
    REQUIRED_QUORUMS,
};
use num_bigint::BigUint;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const CURRENT: usize = 0;
const NEXT: usize = 1;
const OVERFLOW: usize = 2;

/// Bin index for a unix timestamp: the number of whole windows since the epoch.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn get_bin_index(now_secs: u64, window_secs: u32) -> u32 {
    (now_secs / u64::from(window_secs.max(1))) as u32
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Which path admitted a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionPath {
    /// Covered by the current bin of the reservation.
    Reservation,
    /// Covered by the one-time overflow allowance.
    Overflow,
    /// Charged against the on-demand balance.
    OnDemand,
}

/// Result of [`Accountant::decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionDecision {
    /// Reservation bin, zero for on-demand.
    pub bin_index: u32,
    /// Zero for reservation/overflow, the cumulative spend for on-demand.
    pub amount_due: BigUint,
    /// Path that admitted the blob.
    pub path: AdmissionPath,
}

/// Admission statistics for monitoring.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AccountantStats {
    /// Blobs admitted within the reservation limit.
    pub reservation_admissions: u64,
    /// Blobs admitted through the overflow allowance.
    pub overflow_grants: u64,
    /// Blobs charged on-demand.
    pub on_demand_charges: u64,
    /// Blobs denied.
    pub denials: u64,
    /// Bin rotations performed.
    pub rotations: u64,
    /// Symbols admitted through reservation or overflow.
    pub admitted_symbols: u64,
    /// Symbols moved into the overflow bin.
    pub overflow_symbols: u64,
    /// Symbols dropped from the current bin by rotation.
    pub rotated_out_symbols: u64,
}

/// Mutable per-account accounting state.
#[derive(Debug)]
pub struct AccountingState {
    reservation: Reservation,
    on_demand: OnDemandPayment,
    params: BillingParams,
    /// `[current, next, overflow]` symbol usage.
    bin_usages: [u64; 3],
    cumulative_payment_spent: BigUint,
    stats: AccountantStats,
}

impl AccountingState {
    fn decide(
        &mut self,
        num_symbols: u64,
        now: u64,
        reservation_eligible: bool,
    ) -> Result<AdmissionDecision> {
        let bin_limit = if reservation_eligible {
            self.reservation
                .bin_limit(self.params.reservation_window_secs, now)
        } else {
            0
        };

        let previous = self.bin_usages[CURRENT];
        self.bin_usages[CURRENT] = previous.saturating_add(num_symbols);
        let usage = self.bin_usages[CURRENT];
        let bin_index = get_bin_index(now, self.params.reservation_window_secs);

        if usage <= bin_limit {
            self.stats.reservation_admissions += 1;
            self.stats.admitted_symbols += num_symbols;
            return Ok(AdmissionDecision {
                bin_index,
                amount_due: BigUint::default(),
                path: AdmissionPath::Reservation,
            });
        }

        if self.bin_usages[OVERFLOW] == 0
            && previous < bin_limit
            && num_symbols <= bin_limit
        {
            let excess = usage - bin_limit;
            self.bin_usages[OVERFLOW] += excess;
            self.stats.overflow_grants += 1;
            self.stats.admitted_symbols += num_symbols;
            self.stats.overflow_symbols += excess;
            return Ok(AdmissionDecision {
                bin_index,
                amount_due: BigUint::default(),
                path: AdmissionPath::Overflow,
            });
        }

        self.bin_usages[CURRENT] = previous;

        let charge = self.params.payment_for(num_symbols);
        let total = &self.cumulative_payment_spent + charge;
        if total <= self.on_demand.cumulative_payment {
            self.cumulative_payment_spent = total;
            self.stats.on_demand_charges += 1;
            return Ok(AdmissionDecision {
                bin_index: 0,
                amount_due: self.cumulative_payment_spent.clone(),
                path: AdmissionPath::OnDemand,
            });
        }

        self.stats.denials += 1;
        Err(Error::AdmissionDenied(format!(
            "neither reservation nor on-demand payment is available for {num_symbols} symbols"
        )))
    }

    fn rotate(&mut self) {
        self.stats.rotations += 1;
        self.stats.rotated_out_symbols += self.bin_usages[CURRENT];
        self.bin_usages[CURRENT] = self.bin_usages[NEXT];
        self.bin_usages[NEXT] = self.bin_usages[OVERFLOW];
        self.bin_usages[OVERFLOW] = 0;
    }
}

/// Admission controller for one account.
///
/// The bin rotation task is started with [`Accountant::start`] and stopped with
/// [`Accountant::stop`], which is idempotent and also runs on drop.
pub struct Accountant {
    state: Arc<Mutex<AccountingState>>,
    signer: Option<Arc<dyn BlobRequestSigner>>,
    shutdown_tx: watch::Sender<bool>,
    rotation: Mutex<Option<JoinHandle<()>>>,
}

impl Accountant {
    /// Create an accountant with empty bins and nothing spent.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the billing parameters are unusable.
    pub fn new(
        reservation: Reservation,
        on_demand: OnDemandPayment,
        params: BillingParams,
        signer: Option<Arc<dyn BlobRequestSigner>>,
    ) -> Result<Self> {
        params.validate()?;
        let (shutdown_tx, _) = watch::channel(false);

        debug!(
            "Accountant created (rate={} sym/s, window={}s, price={}, min_symbols={})",
            reservation.symbols_per_second,
            params.reservation_window_secs,
            params.price_per_symbol,
            params.min_chargeable_symbols
        );

        Ok(Self {
            state: Arc::new(Mutex::new(AccountingState {
                reservation,
                on_demand,
                params,
                bin_usages: [0; 3],
                cumulative_payment_spent: BigUint::default(),
                stats: AccountantStats::default(),
            })),
            signer,
            shutdown_tx,
            rotation: Mutex::new(None),
        })
    }

    /// Start the periodic bin rotation task. Does nothing if it is already
    /// running or the accountant was stopped.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when called outside a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Config(format!("bin rotation needs a tokio runtime: {e}")))?;

        let mut rotation = self.rotation.lock();
        if rotation.is_some() || *self.shutdown_tx.borrow() {
            return Ok(());
        }

        let state = Arc::clone(&self.state);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        *rotation = Some(handle.spawn(async move {
            loop {
                let window = state.lock().params.reservation_window_secs;
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    () = tokio::time::sleep(Duration::from_secs(u64::from(window))) => {
                        let usages = {
                            let mut s = state.lock();
                            s.rotate();
                            s.bin_usages
                        };
                        debug!("Rotated accounting bins: {usages:?}");
                    }
                }
            }
            debug!("Bin rotation task stopped");
        }));

        info!("Bin rotation started");
        Ok(())
    }

    /// Stop the rotation task. Safe to call repeatedly.
    pub fn stop(&self) {
        self.shutdown_tx.send_replace(true);
        if self.rotation.lock().take().is_some() {
            info!("Bin rotation stopping");
        }
    }

    /// Decide whether `num_symbols` may be dispersed now.
    ///
    /// Returns the bin index and the amount due; the amount is zero when the
    /// reservation covers the blob and the cumulative on-demand spend otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AdmissionDenied`] when neither the reservation nor the
    /// remaining balance covers the blob. Nothing is charged in that case.
    pub fn decide(&self, num_symbols: u64) -> Result<(u32, BigUint)> {
        let decision = self.decide_at(num_symbols, unix_now(), true)?;
        Ok((decision.bin_index, decision.amount_due))
    }

    /// [`Accountant::decide`] at an explicit unix timestamp.
    ///
    /// # Errors
    ///
    /// See [`Accountant::decide`].
    pub fn decide_at(
        &self,
        num_symbols: u64,
        now: u64,
        reservation_eligible: bool,
    ) -> Result<AdmissionDecision> {
        let decision = self
            .state
            .lock()
            .decide(num_symbols, now, reservation_eligible);

        match &decision {
            Ok(d) => debug!(
                "Admitted {num_symbols} symbols via {:?} (bin={}, amount={})",
                d.path, d.bin_index, d.amount_due
            ),
            Err(e) => warn!("{e}"),
        }
        decision
    }

    /// Account for a blob bound for `quorum_numbers` and produce a signed
    /// payment authorization.
    ///
    /// The reservation is only used when it covers every requested quorum;
    /// on-demand payment only covers the required quorums.
    ///
    /// # Errors
    ///
    /// Returns an invalid-argument error for unusable quorums, an admission
    /// denial when nothing covers the blob, or a signing error.
    pub fn account_blob(
        &self,
        num_symbols: u64,
        quorum_numbers: &[u8],
    ) -> Result<PaymentAuthorization> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            Error::InvalidArgument("no signer configured for payment authorization".to_string())
        })?;
        let account_id = signer.account_id()?;

        let reservation_quorums = self.state.lock().reservation.quorum_numbers.clone();
        let reservation_eligible = quorum_check(quorum_numbers, &reservation_quorums).is_ok();
        if !reservation_eligible {
            quorum_check(quorum_numbers, &REQUIRED_QUORUMS)?;
        }

        let decision = self.decide_at(num_symbols, unix_now(), reservation_eligible)?;

        let mut authorization = PaymentAuthorization {
            account_id,
            bin_index: decision.bin_index,
            cumulative_payment: decision.amount_due,
            signature: None,
        };
        authorization.sign(signer.as_ref())?;
        Ok(authorization)
    }

    /// Run one rotation immediately, outside the periodic schedule.
    pub fn rotate_bins(&self) {
        self.state.lock().rotate();
    }

    /// Replace reservation, balance and billing parameters from network state.
    ///
    /// Bin counters and the cumulative spend are kept.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the new parameters are unusable.
    pub fn update_payment_state(
        &self,
        reservation: Reservation,
        on_demand: OnDemandPayment,
        params: BillingParams,
    ) -> Result<()> {
        params.validate()?;
        let mut state = self.state.lock();
        if on_demand.cumulative_payment < state.cumulative_payment_spent {
            warn!(
                "On-demand balance {} is below local spend {}",
                on_demand.cumulative_payment, state.cumulative_payment_spent
            );
        }
        state.reservation = reservation;
        state.on_demand = on_demand;
        state.params = params;
        drop(state);
        info!("Payment state refreshed");
        Ok(())
    }

    /// Snapshot of `[current, next, overflow]` bin usage.
    #[must_use]
    pub fn bin_usages(&self) -> [u64; 3] {
        self.state.lock().bin_usages
    }

    /// Total on-demand spend so far.
    #[must_use]
    pub fn cumulative_payment_spent(&self) -> BigUint {
        self.state.lock().cumulative_payment_spent.clone()
    }

    /// Current billing parameters.
    #[must_use]
    pub fn params(&self) -> BillingParams {
        self.state.lock().params
    }

    /// Admission statistics.
    #[must_use]
    pub fn stats(&self) -> AccountantStats {
        self.state.lock().stats.clone()
    }

    /// Whether the rotation task is running.
    #[must_use]
    pub fn is_rotating(&self) -> bool {
        self.rotation
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Accountant {
    fn drop(&mut self) {
        self.stop();
    }
}
