//! `loan_schedule` is a Rust library for generating loan amortization schedules.
//!
//! It simulates a loan period by period, producing one record per payment until
//! the balance reaches zero or the term is exhausted. Beyond plain fixed-payment
//! amortization it supports:
//! - **Extra payments**: recurring per-period and per-year extras, one-time
//!   extras tied to specific period numbers, and a balloon payment.
//! - **Rate changes**: the rate in force can change at a given period, at which
//!   point the payment is re-amortized over the remaining term.
//! - **Interest-only windows**: a leading stretch of periods where the payment
//!   covers interest only and no scheduled principal is paid.
//!
//! ## Usage
//!
//! Add `loan_schedule` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! loan_schedule = "0.1.0"
//! rust_decimal = "1.39.0"
//! rust_decimal_macros = "1.39.0"
//! chrono = "0.4"
//! ```
//!
//! Then build a [`LoanParameters`] and call [`generate_schedule`]:
//!
//! ```rust
//! use loan_schedule::{generate_schedule, LoanParameters};
//! use rust_decimal_macros::dec;
//! use chrono::NaiveDate;
//!
//! fn main() {
//!     let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
//!     let mut params = LoanParameters::new(dec!(300_000), dec!(6), 30, 12, start);
//!     params.extra_monthly = dec!(100);
//!
//!     match generate_schedule(&params) {
//!         Ok(result) => {
//!             println!("First payment:  {:.2}", result.initial_payment);
//!             println!("Total interest: {:.2}", result.total_interest);
//!             println!("Paid off on:    {}", result.payoff_date);
//!         }
//!         Err(e) => {
//!             eprintln!("Error generating schedule: {}", e);
//!         }
//!     }
//! }
//! ```

use std::collections::BTreeMap;

use anyhow::bail;
use chrono::{Days, Months, NaiveDate};
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Residue below this is considered paid off (one cent).
const PAYOFF_TOLERANCE: Decimal = dec!(0.01);

/// Input parameters for one amortization schedule run.
///
/// A value is immutable for the duration of one [`generate_schedule`] call;
/// callers rebuild it from scratch whenever an input changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanParameters {
    /// The principal amount of the loan. Must be positive.
    pub principal: Decimal,
    /// The annual interest rate as a percentage (e.g., 6.5 for 6.5%). Must be non-negative.
    pub annual_rate_percent: Decimal,
    /// The loan term in years. Must be positive.
    pub term_years: u32,
    /// Number of payments per year (e.g., 12, 26, 52, 4). Must be positive.
    pub payments_per_year: u32,
    /// The date of the first payment period.
    pub start_date: NaiveDate,
    /// Extra principal applied on every period. Must be non-negative.
    pub extra_monthly: Decimal,
    /// Extra principal applied once per year, on every `payments_per_year`-th period.
    pub extra_yearly: Decimal,
    /// One-time extra principal payments, keyed by period number.
    ///
    /// Keys outside `1..=term_years * payments_per_year` are never matched.
    pub one_time_extras: BTreeMap<u32, Decimal>,
    /// Annual rate changes (as percentages), keyed by the period number at
    /// which the new rate takes effect.
    ///
    /// Keys outside `1..=term_years * payments_per_year` are never matched.
    pub rate_changes: BTreeMap<u32, Decimal>,
    /// Number of leading periods during which no scheduled principal is paid.
    pub interest_only_periods: u32,
    /// An additional lump principal payment due at a specific period,
    /// as `(period_number, amount)`.
    pub balloon_payment: Option<(u32, Decimal)>,
}

impl LoanParameters {
    /// Creates a baseline parameter set with no extras, no rate changes,
    /// and no interest-only window.
    pub fn new(
        principal: Decimal,
        annual_rate_percent: Decimal,
        term_years: u32,
        payments_per_year: u32,
        start_date: NaiveDate,
    ) -> Self {
        LoanParameters {
            principal,
            annual_rate_percent,
            term_years,
            payments_per_year,
            start_date,
            extra_monthly: Decimal::ZERO,
            extra_yearly: Decimal::ZERO,
            one_time_extras: BTreeMap::new(),
            rate_changes: BTreeMap::new(),
            interest_only_periods: 0,
            balloon_payment: None,
        }
    }

    /// Checks the invalid-input class: non-positive principal or term,
    /// negative rates or extras.
    ///
    /// Degenerate but valid inputs (zero rate, an interest-only window longer
    /// than the term, extras that overpay the balance) pass validation and
    /// are handled by the simulator.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first rejected field.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.principal <= Decimal::ZERO {
            bail!("Principal must be positive.");
        }
        if self.annual_rate_percent < Decimal::ZERO {
            bail!("Annual rate cannot be negative.");
        }
        if self.term_years == 0 {
            bail!("Term years cannot be zero.");
        }
        if self.payments_per_year == 0 {
            bail!("Payments per year cannot be zero.");
        }
        if self.term_years.checked_mul(self.payments_per_year).is_none() {
            bail!("Term years times payments per year overflows the period count.");
        }
        if self.extra_monthly < Decimal::ZERO || self.extra_yearly < Decimal::ZERO {
            bail!("Extra payments cannot be negative.");
        }
        if self.one_time_extras.values().any(|amount| *amount < Decimal::ZERO) {
            bail!("One-time extra payments cannot be negative.");
        }
        if self.rate_changes.values().any(|rate| *rate < Decimal::ZERO) {
            bail!("Rate changes cannot be negative.");
        }
        if let Some((_, amount)) = self.balloon_payment {
            if amount < Decimal::ZERO {
                bail!("Balloon payment cannot be negative.");
            }
        }
        Ok(())
    }

    fn total_periods(&self) -> u32 {
        // validate() guarantees the product fits.
        self.term_years * self.payments_per_year
    }
}

/// Raw form-state input with every numeric field optional.
///
/// This is the boundary shape for UI callers: missing or unparseable fields
/// arrive as `None` and [`RawLoanInput::coerce`] maps them to zero, keeping
/// the coercion-to-zero policy explicit and out of the core. A coerced zero
/// term or principal still fails [`LoanParameters::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLoanInput {
    pub principal: Option<Decimal>,
    pub annual_rate_percent: Option<Decimal>,
    pub term_years: Option<u32>,
    pub payments_per_year: Option<u32>,
    pub start_date: Option<NaiveDate>,
    pub extra_monthly: Option<Decimal>,
    pub extra_yearly: Option<Decimal>,
    pub one_time_extras: BTreeMap<u32, Decimal>,
    pub rate_changes: BTreeMap<u32, Decimal>,
    pub interest_only_periods: Option<u32>,
    pub balloon_payment: Option<(u32, Decimal)>,
}

impl RawLoanInput {
    /// Coerces missing fields to zero (or the epoch date) and produces the
    /// strict parameter set consumed by [`generate_schedule`].
    pub fn coerce(self) -> LoanParameters {
        LoanParameters {
            principal: self.principal.unwrap_or_default(),
            annual_rate_percent: self.annual_rate_percent.unwrap_or_default(),
            term_years: self.term_years.unwrap_or_default(),
            payments_per_year: self.payments_per_year.unwrap_or_default(),
            start_date: self.start_date.unwrap_or_default(),
            extra_monthly: self.extra_monthly.unwrap_or_default(),
            extra_yearly: self.extra_yearly.unwrap_or_default(),
            one_time_extras: self.one_time_extras,
            rate_changes: self.rate_changes,
            interest_only_periods: self.interest_only_periods.unwrap_or_default(),
            balloon_payment: self.balloon_payment,
        }
    }
}

/// One simulated payment period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRecord {
    /// 1-based period number.
    pub period_number: u32,
    /// The date of this payment period.
    pub date: NaiveDate,
    /// Interest plus scheduled principal for this period, excluding extras.
    pub scheduled_payment: Decimal,
    /// The portion of the payment that covers interest.
    pub interest_portion: Decimal,
    /// The portion of the scheduled payment that reduces principal.
    pub scheduled_principal_portion: Decimal,
    /// Additional principal paid this period (recurring, one-time, balloon).
    pub extra_principal_portion: Decimal,
    /// The remaining balance after this period. Never negative.
    pub ending_balance: Decimal,
    /// Total principal paid through this period.
    pub cumulative_principal: Decimal,
    /// Total interest paid through this period.
    pub cumulative_interest: Decimal,
    /// The annual rate (as a percentage) in force during this period.
    pub effective_annual_rate: Decimal,
}

impl PeriodRecord {
    /// Projects the record into the export column order consumed by the
    /// CSV/PDF collaborators: period index, ISO date, principal, interest,
    /// total payment, balance.
    ///
    /// Amounts are rounded to two decimal places and rendered with no locale
    /// or currency formatting.
    pub fn export_row(&self) -> [String; 6] {
        let principal = self.scheduled_principal_portion + self.extra_principal_portion;
        let total_payment = self.scheduled_payment + self.extra_principal_portion;
        [
            self.period_number.to_string(),
            self.date.to_string(),
            format!("{:.2}", principal.round_dp(2)),
            format!("{:.2}", self.interest_portion.round_dp(2)),
            format!("{:.2}", total_payment.round_dp(2)),
            format!("{:.2}", self.ending_balance.round_dp(2)),
        ]
    }
}

/// The completed schedule plus the summary figures derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResult {
    /// One record per simulated period, ordered by period number.
    pub schedule: Vec<PeriodRecord>,
    /// Total interest paid over the life of the loan.
    pub total_interest: Decimal,
    /// Total principal paid, scheduled and extra combined.
    pub total_principal_paid: Decimal,
    /// The date of the final period, at which the balance reaches zero.
    pub payoff_date: NaiveDate,
    /// The scheduled payment of period 1.
    pub initial_payment: Decimal,
}

/// Computes the fixed periodic payment that fully amortizes `balance` over
/// `remaining_periods` at `periodic_rate`.
///
/// The annuity formula is: PMT = B * [i(1 + i)^n] / [(1 + i)^n - 1]
///
/// # Arguments
///
/// * `balance` - The outstanding balance to amortize.
/// * `periodic_rate` - The per-period rate as a decimal (annual % / payments per year / 100).
/// * `remaining_periods` - The number of payments left. Must be at least 1.
pub fn periodic_payment(
    balance: Decimal,
    periodic_rate: Decimal,
    remaining_periods: u32,
) -> Decimal {
    if periodic_rate.is_zero() {
        // Straight-line; avoids division by zero in the compound formula.
        return balance / Decimal::from(remaining_periods);
    }

    let growth = (dec!(1) + periodic_rate).powu(remaining_periods.into());
    balance * periodic_rate * growth / (growth - dec!(1))
}

/// Converts an annual percentage rate into the per-period decimal rate.
///
/// `payments_per_year` must be at least 1; callers go through
/// [`LoanParameters::validate`] first.
fn periodic_rate_from(annual_rate_percent: Decimal, payments_per_year: u32) -> Decimal {
    annual_rate_percent / dec!(100) / Decimal::from(payments_per_year)
}

/// Generates the full amortization schedule for one parameter set.
///
/// The simulation walks periods `1..=term_years * payments_per_year`,
/// applying rate changes, extra payments, the interest-only window, and the
/// balloon payment, and stops early once the balance reaches zero. The call
/// is pure: identical parameters always yield an identical result.
///
/// Decimal rounding residue below one cent on the final period is absorbed
/// into the last scheduled principal portion, so a fully amortizing loan
/// ends with a balance of exactly zero and a cumulative principal equal to
/// the loan amount.
///
/// # Errors
///
/// Returns an error for the invalid-input class rejected by
/// [`LoanParameters::validate`], or if the schedule dates run off the
/// supported calendar range.
pub fn generate_schedule(params: &LoanParameters) -> Result<ScheduleResult, anyhow::Error> {
    params.validate()?;

    let total_periods = params.total_periods();
    let mut balance = params.principal;
    let mut annual_rate = params.annual_rate_percent;
    let mut periodic_rate = periodic_rate_from(annual_rate, params.payments_per_year);
    let mut interest_only = params.interest_only_periods > 0;
    let mut scheduled_payment = if interest_only {
        Decimal::ZERO
    } else {
        periodic_payment(balance, periodic_rate, total_periods)
    };

    let mut date = params.start_date;
    let mut cumulative_principal = dec!(0);
    let mut cumulative_interest = dec!(0);
    let mut schedule: Vec<PeriodRecord> = Vec::new();

    for period_number in 1..=total_periods {
        if let Some(new_rate) = params.rate_changes.get(&period_number) {
            annual_rate = *new_rate;
            periodic_rate = periodic_rate_from(annual_rate, params.payments_per_year);
            if !interest_only {
                // Rate changes re-amortize over the remaining term; the
                // payment resets, the term does not.
                let remaining = total_periods - period_number + 1;
                scheduled_payment = periodic_payment(balance, periodic_rate, remaining);
            }
        }

        let interest = balance * periodic_rate;
        let scheduled_principal = if interest_only {
            Decimal::ZERO
        } else {
            scheduled_payment - interest
        };

        let mut extra_principal = params.extra_monthly;
        if period_number % params.payments_per_year == 0 {
            extra_principal += params.extra_yearly;
        }
        if let Some(amount) = params.one_time_extras.get(&period_number) {
            extra_principal += *amount;
        }
        if let Some((balloon_period, amount)) = params.balloon_payment {
            if balloon_period == period_number {
                extra_principal += amount;
            }
        }

        // Clamp the applied principal so the balance never goes negative;
        // the scheduled portion is satisfied before extras.
        let (mut applied_scheduled, applied_extra) =
            if scheduled_principal + extra_principal > balance {
                let applied_scheduled = scheduled_principal.min(balance);
                (applied_scheduled, balance - applied_scheduled)
            } else {
                (scheduled_principal, extra_principal)
            };
        balance -= applied_scheduled + applied_extra;

        // Decimal rounding can leave sub-tolerance residue on the final
        // period; fold it into the scheduled principal so a fully amortized
        // loan ends at exactly zero.
        if period_number == total_periods
            && balance > Decimal::ZERO
            && balance < PAYOFF_TOLERANCE
        {
            applied_scheduled += balance;
            balance = Decimal::ZERO;
        }

        cumulative_principal += applied_scheduled + applied_extra;
        cumulative_interest += interest;
        if balance.is_zero() {
            // Addition order can round the running total a hair away from
            // the loan amount; reconcile the payoff record.
            cumulative_principal = params.principal;
        }

        schedule.push(PeriodRecord {
            period_number,
            date,
            scheduled_payment: interest + applied_scheduled,
            interest_portion: interest,
            scheduled_principal_portion: applied_scheduled,
            extra_principal_portion: applied_extra,
            ending_balance: balance,
            cumulative_principal,
            cumulative_interest,
            effective_annual_rate: annual_rate,
        });

        date = advance_date(date, params.payments_per_year)?;

        if interest_only && period_number == params.interest_only_periods {
            interest_only = false;
            let remaining = total_periods - period_number;
            if remaining > 0 {
                // Principal amortization begins here.
                scheduled_payment = periodic_payment(balance, periodic_rate, remaining);
            }
        }

        if balance <= Decimal::ZERO {
            break;
        }
    }

    let mut total_interest = dec!(0);
    let mut total_principal_paid = dec!(0);
    let mut payoff_date = params.start_date;
    if let Some(last) = schedule.last() {
        total_interest = last.cumulative_interest;
        total_principal_paid = last.cumulative_principal;
        payoff_date = last.date;
    }
    let initial_payment = schedule
        .first()
        .map(|record| record.scheduled_payment)
        .unwrap_or_default();

    Ok(ScheduleResult {
        schedule,
        total_interest,
        total_principal_paid,
        payoff_date,
        initial_payment,
    })
}

/// Advances a payment date by one period.
///
/// When `payments_per_year` divides 12 evenly the step is a whole number of
/// months; otherwise it is a fixed day count (7 days for weekly, 14 for
/// biweekly).
fn advance_date(date: NaiveDate, payments_per_year: u32) -> Result<NaiveDate, anyhow::Error> {
    let next = if payments_per_year <= 12 && 12 % payments_per_year == 0 {
        date.checked_add_months(Months::new(12 / payments_per_year))
    } else {
        // round(365.25 / payments_per_year) in integer arithmetic
        let per_year = u64::from(payments_per_year);
        let days = (36525 + 50 * per_year) / (100 * per_year);
        date.checked_add_days(Days::new(days))
    };

    match next {
        Some(next) => Ok(next),
        None => Err(anyhow::anyhow!(
            "Schedule date left the supported calendar range."
        )),
    }
}
