/*
 *  Copyright 2025 Taskline Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Entitlement Clock: pure expiry-date arithmetic for paid plans.
//!
//! All entitlement math happens in Asia/Tokyo civil time, even though payment
//! timestamps arrive in UTC. Month addition is calendar arithmetic: the month
//! count increments, years wrap, and the day-of-month clamps to the last
//! valid day of the target month (Jan 31 + 1 month is Feb 28/29, never
//! Mar 3).

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// The civil timezone for payment dates and expiry computation.
pub const TOKYO: Tz = chrono_tz::Asia::Tokyo;

/// Plan duration codes carried in the checkout reference
/// (`<task_id>_<plan>`).
///
/// `1m` is a legacy code: it still parses so old checkout links don't become
/// payload errors, but it does not extend expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanCode {
    OneMonth,
    ThreeMonths,
    SixMonths,
    TwelveMonths,
}

impl PlanCode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(PlanCode::OneMonth),
            "3m" => Some(PlanCode::ThreeMonths),
            "6m" => Some(PlanCode::SixMonths),
            "12m" => Some(PlanCode::TwelveMonths),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanCode::OneMonth => "1m",
            PlanCode::ThreeMonths => "3m",
            PlanCode::SixMonths => "6m",
            PlanCode::TwelveMonths => "12m",
        }
    }

    pub fn months(&self) -> u32 {
        match self {
            PlanCode::OneMonth => 1,
            PlanCode::ThreeMonths => 3,
            PlanCode::SixMonths => 6,
            PlanCode::TwelveMonths => 12,
        }
    }

    /// Whether a payment on this plan moves `expires_at`.
    pub fn extends_expiry(&self) -> bool {
        !matches!(self, PlanCode::OneMonth)
    }
}

impl std::fmt::Display for PlanCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computes a new expiry instant for a plan purchase.
///
/// The base instant is the later of `paid_at` and the current expiry, so a
/// renewal paid early extends from the running entitlement instead of
/// restarting it: paying never shortens what the user already has.
pub fn extend(
    current_expiry: Option<DateTime<Utc>>,
    plan: PlanCode,
    paid_at: DateTime<Utc>,
) -> DateTime<Utc> {
    let base = match current_expiry {
        Some(expiry) if expiry > paid_at => expiry.with_timezone(&TOKYO),
        _ => paid_at.with_timezone(&TOKYO),
    };
    add_months(base, plan.months()).with_timezone(&Utc)
}

/// The civil date (Asia/Tokyo) on which a UTC payment instant falls.
pub fn civil_payment_date(paid_at: DateTime<Utc>) -> NaiveDate {
    paid_at.with_timezone(&TOKYO).date_naive()
}

/// Adds whole calendar months, clamping the day-of-month to the last valid
/// day of the resulting month and preserving the time of day.
pub fn add_months(dt: DateTime<Tz>, months: u32) -> DateTime<Tz> {
    let month0 = dt.month0() + months;
    let year = dt.year() + (month0 / 12) as i32;
    let month = month0 % 12 + 1;
    let day = dt.day().min(days_in_month(year, month));

    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .expect("clamped day is always valid for its month")
        .and_time(dt.time());
    // Japan has no DST; every local time maps to exactly one instant.
    TOKYO
        .from_local_datetime(&naive)
        .single()
        .expect("Asia/Tokyo local times are unambiguous")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .expect("first of month is always valid")
        .pred_opt()
        .expect("date has a predecessor")
        .day()
}
