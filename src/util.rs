//! Small serialization helpers shared by the store modules.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

pub fn dec_to_text(d: Decimal) -> String {
    d.to_string()
}

pub fn dec_opt_to_text(d: Option<Decimal>) -> Option<String> {
    d.map(dec_to_text)
}

pub fn text_to_dec(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).with_context(|| format!("invalid decimal in store: {s}"))
}

pub fn text_opt_to_dec(s: Option<String>) -> Result<Option<Decimal>> {
    s.map(|s| text_to_dec(&s)).transpose()
}

pub fn date_to_text(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub fn text_to_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date in store: {s}"))
}

pub fn dt_to_text(d: DateTime<Utc>) -> String {
    d.to_rfc3339()
}

pub fn text_to_dt(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid timestamp in store: {s}"))?
        .with_timezone(&Utc))
}
