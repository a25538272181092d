use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Calendar day without a year, ordered month first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    pub fn new(month: u32, day: u32) -> Result<Self, String> {
        let max_day = match month {
            1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
            4 | 6 | 9 | 11 => 30,
            2 => 29,
            _ => return Err(format!("Invalid month: {}", month)),
        };
        if day == 0 || day > max_day {
            return Err(format!("Invalid day {} for month {}", day, month));
        }
        Ok(Self { month, day })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }
}

impl FromStr for MonthDay {
    type Err = String;

    /// Parse "MM-DD"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (month, day) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("Expected MM-DD, got '{}'", s))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| format!("Expected MM-DD, got '{}'", s))?;
        let day = day
            .parse::<u32>()
            .map_err(|_| format!("Expected MM-DD, got '{}'", s))?;
        Self::new(month, day)
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

/// Recurring sale period, e.g. a marketplace-wide promotion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonPeriod {
    pub name: String,
    pub start: MonthDay,
    /// Inclusive; may be earlier in the year than `start` to wrap year-end
    pub end: MonthDay,
    /// Percentage points added to the current discount
    pub discount_add: i32,
    /// Factor applied to the current price (1.1 = +10%)
    pub price_mult: Decimal,
}

impl SeasonPeriod {
    pub fn new(
        name: impl Into<String>,
        start: MonthDay,
        end: MonthDay,
        discount_add: i32,
        price_mult: Decimal,
    ) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            discount_add,
            price_mult,
        }
    }

    /// Build a period from "MM-DD" bounds
    pub fn parse(
        name: &str,
        start: &str,
        end: &str,
        discount_add: i32,
        price_mult: Decimal,
    ) -> Result<Self, String> {
        let start = start
            .parse::<MonthDay>()
            .map_err(|e| format!("Season '{}': {}", name, e))?;
        let end = end
            .parse::<MonthDay>()
            .map_err(|e| format!("Season '{}': {}", name, e))?;
        Ok(Self::new(name, start, end, discount_add, price_mult))
    }

    /// Whether `date` falls inside the period, bounds included
    pub fn contains(&self, date: NaiveDate) -> bool {
        let today = MonthDay::of(date);
        if self.start <= self.end {
            self.start <= today && today <= self.end
        } else {
            today >= self.start || today <= self.end
        }
    }
}
