use crate::error::GatewayError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Shortest card number accepted by card networks.
pub const MIN_CARD_DIGITS: usize = 12;

/// Card details presented by a merchant at authorize time.
///
/// Only ever held in memory for the duration of an authorize call; what gets stored on the
/// authorization is the [`CardReference`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditCard {
    pub name: String,
    pub number: u64,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub cvv: u16,
}

/// The stored, non-sensitive view of a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardReference {
    pub holder: String,
    pub masked_number: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
}

impl CreditCard {
    pub fn new(
        name: impl Into<String>,
        number: u64,
        expiry_month: u32,
        expiry_year: i32,
        cvv: u16,
    ) -> Self {
        Self {
            name: name.into(),
            number,
            expiry_month,
            expiry_year,
            cvv,
        }
    }

    /// Checks the card can be sent to the processor on `today`.
    pub fn validate(&self, today: NaiveDate) -> Result<(), GatewayError> {
        if !(1..=12).contains(&self.expiry_month) {
            return Err(GatewayError::Validation(format!(
                "expiry month {} is out of range",
                self.expiry_month
            )));
        }
        let digits = self.number.to_string().len();
        if digits < MIN_CARD_DIGITS {
            return Err(GatewayError::Validation(format!(
                "credit card number has {digits} digits, at least {MIN_CARD_DIGITS} required"
            )));
        }
        if !luhn_valid(self.number) {
            return Err(GatewayError::Validation(
                "credit card number does not pass the Luhn check".to_string(),
            ));
        }
        if self.is_expired_on(today) {
            return Err(GatewayError::Validation(
                "credit card has expired".to_string(),
            ));
        }
        Ok(())
    }

    /// A card stays valid through the last day of its expiry month.
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        (self.expiry_year, self.expiry_month) < (today.year(), today.month())
    }

    pub fn reference(&self) -> CardReference {
        let digits = self.number.to_string();
        let visible = digits.len().min(4);
        let (hidden, last) = digits.split_at(digits.len() - visible);
        CardReference {
            holder: self.name.clone(),
            masked_number: format!("{}{}", "*".repeat(hidden.len()), last),
            expiry_month: self.expiry_month,
            expiry_year: self.expiry_year,
        }
    }
}

/// Luhn checksum over the decimal digits of `number`.
pub fn luhn_valid(number: u64) -> bool {
    let check_digit = number % 10;
    let mut remaining = number / 10;
    let mut checksum = 0;
    let mut position = 0;

    while remaining > 0 {
        let mut digit = remaining % 10;
        // Double every second digit, starting with the one left of the check digit.
        if position % 2 == 0 {
            digit *= 2;
            if digit > 9 {
                digit = digit % 10 + digit / 10;
            }
        }
        checksum += digit;
        remaining /= 10;
        position += 1;
    }

    (check_digit + checksum % 10) % 10 == 0
}
