//! Currency pair definitions.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::InstrumentParseError;

/// A three-letter upper-case currency code (e.g. `EUR`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Currency([u8; 3]);

impl Currency {
    /// Euro.
    pub const EUR: Self = Self(*b"EUR");
    /// US dollar.
    pub const USD: Self = Self(*b"USD");
    /// Japanese yen.
    pub const JPY: Self = Self(*b"JPY");
    /// Pound sterling.
    pub const GBP: Self = Self(*b"GBP");

    /// Returns the currency code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Constructed only from ASCII letters.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl FromStr for Currency {
    type Err = InstrumentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(InstrumentParseError::InvalidCurrency(s.to_string()));
        }
        Ok(Self([
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
            bytes[2].to_ascii_uppercase(),
        ]))
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tradable currency pair.
///
/// The canonical text form is the base code followed by the quote code,
/// e.g. `EURUSD`. This is also the encoding used at the persistence
/// boundary, and decoding rejects any string that is not exactly six
/// characters long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Instrument {
    base: Currency,
    quote: Currency,
}

impl Instrument {
    /// Creates a new instrument from its two currencies.
    #[must_use]
    pub const fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }

    /// Returns the base currency.
    #[must_use]
    pub const fn base(&self) -> Currency {
        self.base
    }

    /// Returns the quote currency.
    #[must_use]
    pub const fn quote(&self) -> Currency {
        self.quote
    }
}

impl FromStr for Instrument {
    type Err = InstrumentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let len = s.chars().count();
        if len != 6 || !s.is_ascii() {
            return Err(InstrumentParseError::InvalidLength {
                value: s.to_string(),
                len,
            });
        }
        let (base, quote) = s.split_at(3);
        Ok(Self::new(base.parse()?, quote.parse()?))
    }
}

impl TryFrom<String> for Instrument {
    type Error = InstrumentParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Instrument> for String {
    fn from(instrument: Instrument) -> Self {
        instrument.to_string()
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.base, self.quote)
    }
}
