//! Periods command implementation.

use trendbar_lib::prelude::*;

/// Print the supported bar periods.
pub(crate) fn list_periods() {
    println!("{:<8} {:>10}", "PERIOD", "SECONDS");
    println!("{}", "-".repeat(19));

    for period in Period::all() {
        println!("{:<8} {:>10}", period.as_str(), period.seconds());
    }
}
