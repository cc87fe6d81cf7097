//! Random-walk quote generator for demos.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use trendbar_lib::prelude::*;

/// Starting price for a simulated instrument.
fn seed_price(instrument: Instrument) -> f64 {
    if instrument.quote() == Currency::JPY {
        160.0
    } else {
        1.10
    }
}

/// Feed random-walk quotes for `instruments` every `rate` until the feed
/// closes.
pub(crate) async fn run_feed(feed: QuoteFeed, instruments: Vec<Instrument>, rate: Duration) {
    let mut rng = StdRng::from_os_rng();
    let mut prices: Vec<f64> = instruments.iter().map(|i| seed_price(*i)).collect();
    let mut ticker = tokio::time::interval(rate);

    loop {
        ticker.tick().await;
        let timestamp = Utc::now().timestamp_millis();

        for (instrument, price) in instruments.iter().zip(prices.iter_mut()) {
            let step: f64 = rng.random_range(-0.0002..0.0002);
            *price *= 1.0 + step;

            if feed.send(RawQuote::new(*instrument, *price, timestamp)).is_err() {
                tracing::debug!("quote feed closed, stopping simulation");
                return;
            }
        }
    }
}
