use embassy_executor::task;
use embassy_time::{Duration, Ticker};

use grid_ballast::SharedStore;

/// Status: 1 Hz snapshot of the store and the fault log over RTT.
/// Skips a beat rather than queue behind a writer.
#[task]
pub async fn status_task(store: &'static SharedStore) {
    let mut ticker = Ticker::every(Duration::from_hz(1));
    let mut last_faults = 0;

    loop {
        ticker.next().await;

        let Some(s) = store.try_read() else {
            continue;
        };
        defmt::info!(
            "[STATE] f={}Hz sp={} top={} bot={} P={}W mode={}",
            s.grid_freq,
            s.set_point,
            s.temp_top,
            s.temp_bottom,
            s.power,
            s.mode
        );

        let faults = store.last_fault();
        if faults.count != last_faults {
            defmt::warn!("[FAULT] {} total, last {}", faults.count, faults.last);
            last_faults = faults.count;
        }
    }
}
