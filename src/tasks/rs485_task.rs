use embassy_executor::task;

use grid_ballast::config::SerialConfig;
use grid_ballast::rs485::SerialLink;
use grid_ballast::SharedStore;

use crate::bus::Rs485Port;

/// Heater board master. Answers polls and keeps temperatures current.
#[task]
pub async fn rs485_task(port: Rs485Port, store: &'static SharedStore, config: SerialConfig) {
    SerialLink::new(port, store, config).run().await
}
