use embassy_executor::task;

use grid_ballast::config::ControllerConfig;
use grid_ballast::controller::ThresholdController;
use grid_ballast::SharedStore;

#[task]
pub async fn controller_task(store: &'static SharedStore, config: ControllerConfig) {
    ThresholdController::new(config).run(store).await
}
