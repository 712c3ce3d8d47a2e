use embassy_executor::task;

use grid_ballast::config::FrequencyConfig;
use grid_ballast::freq::{FrequencyEstimator, SharedEdges};
use grid_ballast::SharedStore;

#[task]
pub async fn frequency_task(
    edges: &'static SharedEdges,
    store: &'static SharedStore,
    config: FrequencyConfig,
) {
    FrequencyEstimator::new(config).run(edges, store).await
}
