use embassy_executor::task;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{AnyPin, Output};
use embassy_stm32::peripherals::PB0;
use embassy_time::Instant;

use grid_ballast::freq::SharedEdges;

/// Edge capture: stamps each rising edge of the zero-crossing pulse and hands
/// it to the estimator. Never touches the store.
///
/// Spawned on the interrupt executor: the EXTI wake pends its vector and the
/// stamp is read within microseconds of the edge, whatever thread mode is doing.
#[task]
pub async fn edge_task(
    mut pulse: ExtiInput<'static, PB0>,
    mut diag: Output<'static, AnyPin>,
    edges: &'static SharedEdges,
) {
    loop {
        pulse.wait_for_rising_edge().await;
        edges.post(Instant::now().as_ticks());
        diag.toggle();
    }
}
