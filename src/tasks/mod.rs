pub mod controller_task;
pub mod current_task;
pub mod edge_task;
pub mod frequency_task;
pub mod rs485_task;
pub mod status_task;
