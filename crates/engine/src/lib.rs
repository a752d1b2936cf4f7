pub mod aggregate;
pub mod cell;
pub mod export_plan;
pub mod record;
pub mod sheet;
