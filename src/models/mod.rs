pub mod allocation;
pub mod stock_models;
