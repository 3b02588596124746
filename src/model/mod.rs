pub mod state_catalog;
pub mod work_item;
