pub mod controls;
pub mod datatable;
pub mod debug;
pub mod form;
pub mod store_map;
pub mod text_input;
pub mod text_input_common;
