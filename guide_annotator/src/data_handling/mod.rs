pub mod guide_library;
pub mod guide_table;
pub mod reference_check;
