pub mod scalars;
pub mod table;
