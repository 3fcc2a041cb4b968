pub mod operation_reader;
pub mod roster_writer;
