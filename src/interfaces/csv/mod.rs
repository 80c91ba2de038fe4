pub mod authorization_writer;
pub mod operation_reader;
