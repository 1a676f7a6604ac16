pub mod process_backend;
pub mod smtlib_printer;

#[cfg(feature = "z3")]
pub mod z3_backend;
