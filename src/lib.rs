pub mod codegen;
pub mod io;
pub mod vm;
