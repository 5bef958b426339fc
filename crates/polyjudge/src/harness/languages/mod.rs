//! One harness generator per target language

mod cpp;
mod csharp;
mod dart;
mod go;
mod java;
mod kotlin;
mod php;
mod python;
mod r;
mod ruby;
mod rust;
mod swift;

pub use cpp::Cpp;
pub use csharp::CSharp;
pub use dart::Dart;
pub use go::Go;
pub use java::Java;
pub use kotlin::Kotlin;
pub use php::Php;
pub use python::Python;
pub use r::R;
pub use ruby::Ruby;
pub use rust::Rust;
pub use swift::Swift;
