pub mod identifier_parser;

pub use identifier_parser::IdentifierParser;
