// Directory: candidate profiles, postings and shortlist records.
// Thin CRUD over `store::DirectoryStore` with input validation in front.

pub mod handlers;
pub mod service;
pub mod validation;
