pub mod collaborators;
pub mod single;
