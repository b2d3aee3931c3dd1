pub mod catalog;
pub mod engine;

pub use catalog::{AllergenCatalog, SubstitutionCatalog};
pub use engine::{AllergenEngine, IngredientEntry};
