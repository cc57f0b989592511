pub mod recipe_loader;

pub use recipe_loader::{load_recipe_file, load_recipes};
