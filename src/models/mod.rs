pub mod credentials;
pub mod loaders;
pub mod recipe;
pub mod result;
pub mod tokens;

pub use credentials::{CredentialSource, Credentials, EnvCredentialSource};
pub use loaders::{load_recipe_file, load_recipes};
pub use recipe::{ItemsRequest, OAuth2Settings, Recipe, RecipeKind, Step, StepAction};
pub use result::{new_documents_text, RecipeResult, Status, StepResult};
pub use tokens::{token_cache_key, OAuth2Tokens};
