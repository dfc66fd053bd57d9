pub mod naming;
pub mod service_env;
pub mod types;

pub use naming::{
    MANAGED_PREFIX, include_directive, slug_from_snippet_file, slug_from_unit_file,
    snippet_file_name, unit_name,
};
pub use service_env::{ENV_BASE_PATH, ENV_LISTEN, ENV_STORAGE_ROOT, service_environment};
pub use types::*;
