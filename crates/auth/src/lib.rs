pub mod jwt;
pub mod middleware;
pub mod password;
pub mod roles;

pub use jwt::{generate_token, verify_token, Claims};
pub use middleware::{auth_middleware, optional_auth_middleware, AuthUser};
pub use password::{hash_password, verify_password, PasswordError};
pub use roles::{can_edit, can_view, permission_level, RoleError};
