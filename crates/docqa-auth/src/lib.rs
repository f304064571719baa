pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::{Claims, JwtService};
pub use middleware::{AuthContext, BearerAuthorizer};
pub use password::PasswordService;

pub use docqa_error::{DocqaError, Result};
