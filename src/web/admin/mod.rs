mod dashboard;
mod manage;
mod users;

pub use dashboard::dashboard;
pub use manage::manage_users;
pub use users::{change_password, create_user, delete_user};

const ADMIN_HOME: &str = "/admin";
const MANAGE_PATH: &str = "/admin/manage";
