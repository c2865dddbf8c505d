pub mod admin;
pub mod auth;
pub mod client;
pub mod clients;
pub mod dashboard;
pub mod files;
pub mod flash;
pub mod landing;
pub mod responses;
pub mod review;
pub mod router;
pub mod state;
pub mod storage;
pub mod supervisor;
pub mod templates;
pub mod uploads;

pub use state::AppState;
pub use templates::{escape_html, render_login_page};
