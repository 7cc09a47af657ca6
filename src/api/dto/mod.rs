pub mod signin;
pub mod users;
