pub mod password;
pub mod reset_token;
pub mod slug;
pub mod token;
