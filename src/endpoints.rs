pub mod get_state;
pub mod ping;
pub mod set_state;
