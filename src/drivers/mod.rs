pub mod emunw;
pub mod luabridge;
pub mod mock;
