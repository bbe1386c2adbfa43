pub mod dispatcher;

pub use dispatcher::RedisDispatcher;
