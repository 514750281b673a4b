mod error;
mod lifecycle;
mod server;
mod support;
