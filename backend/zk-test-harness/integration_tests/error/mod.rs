mod lifecycle;
mod server;
