mod manager;
mod zookeeper;
