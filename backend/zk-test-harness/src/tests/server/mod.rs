mod process;
mod testing_server;
