mod testing_server;
