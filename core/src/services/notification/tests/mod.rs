mod handler_tests;
