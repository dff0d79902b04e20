pub mod parser_config_test;
