pub mod shift_reduce_test;
