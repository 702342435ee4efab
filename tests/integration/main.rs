mod engine_tests;
mod support;
