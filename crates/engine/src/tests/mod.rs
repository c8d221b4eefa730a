mod helpers;

mod extract_tests;
mod pipeline_tests;
